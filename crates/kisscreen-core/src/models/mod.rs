//! Domain types returned to callers.

pub mod screen;

pub use screen::ScreenResult;
