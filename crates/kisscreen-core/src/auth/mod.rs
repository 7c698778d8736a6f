//! Authentication module for managing the KIS access token.
//!
//! This module provides:
//! - `Credential`: an issued token and its expiry instant
//! - `TokenCache`: the durable JSON cache file
//! - `SessionManager`: token lifecycle (load, validity check, renewal)
//!
//! Tokens are renewed 60 seconds before the server-declared expiry.

pub mod cache;
pub mod credential;
pub mod session;

pub use cache::TokenCache;
pub use credential::{Credential, EXPIRY_MARGIN_SECS};
pub use session::SessionManager;
