//! Core library for kisscreen.
//!
//! Keeps a Korea Investment & Securities Open API access token valid across
//! runs and fetches the stock codes matching a condition saved in HTS/MTS.
//!
//! ```no_run
//! # async fn example() -> Result<(), kisscreen_core::ApiError> {
//! use kisscreen_core::{ClientConfig, Environment, KisClient};
//!
//! let config = ClientConfig::new(
//!     "app-key",
//!     "app-secret",
//!     "12345678",
//!     "hts-id",
//!     Environment::Practice,
//!     "/tmp/kisscreen/token.json",
//! );
//! let mut client = KisClient::new(config)?;
//! let codes = client.fetch_screen("0").await?;
//! for code in &codes {
//!     println!("{}", code);
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod models;

pub use api::{ApiError, KisClient};
pub use auth::{Credential, SessionManager, TokenCache};
pub use config::{ClientConfig, Environment};
pub use models::ScreenResult;
