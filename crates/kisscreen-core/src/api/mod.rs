//! REST API client module for the KIS Open API.
//!
//! This module provides the `KisClient` for running condition searches
//! saved in the broker's HTS/MTS, and the `ApiError` type shared with
//! the auth module.
//!
//! Every call is authorized with an OAuth bearer token obtained through
//! the `/oauth2/tokenP` client-credentials endpoint.

pub mod client;
pub mod error;

pub use client::KisClient;
pub use error::ApiError;
