//! Access tokens for the Sheets API.
//!
//! This module provides:
//! - `ServiceAccountKey`: the Google service-account key file
//! - `TokenProvider`: hands out bearer tokens, exchanging a signed JWT grant
//!   for a fresh access token shortly before the cached one expires

pub mod token;

pub use token::{AccessToken, ServiceAccountKey, TokenProvider, TokenSource};
