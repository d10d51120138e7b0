// API crate clippy configuration
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Blackwell Ticketing API
//!
//! HTTP surface for the digital ticketing service: public purchase and
//! redemption endpoints, ratings, and the secret-protected operator API.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
