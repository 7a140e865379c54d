//! ReviewLoop API Library
//!
//! This crate contains the API server components for ReviewLoop.

pub mod config;
pub mod error;
pub mod identity;
pub mod routes;
pub mod state;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use state::AppState;
