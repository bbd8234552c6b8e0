//! kct-server - multi-tenant curriculum framework service
//!
//! Curriculum frameworks ("KCT") own versions, versions own courses and
//! courses own units. Versions move through a review workflow before they
//! are published. Everything is served as JSON under `/api/v1` and scoped
//! to the tenant named in the caller's bearer token.

pub mod auth;
pub mod config;
pub mod curriculum;
pub mod db;
pub mod error;
pub mod logging;
pub mod ratelimit;
pub mod routes;
pub mod server;
pub mod suggestions;

pub use config::Args;
pub use error::{ApiError, Result};
pub use server::{build_router, run, AppState};
