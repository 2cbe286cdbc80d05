//! HTTP server module
//!
//! This module serves the scoring endpoint:
//! - Axum router with the scoring, health and version endpoints
//! - Request handlers mapping scoring failures to `{error}` bodies
//! - CORS middleware

pub mod handlers;
pub mod routes;

pub use routes::create_router;
