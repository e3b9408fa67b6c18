//! Axum HTTP API server for the pkgif clip service.
//!
//! This crate provides:
//! - The video and clip REST surface over `pkgif_core::ClipService`
//! - Rendered files served with `Cache-Control: no-store`
//! - CORS, request ids, request logging and per-IP rate limiting
//! - Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
