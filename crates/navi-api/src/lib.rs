//! Axum HTTP/WS API server.
//!
//! This crate provides:
//! - Session lifecycle and frame/clip ingestion over REST
//! - Latest-summary polling and a WebSocket push channel
//! - Prometheus metrics and a liveness probe

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod ws;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
