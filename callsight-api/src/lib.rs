//! Callsight API - HTTP Layer
//!
//! Axum routes for the call-center dashboard, the ingestion and processing
//! services behind them, the Postgres-backed `InsightStore` and the
//! observability stack (JSON logs, Prometheus metrics).

pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod macros;
pub mod openapi;
pub mod routes;
pub mod services;
pub mod state;
pub mod telemetry;
pub mod types;

// Re-export commonly used types
pub use config::{ApiConfig, StoreBackend};
pub use db::{DbClient, DbConfig};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use openapi::ApiDoc;
pub use routes::create_api_router;
pub use state::{AppState, Collaborators};
pub use types::*;
