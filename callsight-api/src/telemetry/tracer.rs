//! Tracing subscriber initialization
//!
//! JSON logs filtered through `RUST_LOG`, with a default filter that keeps
//! the API and the insight pipeline at debug.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{ApiError, ApiResult};

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str =
    "callsight_api=debug,callsight_insights=debug,tower_http=debug,info";

/// Telemetry configuration from environment variables.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to the startup log line
    pub service_name: String,
    /// Service version
    pub service_version: String,
    /// Environment (production, staging, development)
    pub environment: String,
    /// Expose `/metrics` and record Prometheus metrics
    pub metrics_enabled: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "callsight-api".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            environment: "development".to_string(),
            metrics_enabled: true,
        }
    }
}

impl TelemetryConfig {
    /// Environment variables:
    /// - `CALLSIGHT_SERVICE_NAME` (default: callsight-api)
    /// - `CALLSIGHT_SERVICE_VERSION` (default: crate version)
    /// - `CALLSIGHT_ENVIRONMENT` (default: development)
    /// - `CALLSIGHT_METRICS_ENABLED`: "true"/"1" (default: true)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            service_name: std::env::var("CALLSIGHT_SERVICE_NAME")
                .unwrap_or(defaults.service_name),
            service_version: std::env::var("CALLSIGHT_SERVICE_VERSION")
                .unwrap_or(defaults.service_version),
            environment: std::env::var("CALLSIGHT_ENVIRONMENT").unwrap_or(defaults.environment),
            metrics_enabled: std::env::var("CALLSIGHT_METRICS_ENABLED")
                .map(|s| s == "true" || s == "1")
                .unwrap_or(defaults.metrics_enabled),
        }
    }
}

/// Initialize the global tracing subscriber.
///
/// Call once at startup, before any spans are recorded. A second call fails.
pub fn init_tracer(config: &TelemetryConfig) -> ApiResult<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().json())
        .try_init()
        .map_err(|e| ApiError::internal_error(format!("Failed to init subscriber: {}", e)))?;

    tracing::info!(
        service_name = config.service_name,
        service_version = config.service_version,
        environment = config.environment,
        metrics_enabled = config.metrics_enabled,
        "Telemetry initialized"
    );

    Ok(())
}
