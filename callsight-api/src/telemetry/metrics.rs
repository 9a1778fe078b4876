//! Prometheus Metrics Definitions
//!
//! HTTP traffic, insight refreshes, text-generation calls and analysis
//! outcomes. Exposed at `/metrics` for Prometheus scraping.

use axum::{http::StatusCode, response::IntoResponse};
use once_cell::sync::Lazy;
use prometheus::{register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder};

use crate::error::{ApiError, ApiResult};

/// HTTP request latency buckets (seconds)
/// Covers: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 2.5s, 5s, 10s
const HTTP_LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0,
];

/// Text-generation latency buckets (seconds). Model calls run for seconds,
/// not milliseconds.
const GENERATION_LATENCY_BUCKETS: &[f64] = &[0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0, 60.0];

/// Global metrics instance - initialized once at startup
pub static METRICS: Lazy<ApiResult<CallsightMetrics>> = Lazy::new(CallsightMetrics::new);

/// Container for all Callsight metrics.
#[derive(Clone)]
pub struct CallsightMetrics {
    /// HTTP request counter - labels: method, path, status
    pub http_requests_total: CounterVec,

    /// HTTP request duration histogram - labels: method, path
    pub http_request_duration_seconds: HistogramVec,

    /// Insight refresh counter - labels: entity, outcome
    pub insight_refresh_total: CounterVec,

    /// Text-generation call counter - labels: slot, outcome
    pub text_generation_total: CounterVec,

    /// Text-generation duration histogram - labels: slot
    pub text_generation_duration_seconds: HistogramVec,

    /// Call analysis counter - labels: outcome
    pub analysis_total: CounterVec,
}

fn registration_failed(name: &str, e: prometheus::Error) -> ApiError {
    ApiError::internal_error(format!("Failed to register {}: {}", name, e))
}

impl CallsightMetrics {
    /// Create and register all metrics with Prometheus.
    pub fn new() -> ApiResult<Self> {
        Ok(Self {
            http_requests_total: register_counter_vec!(
                "callsight_http_requests_total",
                "Total number of HTTP requests",
                &["method", "path", "status"]
            )
            .map_err(|e| registration_failed("http_requests_total", e))?,

            http_request_duration_seconds: register_histogram_vec!(
                "callsight_http_request_duration_seconds",
                "HTTP request duration in seconds",
                &["method", "path"],
                HTTP_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| registration_failed("http_request_duration_seconds", e))?,

            insight_refresh_total: register_counter_vec!(
                "callsight_insight_refresh_total",
                "Insight refreshes by entity and outcome",
                &["entity", "outcome"]
            )
            .map_err(|e| registration_failed("insight_refresh_total", e))?,

            text_generation_total: register_counter_vec!(
                "callsight_text_generation_total",
                "Text-generation calls by prompt slot and outcome",
                &["slot", "outcome"]
            )
            .map_err(|e| registration_failed("text_generation_total", e))?,

            text_generation_duration_seconds: register_histogram_vec!(
                "callsight_text_generation_duration_seconds",
                "Text-generation call duration in seconds",
                &["slot"],
                GENERATION_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| registration_failed("text_generation_duration_seconds", e))?,

            analysis_total: register_counter_vec!(
                "callsight_analysis_total",
                "Call analysis runs by outcome",
                &["outcome"]
            )
            .map_err(|e| registration_failed("analysis_total", e))?,
        })
    }

    /// Record an HTTP request.
    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.http_requests_total
            .with_label_values(&[method, path, &status_str])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);
    }

    /// Record an insight refresh. `outcome` is the refresh decision label
    /// or `error`.
    pub fn record_refresh(&self, entity: &str, outcome: &str) {
        self.insight_refresh_total
            .with_label_values(&[entity, outcome])
            .inc();
    }

    pub fn record_generation(&self, slot: &str, success: bool, duration_secs: f64) {
        let outcome = if success { "success" } else { "error" };
        self.text_generation_total
            .with_label_values(&[slot, outcome])
            .inc();
        self.text_generation_duration_seconds
            .with_label_values(&[slot])
            .observe(duration_secs);
    }

    pub fn record_analysis(&self, outcome: &str) {
        self.analysis_total.with_label_values(&[outcome]).inc();
    }
}

/// Handler for GET /metrics endpoint.
///
/// Returns Prometheus text format metrics.
#[utoipa::path(
    get,
    path = "/metrics",
    tag = "Observability",
    responses(
        (status = 200, description = "Prometheus metrics in text format", content_type = "text/plain"),
        (status = 500, description = "Failed to encode metrics"),
    ),
)]
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("Failed to encode metrics: {}", e).into_bytes(),
            )
        }
    }
}
