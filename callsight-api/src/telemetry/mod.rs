//! Callsight Telemetry - Observability Infrastructure
//!
//! Structured JSON logging through `tracing-subscriber` and Prometheus
//! metrics for the API layer.

pub mod generation;
pub mod metrics;
pub mod middleware;
pub mod tracer;

pub use generation::InstrumentedGenerator;
pub use metrics::{metrics_handler, CallsightMetrics, METRICS};
pub use middleware::observability_middleware;
pub use tracer::{init_tracer, TelemetryConfig};
