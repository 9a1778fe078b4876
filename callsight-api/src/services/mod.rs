//! Service Layer
//!
//! Business logic behind the routes. Handlers stay thin: they parse input,
//! call a service and wrap the result in the response envelope.

pub mod audio;
pub mod dashboard;
pub mod ingest;
pub mod processing;

pub use audio::{AudioError, AudioStore, LocalAudioStore};
pub use dashboard::DashboardService;
pub use ingest::{IngestReceipt, IngestRequest, IngestService};
pub use processing::{
    AnalysisClient, AnalysisReport, AnalysisRequest, CallProcessor, HttpAnalysisClient,
};
