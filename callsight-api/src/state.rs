//! Shared application state for Axum routers.

use std::sync::Arc;

use callsight_core::InsightConfig;
use callsight_insights::InsightPipeline;
use callsight_llm::NarrativeEngine;
use callsight_storage::InsightStore;

use crate::config::ApiConfig;
use crate::db::DbClient;
use crate::services::{AnalysisClient, AudioStore, CallProcessor, DashboardService, IngestService};

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    /// Store every service reads from. Postgres in production, in-memory
    /// for tests and the `memory` backend.
    pub store: Arc<dyn InsightStore>,
    pub pipeline: InsightPipeline,
    pub dashboard: DashboardService,
    pub processor: Arc<CallProcessor>,
    pub ingest: Arc<IngestService>,
    pub config: Arc<ApiConfig>,
    /// Present only on the Postgres backend; readiness probes it.
    pub db: Option<DbClient>,
    pub start_time: std::time::Instant,
}

/// External collaborators the services are built over.
pub struct Collaborators {
    pub store: Arc<dyn InsightStore>,
    pub engine: Arc<NarrativeEngine>,
    pub analysis: Arc<dyn AnalysisClient>,
    pub audio: Arc<dyn AudioStore>,
    pub db: Option<DbClient>,
}

impl AppState {
    /// Wire the services over one store.
    pub fn assemble(
        parts: Collaborators,
        api_config: ApiConfig,
        insight_config: InsightConfig,
    ) -> Self {
        let Collaborators {
            store,
            engine,
            analysis,
            audio,
            db,
        } = parts;

        let pipeline = InsightPipeline::new(store.clone(), engine, insight_config.clone());
        let dashboard = DashboardService::new(store.clone(), insight_config);
        let processor = Arc::new(CallProcessor::new(store.clone(), analysis));
        let ingest = Arc::new(IngestService::new(
            store.clone(),
            audio,
            processor.clone(),
            api_config.phone_prefix.clone(),
        ));

        Self {
            store,
            pipeline,
            dashboard,
            processor,
            ingest,
            config: Arc::new(api_config),
            db,
            start_time: std::time::Instant::now(),
        }
    }
}

crate::impl_from_ref!(Arc<dyn InsightStore>, store);
crate::impl_from_ref!(InsightPipeline, pipeline);
crate::impl_from_ref!(DashboardService, dashboard);
crate::impl_from_ref!(Arc<CallProcessor>, processor);
crate::impl_from_ref!(Arc<IngestService>, ingest);
crate::impl_from_ref!(Arc<ApiConfig>, config);
crate::impl_from_ref!(Option<DbClient>, db);
crate::impl_from_ref!(std::time::Instant, start_time);
