//! Callsight API Server Entry Point
//!
//! Loads configuration, picks the store backend, wires the services and
//! starts the Axum HTTP server.

use std::sync::Arc;

use callsight_api::services::{HttpAnalysisClient, LocalAudioStore};
use callsight_api::telemetry::{init_tracer, InstrumentedGenerator, TelemetryConfig};
use callsight_api::{
    create_api_router, ApiConfig, ApiError, ApiResult, AppState, Collaborators, DbClient,
    DbConfig, StoreBackend,
};
use callsight_core::{CallsightError, InsightConfig};
use callsight_llm::{build_generator, LlmConfig, NarrativeConfig, NarrativeEngine};
use callsight_storage::{InMemoryStore, InsightStore};

#[tokio::main]
async fn main() -> ApiResult<()> {
    let telemetry_config = TelemetryConfig::from_env();
    init_tracer(&telemetry_config)?;

    let api_config = ApiConfig::from_env().map_err(CallsightError::from)?;
    let insight_config = InsightConfig::from_env();
    insight_config.validate().map_err(CallsightError::from)?;
    let llm_config = LlmConfig::from_env();

    let (store, db) = match api_config.store_backend {
        StoreBackend::Postgres => {
            let db = DbClient::from_config(&DbConfig::from_env())?;
            db.bootstrap().await?;
            let store: Arc<dyn InsightStore> = Arc::new(db.clone());
            (store, Some(db))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory store; data is lost on restart");
            let store: Arc<dyn InsightStore> = Arc::new(InMemoryStore::new());
            (store, None)
        }
    };

    if !llm_config.is_configured() {
        tracing::warn!("OPENROUTER_API_KEY not set; insight generation will fail");
    }
    let generator = Arc::new(InstrumentedGenerator::new(build_generator(&llm_config)));
    let engine = Arc::new(NarrativeEngine::new(
        generator,
        NarrativeConfig::from_llm(&llm_config, insight_config.corpus_limit),
    ));

    let analysis = Arc::new(HttpAnalysisClient::new(
        api_config.analysis_url.clone(),
        api_config.analysis_timeout,
    ));
    let audio = Arc::new(LocalAudioStore::new(
        api_config.audio_dir.clone(),
        api_config.public_base_url.clone(),
    ));

    let addr = api_config.bind_addr().map_err(CallsightError::from)?;
    let state = AppState::assemble(
        Collaborators {
            store,
            engine,
            analysis,
            audio,
            db,
        },
        api_config,
        insight_config,
    );
    let app = create_api_router(state, telemetry_config.metrics_enabled);

    tracing::info!(%addr, "Starting Callsight API server");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}
