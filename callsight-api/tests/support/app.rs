#![allow(dead_code)]

//! In-process application harness: in-memory store, scripted text model,
//! canned analysis service and an audio store that keeps uploads in memory.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{body::Body, http::Request, Router};
use callsight_api::services::{
    AnalysisClient, AnalysisReport, AnalysisRequest, AudioError, AudioStore,
};
use callsight_api::{create_api_router, ApiConfig, AppState, Collaborators};
use callsight_core::{AnalysisError, CallsightResult, InsightConfig};
use callsight_llm::{NarrativeConfig, NarrativeEngine};
use callsight_storage::InsightStore;
use callsight_test_utils::{InMemoryStore, ScriptedTextGenerator};
use serde_json::Value;
use tower::ServiceExt;

pub const BASE_URL: &str = "http://localhost:8080/audio";

/// Analysis service that answers every call with the same report.
pub struct CannedAnalysis {
    answer: Mutex<Option<Value>>,
    seen: Mutex<Vec<AnalysisRequest>>,
}

impl CannedAnalysis {
    pub fn ok(report: Value) -> Arc<Self> {
        Arc::new(Self {
            answer: Mutex::new(Some(report)),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn down() -> Arc<Self> {
        Arc::new(Self {
            answer: Mutex::new(None),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn set_report(&self, report: Value) {
        *self.answer.lock().unwrap() = Some(report);
    }

    pub fn requests(&self) -> Vec<AnalysisRequest> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl AnalysisClient for CannedAnalysis {
    async fn analyze(&self, request: &AnalysisRequest) -> CallsightResult<AnalysisReport> {
        self.seen.lock().unwrap().push(request.clone());
        match self.answer.lock().unwrap().clone() {
            Some(value) => Ok(serde_json::from_value(value).unwrap()),
            None => Err(AnalysisError::Unreachable {
                reason: "connection refused".to_string(),
            }
            .into()),
        }
    }
}

/// Keeps uploaded recordings in memory; can be told to fail.
#[derive(Default)]
pub struct MemoryAudioStore {
    pub files: Mutex<Vec<(String, usize)>>,
    pub fail: bool,
}

#[async_trait]
impl AudioStore for MemoryAudioStore {
    async fn store(&self, file_name: &str, bytes: &[u8]) -> Result<String, AudioError> {
        if self.fail {
            return Err(AudioError::Store {
                file: file_name.to_string(),
                reason: "bucket unavailable".to_string(),
            });
        }
        self.files
            .lock()
            .unwrap()
            .push((file_name.to_string(), bytes.len()));
        Ok(format!("{}/calls/{}", BASE_URL, file_name))
    }

    fn public_base_url(&self) -> &str {
        BASE_URL
    }
}

/// A well-formed analysis report.
pub fn report(quality: f64, escalation_risk: bool, why: Option<&str>) -> Value {
    serde_json::json!({
        "transcript": "Caller needs an ambulance at the market.",
        "language_spoken": "Hindi",
        "sop_state_compliance_score": quality,
        "conversation_control_score": quality,
        "communication_score": quality,
        "coaching_priority_score": 1.0 - quality,
        "sentiment_stabilization_score": quality,
        "resolution_path_validity_score": quality,
        "overall_call_quality_score": quality,
        "escalation_risk": escalation_risk,
        "why_flagged": why,
        "human_remarks": "Calm and quick.",
        "business_insight": "Ambulance dispatch is slow in the evening.",
        "coaching_insight": "Repeat the address back to the caller."
    })
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<InMemoryStore>,
    pub generator: Arc<ScriptedTextGenerator>,
    pub analysis: Arc<CannedAnalysis>,
    pub audio: Arc<MemoryAudioStore>,
    pub state: AppState,
}

pub struct TestAppBuilder {
    generator: ScriptedTextGenerator,
    analysis: Arc<CannedAnalysis>,
    audio: MemoryAudioStore,
    api_config: ApiConfig,
    insight_config: InsightConfig,
}

impl TestAppBuilder {
    pub fn new() -> Self {
        Self {
            generator: ScriptedTextGenerator::failing(),
            analysis: CannedAnalysis::ok(report(0.8, false, None)),
            audio: MemoryAudioStore::default(),
            api_config: ApiConfig::default(),
            insight_config: InsightConfig::default(),
        }
    }

    pub fn generator(mut self, generator: ScriptedTextGenerator) -> Self {
        self.generator = generator;
        self
    }

    pub fn analysis(mut self, analysis: Arc<CannedAnalysis>) -> Self {
        self.analysis = analysis;
        self
    }

    pub fn failing_audio(mut self) -> Self {
        self.audio.fail = true;
        self
    }

    pub fn max_upload_bytes(mut self, limit: usize) -> Self {
        self.api_config.max_upload_bytes = limit;
        self
    }

    pub fn build(self) -> TestApp {
        let store = Arc::new(InMemoryStore::new());
        let generator = Arc::new(self.generator);
        let audio = Arc::new(self.audio);
        let engine = Arc::new(NarrativeEngine::new(
            generator.clone(),
            NarrativeConfig::default(),
        ));
        let dyn_store: Arc<dyn InsightStore> = store.clone();
        let state = AppState::assemble(
            Collaborators {
                store: dyn_store,
                engine,
                analysis: self.analysis.clone(),
                audio: audio.clone(),
                db: None,
            },
            self.api_config,
            self.insight_config,
        );
        let router = create_api_router(state.clone(), true);

        TestApp {
            router,
            store,
            generator,
            analysis: self.analysis,
            audio,
            state,
        }
    }
}

impl TestApp {
    /// Send `request` and return the status plus the JSON body.
    pub async fn send(&self, request: Request<Body>) -> (u16, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status().as_u16();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    pub async fn get(&self, uri: &str) -> (u16, Value) {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    pub async fn post(&self, uri: &str) -> (u16, Value) {
        self.send(Request::post(uri).body(Body::empty()).unwrap())
            .await
    }
}

// ============================================================================
// MULTIPART
// ============================================================================

pub const BOUNDARY: &str = "callsight-test-boundary";

/// Hand-built `multipart/form-data` body.
#[derive(Default)]
pub struct Form {
    body: Vec<u8>,
}

impl Form {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, file_name: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: audio/mpeg\r\n\r\n",
                BOUNDARY, file_name
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn into_request(mut self, uri: &str) -> Request<Body> {
        self.body
            .extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        Request::post(uri)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(self.body))
            .unwrap()
    }
}
