//! Call ingestion: resolve identifiers, store the recording, persist the
//! call as `pending` and hand it to the processor in the background.

use callsight_core::{
    Agent, CallContext, CallId, CallRecord, CallsightResult, City, EntityType, ProcessingStatus,
    ValidationError,
};
use callsight_storage::InsightStore;
use std::sync::Arc;

use super::audio::{probe_duration_secs, storage_file_name, AudioStore};
use super::processing::CallProcessor;

/// A validated upload plus its form metadata.
#[derive(Debug, Clone, Default)]
pub struct IngestRequest {
    pub agent_identifier: String,
    pub issue_category: String,
    pub city_identifier: String,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub call_context: Option<String>,
    pub agent_manual_note: Option<String>,
    pub customer_preferred_language: Option<String>,
    pub file_name: String,
    pub audio: Vec<u8>,
}

/// What ingestion hands back to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestReceipt {
    pub call_id: CallId,
    pub file_name: String,
    pub duration_seconds: i32,
}

pub struct IngestService {
    store: Arc<dyn InsightStore>,
    audio: Arc<dyn AudioStore>,
    processor: Arc<CallProcessor>,
    phone_prefix: String,
}

impl IngestService {
    pub fn new(
        store: Arc<dyn InsightStore>,
        audio: Arc<dyn AudioStore>,
        processor: Arc<CallProcessor>,
        phone_prefix: impl Into<String>,
    ) -> Self {
        Self {
            store,
            audio,
            processor,
            phone_prefix: phone_prefix.into(),
        }
    }

    /// Persist the call and queue it for analysis.
    ///
    /// Probe and upload failures degrade (zero duration, placeholder URL);
    /// input problems are validation errors and nothing is written.
    pub async fn ingest(&self, request: IngestRequest) -> CallsightResult<IngestReceipt> {
        let agent_identifier = required("agent_identifier", &request.agent_identifier)?;
        let issue_category = required("issue_category", &request.issue_category)?;
        let city_identifier = required("city_identifier", &request.city_identifier)?;
        check_mp3(&request.file_name)?;

        let call_context = match non_blank(request.call_context.as_deref()) {
            Some(raw) => CallContext::from_db_str(&raw.to_uppercase())
                .map_err(ValidationError::from)?,
            None => CallContext::default(),
        };

        let agent = self.resolve_agent(agent_identifier).await?;
        let city = self.resolve_city(city_identifier).await?;

        let duration_seconds = probe_duration_secs(&request.audio);
        let stored_name = storage_file_name(&request.file_name);
        let audio_url = match self.audio.store(&stored_name, &request.audio).await {
            Ok(url) => url,
            Err(err) => {
                tracing::warn!(error = %err, "Recording upload failed, using placeholder URL");
                self.audio.placeholder_url()
            }
        };

        let call = CallRecord {
            call_id: callsight_core::new_entity_id(),
            agent_id: Some(agent.agent_id),
            city_id: Some(city.city_id),
            customer_name: non_blank(request.customer_name.as_deref()).map(str::to_string),
            customer_phone: non_blank(request.customer_phone.as_deref())
                .map(|phone| with_country_prefix(phone, &self.phone_prefix)),
            customer_preferred_language: non_blank(request.customer_preferred_language.as_deref())
                .map(str::to_string),
            audio_url,
            duration_seconds,
            call_timestamp: chrono::Utc::now(),
            call_context,
            primary_issue_category: Some(issue_category.to_string()),
            agent_manual_note: non_blank(request.agent_manual_note.as_deref()).map(str::to_string),
            processing_status: ProcessingStatus::Pending,
        };
        self.store.call_insert(&call).await?;

        tracing::info!(
            call_id = %call.call_id,
            agent_id = %agent.agent_id,
            city_id = city.city_id,
            duration_seconds,
            "Call ingested"
        );

        self.spawn_processing(call.call_id);

        Ok(IngestReceipt {
            call_id: call.call_id,
            file_name: request.file_name,
            duration_seconds,
        })
    }

    /// Run analysis for `call_id` on a background task.
    pub fn spawn_processing(&self, call_id: CallId) {
        let processor = Arc::clone(&self.processor);
        tokio::spawn(async move {
            if let Err(err) = processor.process(call_id).await {
                tracing::error!(call_id = %call_id, error = %err, "Background processing failed");
            }
        });
    }

    /// Resolve an agent by UUID, employee code or name, in that order.
    pub async fn resolve_agent(&self, identifier: &str) -> CallsightResult<Agent> {
        let identifier = identifier.trim();
        if let Ok(id) = uuid::Uuid::parse_str(identifier) {
            if let Some(agent) = self.store.agent_get(id).await? {
                return Ok(agent);
            }
        }
        if let Some(agent) = self.store.agent_by_employee_id(identifier).await? {
            return Ok(agent);
        }
        if let Some(agent) = self.store.agent_by_name(identifier).await? {
            return Ok(agent);
        }
        Err(ValidationError::UnresolvedIdentifier {
            entity_type: EntityType::Agent,
            identifier: identifier.to_string(),
        }
        .into())
    }

    /// Resolve a city by numeric id or name.
    pub async fn resolve_city(&self, identifier: &str) -> CallsightResult<City> {
        let identifier = identifier.trim();
        if let Ok(id) = identifier.parse::<i32>() {
            if let Some(city) = self.store.city_get(id).await? {
                return Ok(city);
            }
        }
        if let Some(city) = self.store.city_by_name(identifier).await? {
            return Ok(city);
        }
        Err(ValidationError::UnresolvedIdentifier {
            entity_type: EntityType::City,
            identifier: identifier.to_string(),
        }
        .into())
    }
}

impl std::fmt::Debug for IngestService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestService")
            .field("phone_prefix", &self.phone_prefix)
            .finish_non_exhaustive()
    }
}

/// Prefix `phone` with `prefix` unless it already carries it.
pub fn with_country_prefix(phone: &str, prefix: &str) -> String {
    let phone = phone.trim();
    if phone.starts_with(prefix) {
        phone.to_string()
    } else {
        format!("{}{}", prefix, phone)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn required<'a>(field: &str, value: &'a str) -> Result<&'a str, ValidationError> {
    non_blank(Some(value)).ok_or_else(|| ValidationError::RequiredFieldMissing {
        field: field.to_string(),
    })
}

fn check_mp3(file_name: &str) -> Result<(), ValidationError> {
    if file_name.trim().is_empty() {
        return Err(ValidationError::RequiredFieldMissing {
            field: "file".to_string(),
        });
    }
    if !file_name.to_lowercase().ends_with(".mp3") {
        return Err(ValidationError::InvalidValue {
            field: "file".to_string(),
            reason: "Only .mp3 recordings are accepted".to_string(),
        });
    }
    Ok(())
}
