//! Database Connection Pool Module
//!
//! PostgreSQL connection pooling using deadpool-postgres, and the
//! Postgres-backed [`InsightStore`].
//!
//! Insight records are stored as one `jsonb` document per entity beside the
//! clock columns the refresh decision reads. Upserts run in a transaction
//! that locks the row with `SELECT ... FOR UPDATE`, so concurrent writers
//! for the same entity apply their mutators one after the other.

use crate::error::{ApiError, ApiResult};
use async_trait::async_trait;
use callsight_core::{
    Agent, AgentId, AgentInsight, AnalyzedCall, CallContext, CallId, CallOutcome, CallRecord,
    CallsightError, CallsightResult, City, CityId, CityInsight, EntityKey, EntityType, Escalation,
    Languages, NewCity, OutcomeScores, ProcessingStatus, StorageError, Timestamp,
};
use callsight_storage::{CallTotals, InsightMutator, InsightStore};
use deadpool_postgres::{Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime};
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value as JsonValue;
use std::time::Duration;
use tokio_postgres::error::SqlState;
use tokio_postgres::{NoTls, Row};
use uuid::Uuid;

/// Bootstrap DDL, applied idempotently at start-up.
pub const SCHEMA_SQL: &str = include_str!("schema.sql");

// ============================================================================
// CONNECTION POOL CONFIGURATION
// ============================================================================

/// Database connection pool configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// PostgreSQL host
    pub host: String,
    /// PostgreSQL port
    pub port: u16,
    /// Database name
    pub dbname: String,
    /// Database user
    pub user: String,
    /// Database password
    pub password: SecretString,
    /// Maximum pool size
    pub max_size: usize,
    /// Wait timeout for a pooled connection
    pub timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "callsight".to_string(),
            user: "postgres".to_string(),
            password: SecretString::new(String::new().into()),
            max_size: 16,
            timeout: Duration::from_secs(30),
        }
    }
}

impl DbConfig {
    /// Create a new database configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("CALLSIGHT_DB_HOST").unwrap_or(defaults.host),
            port: std::env::var("CALLSIGHT_DB_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            dbname: std::env::var("CALLSIGHT_DB_NAME").unwrap_or(defaults.dbname),
            user: std::env::var("CALLSIGHT_DB_USER").unwrap_or(defaults.user),
            password: std::env::var("CALLSIGHT_DB_PASSWORD")
                .map(|p| SecretString::new(p.into()))
                .unwrap_or(defaults.password),
            max_size: std::env::var("CALLSIGHT_DB_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_size),
            timeout: std::env::var("CALLSIGHT_DB_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
        }
    }

    /// Create a connection pool from this configuration.
    pub fn create_pool(&self) -> ApiResult<Pool> {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = Some(self.password.expose_secret().to_string());

        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let mut pool_cfg = PoolConfig::new(self.max_size);
        pool_cfg.timeouts.wait = Some(self.timeout);
        cfg.pool = Some(pool_cfg);

        cfg.create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| ApiError::database_error(format!("Failed to create pool: {}", e)))
    }
}

// ============================================================================
// DATABASE CLIENT WRAPPER
// ============================================================================

/// Database client wrapping a connection pool.
#[derive(Clone)]
pub struct DbClient {
    pool: Pool,
}

impl DbClient {
    /// Create a new database client with the given pool.
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Create a new database client from configuration.
    pub fn from_config(config: &DbConfig) -> ApiResult<Self> {
        let pool = config.create_pool()?;
        Ok(Self::new(pool))
    }

    /// Get the current pool size for observability.
    pub fn pool_size(&self) -> usize {
        self.pool.status().size
    }

    /// Get a connection from the pool.
    async fn get_conn(&self) -> ApiResult<deadpool_postgres::Object> {
        self.pool.get().await.map_err(ApiError::from)
    }

    /// Health check - verifies database connectivity.
    pub async fn health_check(&self) -> ApiResult<()> {
        let conn = self.get_conn().await?;
        conn.query_one("SELECT 1", &[]).await?;
        Ok(())
    }

    /// Apply the bootstrap DDL.
    pub async fn bootstrap(&self) -> ApiResult<()> {
        let conn = self.get_conn().await?;
        conn.batch_execute(SCHEMA_SQL).await?;
        tracing::info!("Database schema applied");
        Ok(())
    }

    async fn store_conn(&self) -> CallsightResult<deadpool_postgres::Object> {
        self.pool.get().await.map_err(|e| {
            tracing::error!("Connection pool error: {:?}", e);
            CallsightError::from(StorageError::Backend {
                reason: format!("connection pool: {}", e),
            })
        })
    }
}

// ============================================================================
// ERROR AND ROW HELPERS
// ============================================================================

fn backend(err: tokio_postgres::Error) -> CallsightError {
    tracing::error!("Database error: {:?}", err);
    StorageError::Backend {
        reason: err.to_string(),
    }
    .into()
}

fn insert_failed(entity_type: EntityType, err: tokio_postgres::Error) -> CallsightError {
    if err.code() == Some(&SqlState::UNIQUE_VIOLATION) {
        return StorageError::InsertFailed {
            entity_type,
            reason: "already exists".to_string(),
        }
        .into();
    }
    backend(err)
}

fn encode<T: Serialize>(entity_type: EntityType, value: &T) -> CallsightResult<JsonValue> {
    serde_json::to_value(value).map_err(|e| {
        StorageError::InsertFailed {
            entity_type,
            reason: e.to_string(),
        }
        .into()
    })
}

fn decode<T: DeserializeOwned>(value: JsonValue) -> CallsightResult<T> {
    serde_json::from_value(value).map_err(|e| {
        StorageError::Backend {
            reason: format!("corrupt insight record: {}", e),
        }
        .into()
    })
}

/// `%needle%` with LIKE metacharacters escaped.
fn like_pattern(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len() + 2);
    escaped.push('%');
    for ch in query.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

const AGENT_COLUMNS: &str = "agent_id, name, employee_id, languages, created_at";

fn row_to_agent(row: &Row) -> CallsightResult<Agent> {
    let languages: Vec<String> = row.try_get("languages").map_err(backend)?;
    Ok(Agent {
        agent_id: row.try_get("agent_id").map_err(backend)?,
        name: row.try_get("name").map_err(backend)?,
        employee_id: row.try_get("employee_id").map_err(backend)?,
        languages: Languages::new(languages),
        created_at: row.try_get("created_at").map_err(backend)?,
    })
}

fn row_to_city(row: &Row) -> CallsightResult<City> {
    Ok(City {
        city_id: row.try_get("city_id").map_err(backend)?,
        name: row.try_get("name").map_err(backend)?,
        state: row.try_get("state").map_err(backend)?,
    })
}

/// Call columns joined with outcome columns (prefixed `o_`).
const JOINED_COLUMNS: &str = "c.call_id, c.agent_id, c.city_id, c.customer_name, \
    c.customer_phone, c.customer_preferred_language, c.audio_url, c.duration_seconds, \
    c.call_timestamp, c.call_context, c.primary_issue_category, c.agent_manual_note, \
    c.processing_status, \
    o.call_id AS o_call_id, o.transcript AS o_transcript, o.language_spoken AS o_language_spoken, \
    o.sop_compliance AS o_sop_compliance, o.conversation_control AS o_conversation_control, \
    o.communication AS o_communication, o.coaching_priority AS o_coaching_priority, \
    o.sentiment_stabilization AS o_sentiment_stabilization, \
    o.resolution_validity AS o_resolution_validity, o.overall_quality AS o_overall_quality, \
    o.escalation_risk AS o_escalation_risk, o.why_flagged AS o_why_flagged, \
    o.human_remarks AS o_human_remarks, o.business_insight AS o_business_insight, \
    o.coaching_insight AS o_coaching_insight, o.sop_deviations AS o_sop_deviations, \
    o.sentiment_trajectory AS o_sentiment_trajectory, o.issue_analysis AS o_issue_analysis, \
    o.resolution_analysis AS o_resolution_analysis, o.created_at AS o_created_at";

const JOINED_FROM: &str = "FROM calls c LEFT JOIN call_outcomes o ON o.call_id = c.call_id";

fn row_to_call(row: &Row) -> CallsightResult<CallRecord> {
    let context: String = row.try_get("call_context").map_err(backend)?;
    let status: String = row.try_get("processing_status").map_err(backend)?;
    Ok(CallRecord {
        call_id: row.try_get("call_id").map_err(backend)?,
        agent_id: row.try_get("agent_id").map_err(backend)?,
        city_id: row.try_get("city_id").map_err(backend)?,
        customer_name: row.try_get("customer_name").map_err(backend)?,
        customer_phone: row.try_get("customer_phone").map_err(backend)?,
        customer_preferred_language: row
            .try_get("customer_preferred_language")
            .map_err(backend)?,
        audio_url: row.try_get("audio_url").map_err(backend)?,
        duration_seconds: row.try_get("duration_seconds").map_err(backend)?,
        call_timestamp: row.try_get("call_timestamp").map_err(backend)?,
        call_context: CallContext::from_db_str(&context).unwrap_or_default(),
        primary_issue_category: row.try_get("primary_issue_category").map_err(backend)?,
        agent_manual_note: row.try_get("agent_manual_note").map_err(backend)?,
        processing_status: ProcessingStatus::from_db_str(&status).map_err(|e| {
            CallsightError::from(StorageError::Backend {
                reason: e.to_string(),
            })
        })?,
    })
}

fn row_to_outcome(row: &Row) -> CallsightResult<Option<CallOutcome>> {
    let call_id: Option<Uuid> = row.try_get("o_call_id").map_err(backend)?;
    let Some(call_id) = call_id else {
        return Ok(None);
    };
    let get_f64 = |name: &str| row.try_get::<_, f64>(name).map_err(backend);
    let get_json = |name: &str| {
        row.try_get::<_, Option<JsonValue>>(name)
            .map(|v| v.unwrap_or(JsonValue::Null))
            .map_err(backend)
    };

    let escalation = Escalation::from_signal(
        row.try_get("o_escalation_risk").map_err(backend)?,
        row.try_get("o_why_flagged").map_err(backend)?,
    )?;

    Ok(Some(CallOutcome {
        call_id,
        transcript: row.try_get("o_transcript").map_err(backend)?,
        language_spoken: row.try_get("o_language_spoken").map_err(backend)?,
        scores: OutcomeScores {
            sop_compliance: get_f64("o_sop_compliance")?,
            conversation_control: get_f64("o_conversation_control")?,
            communication: get_f64("o_communication")?,
            coaching_priority: get_f64("o_coaching_priority")?,
            sentiment_stabilization: get_f64("o_sentiment_stabilization")?,
            resolution_validity: get_f64("o_resolution_validity")?,
            overall_quality: get_f64("o_overall_quality")?,
        },
        escalation,
        human_remarks: row.try_get("o_human_remarks").map_err(backend)?,
        business_insight: row.try_get("o_business_insight").map_err(backend)?,
        coaching_insight: row.try_get("o_coaching_insight").map_err(backend)?,
        sop_deviations: get_json("o_sop_deviations")?,
        sentiment_trajectory: get_json("o_sentiment_trajectory")?,
        issue_analysis: get_json("o_issue_analysis")?,
        resolution_analysis: get_json("o_resolution_analysis")?,
        created_at: row.try_get("o_created_at").map_err(backend)?,
    }))
}

fn rows_to_joined(rows: &[Row]) -> CallsightResult<Vec<AnalyzedCall>> {
    rows.iter()
        .map(|row| {
            Ok(AnalyzedCall {
                call: row_to_call(row)?,
                outcome: row_to_outcome(row)?,
            })
        })
        .collect()
}

const TOTALS_SQL: &str = "SELECT count(*) AS calls, \
    count(*) FILTER (WHERE primary_issue_category ILIKE '%emergency%') AS emergencies \
    FROM calls";

// ============================================================================
// INSIGHT STORE IMPLEMENTATION
// ============================================================================

#[async_trait]
impl InsightStore for DbClient {
    // === Agent Operations ===

    async fn agent_insert(&self, agent: &Agent) -> CallsightResult<()> {
        let conn = self.store_conn().await?;
        conn.execute(
            "INSERT INTO agents (agent_id, name, employee_id, languages, created_at) \
             VALUES ($1, $2, $3, $4, $5)",
            &[
                &agent.agent_id,
                &agent.name,
                &agent.employee_id,
                &agent.languages.as_slice(),
                &agent.created_at,
            ],
        )
        .await
        .map_err(|e| insert_failed(EntityType::Agent, e))?;
        Ok(())
    }

    async fn agent_get(&self, id: AgentId) -> CallsightResult<Option<Agent>> {
        let conn = self.store_conn().await?;
        let row = conn
            .query_opt(
                &format!("SELECT {} FROM agents WHERE agent_id = $1", AGENT_COLUMNS),
                &[&id],
            )
            .await
            .map_err(backend)?;
        row.as_ref().map(row_to_agent).transpose()
    }

    async fn agent_by_employee_id(&self, employee_id: &str) -> CallsightResult<Option<Agent>> {
        let conn = self.store_conn().await?;
        let row = conn
            .query_opt(
                &format!("SELECT {} FROM agents WHERE employee_id = $1", AGENT_COLUMNS),
                &[&employee_id],
            )
            .await
            .map_err(backend)?;
        row.as_ref().map(row_to_agent).transpose()
    }

    async fn agent_by_name(&self, name: &str) -> CallsightResult<Option<Agent>> {
        let conn = self.store_conn().await?;
        let row = conn
            .query_opt(
                &format!(
                    "SELECT {} FROM agents WHERE lower(name) = lower($1) \
                     ORDER BY created_at LIMIT 1",
                    AGENT_COLUMNS
                ),
                &[&name],
            )
            .await
            .map_err(backend)?;
        row.as_ref().map(row_to_agent).transpose()
    }

    async fn agent_search(&self, query: &str, limit: usize) -> CallsightResult<Vec<Agent>> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.store_conn().await?;
        let rows = conn
            .query(
                &format!(
                    "SELECT {} FROM agents \
                     WHERE lower(name) LIKE $1 ESCAPE '\\' OR lower(employee_id) LIKE $1 ESCAPE '\\' \
                     ORDER BY name LIMIT $2",
                    AGENT_COLUMNS
                ),
                &[&like_pattern(&needle), &(limit as i64)],
            )
            .await
            .map_err(backend)?;
        rows.iter().map(row_to_agent).collect()
    }

    async fn agent_list(&self) -> CallsightResult<Vec<Agent>> {
        let conn = self.store_conn().await?;
        let rows = conn
            .query(
                &format!("SELECT {} FROM agents ORDER BY name", AGENT_COLUMNS),
                &[],
            )
            .await
            .map_err(backend)?;
        rows.iter().map(row_to_agent).collect()
    }

    async fn agent_delete(&self, id: AgentId) -> CallsightResult<()> {
        let conn = self.store_conn().await?;
        let deleted = conn
            .execute("DELETE FROM agents WHERE agent_id = $1", &[&id])
            .await
            .map_err(backend)?;
        if deleted == 0 {
            return Err(StorageError::not_found(EntityType::Agent, id).into());
        }
        Ok(())
    }

    // === City Operations ===

    async fn city_insert(&self, city: &NewCity) -> CallsightResult<City> {
        let conn = self.store_conn().await?;
        let row = conn
            .query_one(
                "INSERT INTO cities (name, state) VALUES ($1, $2) \
                 RETURNING city_id, name, state",
                &[&city.name, &city.state],
            )
            .await
            .map_err(|e| insert_failed(EntityType::City, e))?;
        row_to_city(&row)
    }

    async fn city_get(&self, id: CityId) -> CallsightResult<Option<City>> {
        let conn = self.store_conn().await?;
        let row = conn
            .query_opt(
                "SELECT city_id, name, state FROM cities WHERE city_id = $1",
                &[&id],
            )
            .await
            .map_err(backend)?;
        row.as_ref().map(row_to_city).transpose()
    }

    async fn city_by_name(&self, name: &str) -> CallsightResult<Option<City>> {
        let conn = self.store_conn().await?;
        let row = conn
            .query_opt(
                "SELECT city_id, name, state FROM cities WHERE lower(name) = lower($1) LIMIT 1",
                &[&name.trim()],
            )
            .await
            .map_err(backend)?;
        row.as_ref().map(row_to_city).transpose()
    }

    async fn city_list(&self) -> CallsightResult<Vec<City>> {
        let conn = self.store_conn().await?;
        let rows = conn
            .query("SELECT city_id, name, state FROM cities ORDER BY name", &[])
            .await
            .map_err(backend)?;
        rows.iter().map(row_to_city).collect()
    }

    // === Insight Operations ===

    async fn agent_insight_get(&self, id: AgentId) -> CallsightResult<Option<AgentInsight>> {
        let conn = self.store_conn().await?;
        let row = conn
            .query_opt("SELECT record FROM agent_insights WHERE agent_id = $1", &[&id])
            .await
            .map_err(backend)?;
        row.map(|r| decode(r.get(0))).transpose()
    }

    async fn agent_insight_upsert(
        &self,
        id: AgentId,
        mutator: InsightMutator<AgentInsight>,
    ) -> CallsightResult<AgentInsight> {
        let mut conn = self.store_conn().await?;
        let tx = conn.transaction().await.map_err(backend)?;

        let exists = tx
            .query_opt("SELECT 1 FROM agents WHERE agent_id = $1", &[&id])
            .await
            .map_err(backend)?;
        if exists.is_none() {
            return Err(StorageError::not_found(EntityType::Agent, id).into());
        }

        let empty = encode(EntityType::AgentInsight, &AgentInsight::empty(id))?;
        tx.execute(
            "INSERT INTO agent_insights (agent_id, record) VALUES ($1, $2) \
             ON CONFLICT (agent_id) DO NOTHING",
            &[&id, &empty],
        )
        .await
        .map_err(backend)?;

        let row = tx
            .query_one(
                "SELECT record FROM agent_insights WHERE agent_id = $1 FOR UPDATE",
                &[&id],
            )
            .await
            .map_err(backend)?;
        let mut record: AgentInsight = decode(row.get(0))?;
        mutator(&mut record);
        record.agent_id = id;
        record.updated_at = chrono::Utc::now();

        let encoded = encode(EntityType::AgentInsight, &record)?;
        tx.execute(
            "UPDATE agent_insights \
             SET record = $2, last_insight_generated_at = $3, updated_at = $4 \
             WHERE agent_id = $1",
            &[
                &id,
                &encoded,
                &record.last_insight_generated_at,
                &record.updated_at,
            ],
        )
        .await
        .map_err(backend)?;
        tx.commit().await.map_err(backend)?;
        Ok(record)
    }

    async fn agent_insight_list(&self) -> CallsightResult<Vec<AgentInsight>> {
        let conn = self.store_conn().await?;
        let rows = conn
            .query("SELECT record FROM agent_insights", &[])
            .await
            .map_err(backend)?;
        rows.into_iter().map(|r| decode(r.get(0))).collect()
    }

    async fn city_insight_get(&self, id: CityId) -> CallsightResult<Option<CityInsight>> {
        let conn = self.store_conn().await?;
        let row = conn
            .query_opt("SELECT record FROM city_insights WHERE city_id = $1", &[&id])
            .await
            .map_err(backend)?;
        row.map(|r| decode(r.get(0))).transpose()
    }

    async fn city_insight_upsert(
        &self,
        id: CityId,
        mutator: InsightMutator<CityInsight>,
    ) -> CallsightResult<CityInsight> {
        let mut conn = self.store_conn().await?;
        let tx = conn.transaction().await.map_err(backend)?;

        let exists = tx
            .query_opt("SELECT 1 FROM cities WHERE city_id = $1", &[&id])
            .await
            .map_err(backend)?;
        if exists.is_none() {
            return Err(StorageError::not_found(EntityType::City, id).into());
        }

        let empty = encode(EntityType::CityInsight, &CityInsight::empty(id))?;
        tx.execute(
            "INSERT INTO city_insights (city_id, record) VALUES ($1, $2) \
             ON CONFLICT (city_id) DO NOTHING",
            &[&id, &empty],
        )
        .await
        .map_err(backend)?;

        let row = tx
            .query_one(
                "SELECT record FROM city_insights WHERE city_id = $1 FOR UPDATE",
                &[&id],
            )
            .await
            .map_err(backend)?;
        let mut record: CityInsight = decode(row.get(0))?;
        mutator(&mut record);
        record.city_id = id;
        record.updated_at = chrono::Utc::now();

        let encoded = encode(EntityType::CityInsight, &record)?;
        tx.execute(
            "UPDATE city_insights \
             SET record = $2, last_insight_generated_at = $3, updated_at = $4 \
             WHERE city_id = $1",
            &[
                &id,
                &encoded,
                &record.last_insight_generated_at,
                &record.updated_at,
            ],
        )
        .await
        .map_err(backend)?;
        tx.commit().await.map_err(backend)?;
        Ok(record)
    }

    async fn city_insight_list(&self) -> CallsightResult<Vec<CityInsight>> {
        let conn = self.store_conn().await?;
        let rows = conn
            .query("SELECT record FROM city_insights", &[])
            .await
            .map_err(backend)?;
        rows.into_iter().map(|r| decode(r.get(0))).collect()
    }

    // === Call Operations ===

    async fn call_insert(&self, call: &CallRecord) -> CallsightResult<()> {
        let conn = self.store_conn().await?;
        conn.execute(
            "INSERT INTO calls (call_id, agent_id, city_id, customer_name, customer_phone, \
             customer_preferred_language, audio_url, duration_seconds, call_timestamp, \
             call_context, primary_issue_category, agent_manual_note, processing_status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
            &[
                &call.call_id,
                &call.agent_id,
                &call.city_id,
                &call.customer_name,
                &call.customer_phone,
                &call.customer_preferred_language,
                &call.audio_url,
                &call.duration_seconds,
                &call.call_timestamp,
                &call.call_context.as_db_str(),
                &call.primary_issue_category,
                &call.agent_manual_note,
                &call.processing_status.as_db_str(),
            ],
        )
        .await
        .map_err(|e| insert_failed(EntityType::Call, e))?;
        Ok(())
    }

    async fn call_get(&self, id: CallId) -> CallsightResult<Option<CallRecord>> {
        let conn = self.store_conn().await?;
        let row = conn
            .query_opt(
                &format!("SELECT {} {} WHERE c.call_id = $1", JOINED_COLUMNS, JOINED_FROM),
                &[&id],
            )
            .await
            .map_err(backend)?;
        row.as_ref().map(row_to_call).transpose()
    }

    async fn call_set_status(
        &self,
        id: CallId,
        next: ProcessingStatus,
    ) -> CallsightResult<ProcessingStatus> {
        let mut conn = self.store_conn().await?;
        let tx = conn.transaction().await.map_err(backend)?;

        let row = tx
            .query_opt(
                "SELECT processing_status FROM calls WHERE call_id = $1 FOR UPDATE",
                &[&id],
            )
            .await
            .map_err(backend)?
            .ok_or_else(|| StorageError::not_found(EntityType::Call, id))?;
        let raw: String = row.get(0);
        let current = ProcessingStatus::from_db_str(&raw).map_err(|e| {
            CallsightError::from(StorageError::Backend {
                reason: e.to_string(),
            })
        })?;
        let next = current.transition_to(next)?;

        if next != current {
            tx.execute(
                "UPDATE calls SET processing_status = $2 WHERE call_id = $1",
                &[&id, &next.as_db_str()],
            )
            .await
            .map_err(backend)?;
        }
        tx.commit().await.map_err(backend)?;
        Ok(next)
    }

    async fn call_delete(&self, id: CallId) -> CallsightResult<()> {
        let conn = self.store_conn().await?;
        let deleted = conn
            .execute("DELETE FROM calls WHERE call_id = $1", &[&id])
            .await
            .map_err(backend)?;
        if deleted == 0 {
            return Err(StorageError::not_found(EntityType::Call, id).into());
        }
        Ok(())
    }

    async fn outcome_attach(&self, outcome: &CallOutcome) -> CallsightResult<()> {
        outcome.scores.check_domains()?;
        let conn = self.store_conn().await?;

        let exists = conn
            .query_opt("SELECT 1 FROM calls WHERE call_id = $1", &[&outcome.call_id])
            .await
            .map_err(backend)?;
        if exists.is_none() {
            return Err(StorageError::not_found(EntityType::Call, outcome.call_id).into());
        }

        let s = &outcome.scores;
        conn.execute(
            "INSERT INTO call_outcomes (call_id, transcript, language_spoken, sop_compliance, \
             conversation_control, communication, coaching_priority, sentiment_stabilization, \
             resolution_validity, overall_quality, escalation_risk, why_flagged, human_remarks, \
             business_insight, coaching_insight, sop_deviations, sentiment_trajectory, \
             issue_analysis, resolution_analysis, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, \
             $17, $18, $19, $20) \
             ON CONFLICT (call_id) DO UPDATE SET \
             transcript = EXCLUDED.transcript, language_spoken = EXCLUDED.language_spoken, \
             sop_compliance = EXCLUDED.sop_compliance, \
             conversation_control = EXCLUDED.conversation_control, \
             communication = EXCLUDED.communication, \
             coaching_priority = EXCLUDED.coaching_priority, \
             sentiment_stabilization = EXCLUDED.sentiment_stabilization, \
             resolution_validity = EXCLUDED.resolution_validity, \
             overall_quality = EXCLUDED.overall_quality, \
             escalation_risk = EXCLUDED.escalation_risk, why_flagged = EXCLUDED.why_flagged, \
             human_remarks = EXCLUDED.human_remarks, \
             business_insight = EXCLUDED.business_insight, \
             coaching_insight = EXCLUDED.coaching_insight, \
             sop_deviations = EXCLUDED.sop_deviations, \
             sentiment_trajectory = EXCLUDED.sentiment_trajectory, \
             issue_analysis = EXCLUDED.issue_analysis, \
             resolution_analysis = EXCLUDED.resolution_analysis, \
             created_at = EXCLUDED.created_at",
            &[
                &outcome.call_id,
                &outcome.transcript,
                &outcome.language_spoken,
                &s.sop_compliance,
                &s.conversation_control,
                &s.communication,
                &s.coaching_priority,
                &s.sentiment_stabilization,
                &s.resolution_validity,
                &s.overall_quality,
                &outcome.escalation.is_flagged(),
                &outcome.escalation.reason(),
                &outcome.human_remarks,
                &outcome.business_insight,
                &outcome.coaching_insight,
                &outcome.sop_deviations,
                &outcome.sentiment_trajectory,
                &outcome.issue_analysis,
                &outcome.resolution_analysis,
                &outcome.created_at,
            ],
        )
        .await
        .map_err(|e| insert_failed(EntityType::CallOutcome, e))?;
        Ok(())
    }

    async fn outcome_get(&self, call_id: CallId) -> CallsightResult<Option<CallOutcome>> {
        let conn = self.store_conn().await?;
        let row = conn
            .query_opt(
                &format!(
                    "SELECT {} {} WHERE c.call_id = $1",
                    JOINED_COLUMNS, JOINED_FROM
                ),
                &[&call_id],
            )
            .await
            .map_err(backend)?;
        match row {
            Some(row) => row_to_outcome(&row),
            None => Ok(None),
        }
    }

    async fn calls_for_agent_since(
        &self,
        id: AgentId,
        since: Timestamp,
    ) -> CallsightResult<Vec<AnalyzedCall>> {
        let conn = self.store_conn().await?;
        let rows = conn
            .query(
                &format!(
                    "SELECT {} {} WHERE c.agent_id = $1 AND c.call_timestamp >= $2 \
                     ORDER BY c.call_timestamp DESC",
                    JOINED_COLUMNS, JOINED_FROM
                ),
                &[&id, &since],
            )
            .await
            .map_err(backend)?;
        rows_to_joined(&rows)
    }

    async fn calls_for_city_since(
        &self,
        id: CityId,
        since: Timestamp,
    ) -> CallsightResult<Vec<AnalyzedCall>> {
        let conn = self.store_conn().await?;
        let rows = conn
            .query(
                &format!(
                    "SELECT {} {} WHERE c.city_id = $1 AND c.call_timestamp >= $2 \
                     ORDER BY c.call_timestamp DESC",
                    JOINED_COLUMNS, JOINED_FROM
                ),
                &[&id, &since],
            )
            .await
            .map_err(backend)?;
        rows_to_joined(&rows)
    }

    async fn has_activity_since(&self, key: EntityKey, since: Timestamp) -> CallsightResult<bool> {
        let conn = self.store_conn().await?;
        let row = match key {
            EntityKey::Agent(id) => {
                conn.query_one(
                    "SELECT EXISTS (SELECT 1 FROM calls WHERE agent_id = $1 AND call_timestamp >= $2)",
                    &[&id, &since],
                )
                .await
            }
            EntityKey::City(id) => {
                conn.query_one(
                    "SELECT EXISTS (SELECT 1 FROM calls WHERE city_id = $1 AND call_timestamp >= $2)",
                    &[&id, &since],
                )
                .await
            }
        }
        .map_err(backend)?;
        Ok(row.get(0))
    }

    async fn call_totals(&self, key: EntityKey) -> CallsightResult<CallTotals> {
        let conn = self.store_conn().await?;
        let row = match key {
            EntityKey::Agent(id) => {
                conn.query_one(&format!("{} WHERE agent_id = $1", TOTALS_SQL), &[&id])
                    .await
            }
            EntityKey::City(id) => {
                conn.query_one(&format!("{} WHERE city_id = $1", TOTALS_SQL), &[&id])
                    .await
            }
        }
        .map_err(backend)?;
        Ok(CallTotals {
            calls: row.try_get("calls").map_err(backend)?,
            emergencies: row.try_get("emergencies").map_err(backend)?,
        })
    }

    async fn call_count(&self) -> CallsightResult<i64> {
        let conn = self.store_conn().await?;
        let row = conn
            .query_one("SELECT count(*) FROM calls", &[])
            .await
            .map_err(backend)?;
        Ok(row.get(0))
    }

    async fn escalations_since(&self, since: Timestamp) -> CallsightResult<Vec<AnalyzedCall>> {
        let conn = self.store_conn().await?;
        let rows = conn
            .query(
                &format!(
                    "SELECT {} {} WHERE c.call_timestamp >= $1 AND o.escalation_risk \
                     ORDER BY c.call_timestamp DESC",
                    JOINED_COLUMNS, JOINED_FROM
                ),
                &[&since],
            )
            .await
            .map_err(backend)?;
        rows_to_joined(&rows)
    }

    async fn worst_call_for_agent_since(
        &self,
        id: AgentId,
        since: Timestamp,
    ) -> CallsightResult<Option<AnalyzedCall>> {
        let conn = self.store_conn().await?;
        let rows = conn
            .query(
                &format!(
                    "SELECT {} {} WHERE c.agent_id = $1 AND c.call_timestamp >= $2 \
                     AND o.call_id IS NOT NULL \
                     ORDER BY o.overall_quality ASC, c.call_timestamp DESC LIMIT 1",
                    JOINED_COLUMNS, JOINED_FROM
                ),
                &[&id, &since],
            )
            .await
            .map_err(backend)?;
        Ok(rows_to_joined(&rows)?.into_iter().next())
    }

    async fn city_top_issue(&self, id: CityId) -> CallsightResult<Option<String>> {
        let conn = self.store_conn().await?;
        let row = conn
            .query_opt(
                "SELECT primary_issue_category FROM calls \
                 WHERE city_id = $1 AND primary_issue_category IS NOT NULL \
                 GROUP BY primary_issue_category \
                 ORDER BY count(*) DESC, primary_issue_category ASC LIMIT 1",
                &[&id],
            )
            .await
            .map_err(backend)?;
        Ok(row.map(|r| r.get(0)))
    }
}
