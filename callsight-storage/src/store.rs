//! Async store trait for Callsight entities.
//!
//! Implementations back the insight pipeline and the HTTP read models. The
//! in-memory store in this crate serves tests and the `memory` backend; the
//! Postgres store lives in the API crate.

use ::async_trait::async_trait;
use callsight_core::{
    Agent, AgentId, AgentInsight, AnalyzedCall, CallId, CallOutcome, CallRecord, CallsightResult,
    City, CityId, CityInsight, EntityKey, EntityType, NewCity, ProcessingStatus, StorageError,
    Timestamp,
};

/// Scoped read-modify-write applied to an insight record inside `upsert`.
pub type InsightMutator<T> = Box<dyn FnOnce(&mut T) + Send>;

/// Lifetime call counts for an agent or city.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CallTotals {
    pub calls: i64,
    pub emergencies: i64,
}

/// Async store for agents, cities, calls, outcomes and insight records.
///
/// Insight upserts are atomic per entity: the mutator runs against the
/// freshest stored record and its result is written before any other upsert
/// for the same entity can read. A missing record is created from
/// `AgentInsight::empty` / `CityInsight::empty` instead of failing.
#[async_trait]
pub trait InsightStore: Send + Sync {
    // ========================================================================
    // AGENT OPERATIONS
    // ========================================================================

    async fn agent_insert(&self, agent: &Agent) -> CallsightResult<()>;

    async fn agent_get(&self, id: AgentId) -> CallsightResult<Option<Agent>>;

    async fn agent_by_employee_id(&self, employee_id: &str) -> CallsightResult<Option<Agent>>;

    /// Case-insensitive exact name match.
    async fn agent_by_name(&self, name: &str) -> CallsightResult<Option<Agent>>;

    /// Case-insensitive substring match on name or employee code.
    async fn agent_search(&self, query: &str, limit: usize) -> CallsightResult<Vec<Agent>>;

    async fn agent_list(&self) -> CallsightResult<Vec<Agent>>;

    /// Delete an agent. Its calls survive with `agent_id` cleared; its
    /// insight record is removed.
    async fn agent_delete(&self, id: AgentId) -> CallsightResult<()>;

    // ========================================================================
    // CITY OPERATIONS
    // ========================================================================

    async fn city_insert(&self, city: &NewCity) -> CallsightResult<City>;

    async fn city_get(&self, id: CityId) -> CallsightResult<Option<City>>;

    /// Case-insensitive exact name match.
    async fn city_by_name(&self, name: &str) -> CallsightResult<Option<City>>;

    /// All cities ordered by name.
    async fn city_list(&self) -> CallsightResult<Vec<City>>;

    // ========================================================================
    // INSIGHT OPERATIONS
    // ========================================================================

    async fn agent_insight_get(&self, id: AgentId) -> CallsightResult<Option<AgentInsight>>;

    /// Load an agent insight, failing with `NotFound` if none exists yet.
    async fn agent_insight_load(&self, id: AgentId) -> CallsightResult<AgentInsight> {
        self.agent_insight_get(id)
            .await?
            .ok_or_else(|| StorageError::not_found(EntityType::AgentInsight, id).into())
    }

    /// Apply `mutator` to the agent's insight record, creating it if absent.
    /// Returns the record as written.
    async fn agent_insight_upsert(
        &self,
        id: AgentId,
        mutator: InsightMutator<AgentInsight>,
    ) -> CallsightResult<AgentInsight>;

    async fn agent_insight_list(&self) -> CallsightResult<Vec<AgentInsight>>;

    async fn city_insight_get(&self, id: CityId) -> CallsightResult<Option<CityInsight>>;

    async fn city_insight_load(&self, id: CityId) -> CallsightResult<CityInsight> {
        self.city_insight_get(id)
            .await?
            .ok_or_else(|| StorageError::not_found(EntityType::CityInsight, id).into())
    }

    async fn city_insight_upsert(
        &self,
        id: CityId,
        mutator: InsightMutator<CityInsight>,
    ) -> CallsightResult<CityInsight>;

    async fn city_insight_list(&self) -> CallsightResult<Vec<CityInsight>>;

    // ========================================================================
    // CALL OPERATIONS
    // ========================================================================

    async fn call_insert(&self, call: &CallRecord) -> CallsightResult<()>;

    async fn call_get(&self, id: CallId) -> CallsightResult<Option<CallRecord>>;

    /// Move a call to `next`, rejecting transitions the status machine
    /// forbids. Returns the status now stored.
    async fn call_set_status(
        &self,
        id: CallId,
        next: ProcessingStatus,
    ) -> CallsightResult<ProcessingStatus>;

    /// Delete a call together with its outcome.
    async fn call_delete(&self, id: CallId) -> CallsightResult<()>;

    /// Attach (or replace) the outcome of a call. Scores outside their
    /// domains are rejected.
    async fn outcome_attach(&self, outcome: &CallOutcome) -> CallsightResult<()>;

    async fn outcome_get(&self, call_id: CallId) -> CallsightResult<Option<CallOutcome>>;

    /// Calls for an agent at or after `since`, newest first.
    async fn calls_for_agent_since(
        &self,
        id: AgentId,
        since: Timestamp,
    ) -> CallsightResult<Vec<AnalyzedCall>>;

    /// Calls for a city at or after `since`, newest first.
    async fn calls_for_city_since(
        &self,
        id: CityId,
        since: Timestamp,
    ) -> CallsightResult<Vec<AnalyzedCall>>;

    /// Whether the entity has any call timestamped at or after `since`.
    async fn has_activity_since(&self, key: EntityKey, since: Timestamp) -> CallsightResult<bool>;

    /// Lifetime call and emergency counts for an entity.
    async fn call_totals(&self, key: EntityKey) -> CallsightResult<CallTotals>;

    /// Total number of calls across all entities.
    async fn call_count(&self) -> CallsightResult<i64>;

    /// Escalated calls at or after `since`, newest first.
    async fn escalations_since(&self, since: Timestamp) -> CallsightResult<Vec<AnalyzedCall>>;

    /// The analyzed call with the lowest overall quality for an agent.
    async fn worst_call_for_agent_since(
        &self,
        id: AgentId,
        since: Timestamp,
    ) -> CallsightResult<Option<AnalyzedCall>>;

    /// Most frequent issue category across a city's calls.
    async fn city_top_issue(&self, id: CityId) -> CallsightResult<Option<String>>;
}
