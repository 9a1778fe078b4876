//! In-memory store.
//!
//! Backs the test suites and the `memory` store backend. Each table sits
//! behind its own `RwLock`; insight upserts hold the table's write lock for
//! the whole read-modify-write so they are atomic per entity.

use crate::store::{CallTotals, InsightMutator, InsightStore};
use async_trait::async_trait;
use callsight_core::{
    Agent, AgentId, AgentInsight, AnalyzedCall, CallId, CallOutcome, CallRecord, CallsightError,
    CallsightResult, City, CityId, CityInsight, EntityKey, EntityType, NewCity, ProcessingStatus,
    StorageError, Timestamp,
};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

fn read<T>(lock: &RwLock<T>) -> CallsightResult<RwLockReadGuard<'_, T>> {
    lock.read()
        .map_err(|_| CallsightError::Storage(StorageError::LockPoisoned))
}

fn write<T>(lock: &RwLock<T>) -> CallsightResult<RwLockWriteGuard<'_, T>> {
    lock.write()
        .map_err(|_| CallsightError::Storage(StorageError::LockPoisoned))
}

/// In-memory store keeping every table in a `HashMap`.
#[derive(Debug, Default, Clone)]
pub struct InMemoryStore {
    agents: Arc<RwLock<HashMap<AgentId, Agent>>>,
    cities: Arc<RwLock<HashMap<CityId, City>>>,
    calls: Arc<RwLock<HashMap<CallId, CallRecord>>>,
    outcomes: Arc<RwLock<HashMap<CallId, CallOutcome>>>,
    agent_insights: Arc<RwLock<HashMap<AgentId, AgentInsight>>>,
    city_insights: Arc<RwLock<HashMap<CityId, CityInsight>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored calls.
    pub fn call_len(&self) -> usize {
        self.calls.read().map(|c| c.len()).unwrap_or(0)
    }

    /// Number of stored outcomes.
    pub fn outcome_len(&self) -> usize {
        self.outcomes.read().map(|o| o.len()).unwrap_or(0)
    }

    fn join_calls<F>(&self, keep: F) -> CallsightResult<Vec<AnalyzedCall>>
    where
        F: Fn(&CallRecord) -> bool,
    {
        let calls = read(&self.calls)?;
        let outcomes = read(&self.outcomes)?;
        let mut joined: Vec<AnalyzedCall> = calls
            .values()
            .filter(|c| keep(c))
            .map(|c| AnalyzedCall {
                call: c.clone(),
                outcome: outcomes.get(&c.call_id).cloned(),
            })
            .collect();
        joined.sort_by(|a, b| b.call.call_timestamp.cmp(&a.call.call_timestamp));
        Ok(joined)
    }
}

fn belongs_to(call: &CallRecord, key: EntityKey) -> bool {
    match key {
        EntityKey::Agent(id) => call.agent_id == Some(id),
        EntityKey::City(id) => call.city_id == Some(id),
    }
}

#[async_trait]
impl InsightStore for InMemoryStore {
    // === Agent Operations ===

    async fn agent_insert(&self, agent: &Agent) -> CallsightResult<()> {
        let mut agents = write(&self.agents)?;
        if agents.contains_key(&agent.agent_id) {
            return Err(StorageError::InsertFailed {
                entity_type: EntityType::Agent,
                reason: "already exists".to_string(),
            }
            .into());
        }
        if agents.values().any(|a| a.employee_id == agent.employee_id) {
            return Err(StorageError::InsertFailed {
                entity_type: EntityType::Agent,
                reason: format!("employee_id {} already in use", agent.employee_id),
            }
            .into());
        }
        agents.insert(agent.agent_id, agent.clone());
        Ok(())
    }

    async fn agent_get(&self, id: AgentId) -> CallsightResult<Option<Agent>> {
        Ok(read(&self.agents)?.get(&id).cloned())
    }

    async fn agent_by_employee_id(&self, employee_id: &str) -> CallsightResult<Option<Agent>> {
        Ok(read(&self.agents)?
            .values()
            .find(|a| a.employee_id == employee_id)
            .cloned())
    }

    async fn agent_by_name(&self, name: &str) -> CallsightResult<Option<Agent>> {
        let needle = name.to_lowercase();
        let agents = read(&self.agents)?;
        let mut matches: Vec<&Agent> = agents
            .values()
            .filter(|a| a.name.to_lowercase() == needle)
            .collect();
        matches.sort_by_key(|a| a.created_at);
        Ok(matches.first().map(|a| (*a).clone()))
    }

    async fn agent_search(&self, query: &str, limit: usize) -> CallsightResult<Vec<Agent>> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }
        let agents = read(&self.agents)?;
        let mut found: Vec<Agent> = agents
            .values()
            .filter(|a| {
                a.name.to_lowercase().contains(&needle)
                    || a.employee_id.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));
        found.truncate(limit);
        Ok(found)
    }

    async fn agent_list(&self) -> CallsightResult<Vec<Agent>> {
        let mut agents: Vec<Agent> = read(&self.agents)?.values().cloned().collect();
        agents.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(agents)
    }

    async fn agent_delete(&self, id: AgentId) -> CallsightResult<()> {
        if write(&self.agents)?.remove(&id).is_none() {
            return Err(StorageError::not_found(EntityType::Agent, id).into());
        }
        for call in write(&self.calls)?.values_mut() {
            if call.agent_id == Some(id) {
                call.agent_id = None;
            }
        }
        write(&self.agent_insights)?.remove(&id);
        Ok(())
    }

    // === City Operations ===

    async fn city_insert(&self, city: &NewCity) -> CallsightResult<City> {
        let mut cities = write(&self.cities)?;
        if cities
            .values()
            .any(|c| c.name.eq_ignore_ascii_case(&city.name))
        {
            return Err(StorageError::InsertFailed {
                entity_type: EntityType::City,
                reason: format!("city {} already exists", city.name),
            }
            .into());
        }
        let city_id = cities.keys().copied().max().unwrap_or(0) + 1;
        let stored = City {
            city_id,
            name: city.name.clone(),
            state: city.state.clone(),
        };
        cities.insert(city_id, stored.clone());
        Ok(stored)
    }

    async fn city_get(&self, id: CityId) -> CallsightResult<Option<City>> {
        Ok(read(&self.cities)?.get(&id).cloned())
    }

    async fn city_by_name(&self, name: &str) -> CallsightResult<Option<City>> {
        let needle = name.trim().to_lowercase();
        Ok(read(&self.cities)?
            .values()
            .find(|c| c.name.to_lowercase() == needle)
            .cloned())
    }

    async fn city_list(&self) -> CallsightResult<Vec<City>> {
        let mut cities: Vec<City> = read(&self.cities)?.values().cloned().collect();
        cities.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(cities)
    }

    // === Insight Operations ===

    async fn agent_insight_get(&self, id: AgentId) -> CallsightResult<Option<AgentInsight>> {
        Ok(read(&self.agent_insights)?.get(&id).cloned())
    }

    async fn agent_insight_upsert(
        &self,
        id: AgentId,
        mutator: InsightMutator<AgentInsight>,
    ) -> CallsightResult<AgentInsight> {
        if !read(&self.agents)?.contains_key(&id) {
            return Err(StorageError::not_found(EntityType::Agent, id).into());
        }
        let mut insights = write(&self.agent_insights)?;
        let record = insights
            .entry(id)
            .or_insert_with(|| AgentInsight::empty(id));
        mutator(record);
        record.agent_id = id;
        record.updated_at = chrono::Utc::now();
        Ok(record.clone())
    }

    async fn agent_insight_list(&self) -> CallsightResult<Vec<AgentInsight>> {
        Ok(read(&self.agent_insights)?.values().cloned().collect())
    }

    async fn city_insight_get(&self, id: CityId) -> CallsightResult<Option<CityInsight>> {
        Ok(read(&self.city_insights)?.get(&id).cloned())
    }

    async fn city_insight_upsert(
        &self,
        id: CityId,
        mutator: InsightMutator<CityInsight>,
    ) -> CallsightResult<CityInsight> {
        if !read(&self.cities)?.contains_key(&id) {
            return Err(StorageError::not_found(EntityType::City, id).into());
        }
        let mut insights = write(&self.city_insights)?;
        let record = insights.entry(id).or_insert_with(|| CityInsight::empty(id));
        mutator(record);
        record.city_id = id;
        record.updated_at = chrono::Utc::now();
        Ok(record.clone())
    }

    async fn city_insight_list(&self) -> CallsightResult<Vec<CityInsight>> {
        Ok(read(&self.city_insights)?.values().cloned().collect())
    }

    // === Call Operations ===

    async fn call_insert(&self, call: &CallRecord) -> CallsightResult<()> {
        let mut calls = write(&self.calls)?;
        if calls.contains_key(&call.call_id) {
            return Err(StorageError::InsertFailed {
                entity_type: EntityType::Call,
                reason: "already exists".to_string(),
            }
            .into());
        }
        calls.insert(call.call_id, call.clone());
        Ok(())
    }

    async fn call_get(&self, id: CallId) -> CallsightResult<Option<CallRecord>> {
        Ok(read(&self.calls)?.get(&id).cloned())
    }

    async fn call_set_status(
        &self,
        id: CallId,
        next: ProcessingStatus,
    ) -> CallsightResult<ProcessingStatus> {
        let mut calls = write(&self.calls)?;
        let call = calls
            .get_mut(&id)
            .ok_or_else(|| StorageError::not_found(EntityType::Call, id))?;
        call.processing_status = call.processing_status.transition_to(next)?;
        Ok(call.processing_status)
    }

    async fn call_delete(&self, id: CallId) -> CallsightResult<()> {
        if write(&self.calls)?.remove(&id).is_none() {
            return Err(StorageError::not_found(EntityType::Call, id).into());
        }
        write(&self.outcomes)?.remove(&id);
        Ok(())
    }

    async fn outcome_attach(&self, outcome: &CallOutcome) -> CallsightResult<()> {
        outcome.scores.check_domains()?;
        if !read(&self.calls)?.contains_key(&outcome.call_id) {
            return Err(StorageError::not_found(EntityType::Call, outcome.call_id).into());
        }
        write(&self.outcomes)?.insert(outcome.call_id, outcome.clone());
        Ok(())
    }

    async fn outcome_get(&self, call_id: CallId) -> CallsightResult<Option<CallOutcome>> {
        Ok(read(&self.outcomes)?.get(&call_id).cloned())
    }

    async fn calls_for_agent_since(
        &self,
        id: AgentId,
        since: Timestamp,
    ) -> CallsightResult<Vec<AnalyzedCall>> {
        self.join_calls(|c| c.agent_id == Some(id) && c.call_timestamp >= since)
    }

    async fn calls_for_city_since(
        &self,
        id: CityId,
        since: Timestamp,
    ) -> CallsightResult<Vec<AnalyzedCall>> {
        self.join_calls(|c| c.city_id == Some(id) && c.call_timestamp >= since)
    }

    async fn has_activity_since(&self, key: EntityKey, since: Timestamp) -> CallsightResult<bool> {
        Ok(read(&self.calls)?
            .values()
            .any(|c| belongs_to(c, key) && c.call_timestamp >= since))
    }

    async fn call_totals(&self, key: EntityKey) -> CallsightResult<CallTotals> {
        let calls = read(&self.calls)?;
        let mut totals = CallTotals::default();
        for call in calls.values().filter(|c| belongs_to(c, key)) {
            totals.calls += 1;
            if call.is_emergency() {
                totals.emergencies += 1;
            }
        }
        Ok(totals)
    }

    async fn call_count(&self) -> CallsightResult<i64> {
        Ok(read(&self.calls)?.len() as i64)
    }

    async fn escalations_since(&self, since: Timestamp) -> CallsightResult<Vec<AnalyzedCall>> {
        let joined = self.join_calls(|c| c.call_timestamp >= since)?;
        Ok(joined
            .into_iter()
            .filter(|c| {
                c.outcome
                    .as_ref()
                    .map(|o| o.escalation.is_flagged())
                    .unwrap_or(false)
            })
            .collect())
    }

    async fn worst_call_for_agent_since(
        &self,
        id: AgentId,
        since: Timestamp,
    ) -> CallsightResult<Option<AnalyzedCall>> {
        let joined = self.join_calls(|c| c.agent_id == Some(id) && c.call_timestamp >= since)?;
        Ok(joined
            .into_iter()
            .filter(|c| c.outcome.is_some())
            .min_by(|a, b| {
                let qa = a.outcome.as_ref().map(|o| o.scores.overall_quality);
                let qb = b.outcome.as_ref().map(|o| o.scores.overall_quality);
                qa.partial_cmp(&qb).unwrap_or(std::cmp::Ordering::Equal)
            }))
    }

    async fn city_top_issue(&self, id: CityId) -> CallsightResult<Option<String>> {
        let calls = read(&self.calls)?;
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for call in calls.values().filter(|c| c.city_id == Some(id)) {
            if let Some(category) = call.primary_issue_category.as_deref() {
                *counts.entry(category).or_insert(0) += 1;
            }
        }
        Ok(counts
            .into_iter()
            .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(category, _)| category.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use callsight_core::{CallContext, Escalation, Languages, OutcomeScores};
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    fn make_agent(name: &str, employee_id: &str) -> Agent {
        Agent::new(name, employee_id, Languages::parse("Hindi,English"))
    }

    fn make_call(agent_id: Option<AgentId>, city_id: Option<CityId>, at: Timestamp) -> CallRecord {
        CallRecord {
            call_id: Uuid::now_v7(),
            agent_id,
            city_id,
            customer_name: None,
            customer_phone: None,
            customer_preferred_language: None,
            audio_url: "https://audio.test/a.mp3".to_string(),
            duration_seconds: 42,
            call_timestamp: at,
            call_context: CallContext::NewIssue,
            primary_issue_category: Some("Battery Pick-Up".to_string()),
            agent_manual_note: None,
            processing_status: ProcessingStatus::Pending,
        }
    }

    fn make_outcome(call_id: CallId, quality: f64, escalation: Escalation) -> CallOutcome {
        CallOutcome::new(
            call_id,
            OutcomeScores {
                overall_quality: quality,
                ..OutcomeScores::default()
            },
            escalation,
        )
    }

    #[tokio::test]
    async fn test_agent_insert_and_lookup() -> CallsightResult<()> {
        let store = InMemoryStore::new();
        let agent = make_agent("Asha Rao", "EMP-001");
        store.agent_insert(&agent).await?;

        assert_eq!(store.agent_get(agent.agent_id).await?, Some(agent.clone()));
        assert_eq!(
            store.agent_by_employee_id("EMP-001").await?.map(|a| a.agent_id),
            Some(agent.agent_id)
        );
        assert_eq!(
            store.agent_by_name("asha rao").await?.map(|a| a.agent_id),
            Some(agent.agent_id)
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_agent_duplicate_employee_id_rejected() -> CallsightResult<()> {
        let store = InMemoryStore::new();
        store.agent_insert(&make_agent("A", "EMP-1")).await?;
        let result = store.agent_insert(&make_agent("B", "EMP-1")).await;
        assert!(matches!(
            result,
            Err(CallsightError::Storage(StorageError::InsertFailed { .. }))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_agent_search() -> CallsightResult<()> {
        let store = InMemoryStore::new();
        store.agent_insert(&make_agent("Ravi Kumar", "EMP-100")).await?;
        store.agent_insert(&make_agent("Meera Nair", "EMP-200")).await?;

        assert_eq!(store.agent_search("ravi", 20).await?.len(), 1);
        assert_eq!(store.agent_search("emp-", 20).await?.len(), 2);
        assert_eq!(store.agent_search("emp-", 1).await?.len(), 1);
        assert!(store.agent_search("   ", 20).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_agent_delete_nulls_calls() -> CallsightResult<()> {
        let store = InMemoryStore::new();
        let agent = make_agent("Asha", "EMP-1");
        store.agent_insert(&agent).await?;
        let call = make_call(Some(agent.agent_id), None, Utc::now());
        store.call_insert(&call).await?;

        store.agent_delete(agent.agent_id).await?;

        let kept = store.call_get(call.call_id).await?;
        assert!(kept.is_some());
        assert_eq!(kept.and_then(|c| c.agent_id), None);
        Ok(())
    }

    #[tokio::test]
    async fn test_call_delete_cascades_outcome() -> CallsightResult<()> {
        let store = InMemoryStore::new();
        let call = make_call(None, None, Utc::now());
        store.call_insert(&call).await?;
        store
            .outcome_attach(&make_outcome(call.call_id, 0.8, Escalation::Clear))
            .await?;
        assert_eq!(store.outcome_len(), 1);

        store.call_delete(call.call_id).await?;
        assert_eq!(store.outcome_len(), 0);
        assert!(store.outcome_get(call.call_id).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_outcome_out_of_domain_rejected() -> CallsightResult<()> {
        let store = InMemoryStore::new();
        let call = make_call(None, None, Utc::now());
        store.call_insert(&call).await?;
        let mut outcome = make_outcome(call.call_id, 0.8, Escalation::Clear);
        outcome.scores.sentiment_stabilization = 0.3;

        let result = store.outcome_attach(&outcome).await;
        assert!(matches!(result, Err(CallsightError::Integrity(_))));
        Ok(())
    }

    #[tokio::test]
    async fn test_call_status_transitions_enforced() -> CallsightResult<()> {
        let store = InMemoryStore::new();
        let call = make_call(None, None, Utc::now());
        store.call_insert(&call).await?;

        store
            .call_set_status(call.call_id, ProcessingStatus::Transcribed)
            .await?;
        store
            .call_set_status(call.call_id, ProcessingStatus::Analyzed)
            .await?;
        let back = store
            .call_set_status(call.call_id, ProcessingStatus::Pending)
            .await;
        assert!(matches!(back, Err(CallsightError::Validation(_))));
        Ok(())
    }

    #[tokio::test]
    async fn test_insight_upsert_creates_then_mutates() -> CallsightResult<()> {
        let store = InMemoryStore::new();
        let agent = make_agent("Asha", "EMP-1");
        store.agent_insert(&agent).await?;

        let load = store.agent_insight_load(agent.agent_id).await;
        assert!(matches!(&load, Err(e) if e.is_not_found()));

        let written = store
            .agent_insight_upsert(
                agent.agent_id,
                Box::new(|rec| rec.overall_insight = Some("first".to_string())),
            )
            .await?;
        assert_eq!(written.overall_insight.as_deref(), Some("first"));

        let written = store
            .agent_insight_upsert(
                agent.agent_id,
                Box::new(|rec| {
                    let prev = rec.overall_insight.clone().unwrap_or_default();
                    rec.overall_insight = Some(format!("{prev}+second"));
                }),
            )
            .await?;
        assert_eq!(written.overall_insight.as_deref(), Some("first+second"));
        Ok(())
    }

    #[tokio::test]
    async fn test_insight_upsert_unknown_entity() {
        let store = InMemoryStore::new();
        let result = store.city_insight_upsert(99, Box::new(|_| {})).await;
        assert!(matches!(&result, Err(e) if e.is_not_found()));
    }

    #[tokio::test]
    async fn test_windowed_queries() -> CallsightResult<()> {
        let store = InMemoryStore::new();
        let city = store.city_insert(&NewCity::new("Pune", Some("Maharashtra"))).await?;
        let agent = make_agent("Asha", "EMP-1");
        store.agent_insert(&agent).await?;
        let now = Utc::now();

        let old = make_call(Some(agent.agent_id), Some(city.city_id), now - Duration::days(40));
        let recent = make_call(Some(agent.agent_id), Some(city.city_id), now - Duration::minutes(2));
        let mid = make_call(Some(agent.agent_id), Some(city.city_id), now - Duration::days(3));
        for call in [&old, &recent, &mid] {
            store.call_insert(call).await?;
        }

        let window = store
            .calls_for_city_since(city.city_id, now - Duration::days(30))
            .await?;
        let ids: Vec<CallId> = window.iter().map(|c| c.call.call_id).collect();
        assert_eq!(ids, vec![recent.call_id, mid.call_id]);

        assert!(
            store
                .has_activity_since(EntityKey::Agent(agent.agent_id), now - Duration::minutes(10))
                .await?
        );
        assert!(
            !store
                .has_activity_since(EntityKey::City(city.city_id), now - Duration::minutes(1))
                .await?
        );

        let totals = store.call_totals(EntityKey::City(city.city_id)).await?;
        assert_eq!(totals.calls, 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_escalations_and_worst_call() -> CallsightResult<()> {
        let store = InMemoryStore::new();
        let agent = make_agent("Asha", "EMP-1");
        store.agent_insert(&agent).await?;
        let now = Utc::now();

        let good = make_call(Some(agent.agent_id), None, now - Duration::minutes(1));
        let bad = make_call(Some(agent.agent_id), None, now - Duration::minutes(3));
        store.call_insert(&good).await?;
        store.call_insert(&bad).await?;
        store
            .outcome_attach(&make_outcome(good.call_id, 0.9, Escalation::Clear))
            .await?;
        store
            .outcome_attach(&make_outcome(
                bad.call_id,
                0.2,
                Escalation::Flagged {
                    reason: "threat of legal action".to_string(),
                },
            ))
            .await?;

        let escalated = store.escalations_since(now - Duration::minutes(5)).await?;
        assert_eq!(escalated.len(), 1);
        assert_eq!(escalated[0].call.call_id, bad.call_id);

        let worst = store
            .worst_call_for_agent_since(agent.agent_id, now - Duration::days(7))
            .await?;
        assert_eq!(worst.map(|c| c.call.call_id), Some(bad.call_id));
        Ok(())
    }

    #[tokio::test]
    async fn test_city_top_issue_and_list_order() -> CallsightResult<()> {
        let store = InMemoryStore::new();
        let b = store.city_insert(&NewCity::new("Bengaluru", Some("Karnataka"))).await?;
        store.city_insert(&NewCity::new("Agra", Some("Uttar Pradesh"))).await?;

        let mut call = make_call(None, Some(b.city_id), Utc::now());
        store.call_insert(&call).await?;
        call.call_id = Uuid::now_v7();
        call.primary_issue_category = Some("Fire Emergency".to_string());
        store.call_insert(&call).await?;
        call.call_id = Uuid::now_v7();
        store.call_insert(&call).await?;

        assert_eq!(
            store.city_top_issue(b.city_id).await?.as_deref(),
            Some("Fire Emergency")
        );
        let names: Vec<String> = store.city_list().await?.into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["Agra".to_string(), "Bengaluru".to_string()]);
        assert_eq!(
            store.call_totals(EntityKey::City(b.city_id)).await?.emergencies,
            2
        );
        Ok(())
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Getting an entity that was never stored returns Ok(None).
        #[test]
        fn prop_missing_entities_return_none(id in any::<u128>(), city in any::<i32>()) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .build()
                .map_err(|e| TestCaseError::fail(e.to_string()))?;
            let store = InMemoryStore::new();
            let uuid = uuid::Uuid::from_u128(id);
            rt.block_on(async {
                prop_assert!(matches!(store.agent_get(uuid).await, Ok(None)));
                prop_assert!(matches!(store.call_get(uuid).await, Ok(None)));
                prop_assert!(matches!(store.city_get(city).await, Ok(None)));
                prop_assert!(matches!(store.city_insight_get(city).await, Ok(None)));
                Ok(())
            })?;
        }
    }
}
