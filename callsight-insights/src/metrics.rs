//! Rolling-window metric rollup.

use crate::decision::same_local_month;
use callsight_core::{AnalyzedCall, CallOutcome, MetricSnapshot, Timestamp, VolumeCounters};
use callsight_storage::CallTotals;
use chrono::{FixedOffset, Utc};
use std::collections::HashMap;

/// Maximum operational risk tags kept on a city.
pub const MAX_OPERATIONAL_RISKS: usize = 5;

/// Aggregate scores over the analyzed calls of a window.
///
/// Call and emergency counts cover every call in the window; score averages
/// and the escalation rate cover only calls with an outcome.
pub fn snapshot(calls: &[AnalyzedCall]) -> MetricSnapshot {
    let analyzed: Vec<_> = calls.iter().filter_map(|c| c.outcome.as_ref()).collect();
    let emergencies = calls.iter().filter(|c| c.call.is_emergency()).count() as i64;

    if analyzed.is_empty() {
        return MetricSnapshot {
            calls: calls.len() as i64,
            emergencies,
            ..MetricSnapshot::default()
        };
    }

    let n = analyzed.len() as f64;
    let mean = |f: fn(&CallOutcome) -> f64| analyzed.iter().map(|o| f(*o)).sum::<f64>() / n;
    let flagged = analyzed.iter().filter(|o| o.escalation.is_flagged()).count() as f64;

    MetricSnapshot {
        quality_score: round4(mean(|o| o.scores.overall_quality)),
        sop_compliance_score: round4(mean(|o| o.scores.sop_compliance)),
        sentiment_score: round4(mean(|o| o.scores.sentiment_stabilization)),
        escalation_rate: round4(flagged / n),
        calls: calls.len() as i64,
        emergencies,
    }
}

/// Today's volume from the window plus lifetime totals from the store.
pub fn volume(
    calls: &[AnalyzedCall],
    totals: CallTotals,
    now: Timestamp,
    offset: FixedOffset,
) -> VolumeCounters {
    let today_start = local_day_start(now, offset);
    let today: Vec<_> = calls
        .iter()
        .filter(|c| c.call.call_timestamp >= today_start)
        .collect();

    VolumeCounters {
        calls_today: today.len() as i64,
        emergencies_today: today.iter().filter(|c| c.call.is_emergency()).count() as i64,
        calls_total: totals.calls,
        emergencies_total: totals.emergencies,
    }
}

/// Issue categories with at least one escalated call, most escalations
/// first, ties by name.
pub fn operational_risks(calls: &[AnalyzedCall]) -> Vec<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for call in calls {
        let escalated = call
            .outcome
            .as_ref()
            .map(|o| o.escalation.is_flagged())
            .unwrap_or(false);
        if !escalated {
            continue;
        }
        if let Some(category) = call.call.primary_issue_category.as_deref() {
            let category = category.trim();
            if !category.is_empty() {
                *counts.entry(category).or_default() += 1;
            }
        }
    }

    let mut ranked: Vec<_> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked
        .into_iter()
        .take(MAX_OPERATIONAL_RISKS)
        .map(|(category, _)| category.to_string())
        .collect()
}

/// Previous-period snapshot after a refresh at `now`.
///
/// When the last rollup happened in an earlier local month, the current
/// snapshot becomes the previous one.
pub fn rolled_previous(
    current: &MetricSnapshot,
    previous: Option<MetricSnapshot>,
    computed_at: Option<Timestamp>,
    now: Timestamp,
    offset: FixedOffset,
) -> Option<MetricSnapshot> {
    match computed_at {
        Some(at) if !same_local_month(at, now, offset) => Some(*current),
        _ => previous,
    }
}

/// Start of the local calendar day containing `now`.
pub fn local_day_start(now: Timestamp, offset: FixedOffset) -> Timestamp {
    now.with_timezone(&offset)
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .and_then(|midnight| midnight.and_local_timezone(offset).single())
        .map(|start| start.with_timezone(&Utc))
        .unwrap_or(now)
}

/// Whether `at` falls on the same local calendar day as `now`.
pub fn is_local_today(at: Timestamp, now: Timestamp, offset: FixedOffset) -> bool {
    at.with_timezone(&offset).date_naive() == now.with_timezone(&offset).date_naive()
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}
