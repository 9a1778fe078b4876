//! Corpus builders.
//!
//! Each builder turns a window of calls into the bullet lines sent to one
//! narrative slot. Input order is preserved, so newest-first windows put
//! the newest calls inside the corpus cap.

use callsight_core::AnalyzedCall;
use chrono::FixedOffset;

const MISSING: &str = "N/A";

fn text_or_missing(value: Option<&str>) -> &str {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(MISSING)
}

/// Agent monthly corpus: one line per call with its coaching insight and
/// human remarks, dated in local time.
pub fn agent_lines(calls: &[AnalyzedCall], offset: FixedOffset) -> Vec<String> {
    calls
        .iter()
        .map(|c| {
            let outcome = c.outcome.as_ref();
            format!(
                "- Call on {}: Coaching Insight='{}', Human Remarks='{}'",
                c.call.call_timestamp.with_timezone(&offset).format("%Y-%m-%d"),
                text_or_missing(outcome.and_then(|o| o.coaching_insight.as_deref())),
                text_or_missing(outcome.and_then(|o| o.human_remarks.as_deref())),
            )
        })
        .collect()
}

/// City daily-ops corpus: the business insight of each call today.
pub fn city_daily_lines<'a, I>(calls: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a AnalyzedCall>,
{
    calls
        .into_iter()
        .map(|c| format!("- Call: {}", business_insight(c)))
        .collect()
}

/// City monthly corpus: the business insight of each call in the window.
pub fn city_monthly_lines(calls: &[AnalyzedCall]) -> Vec<String> {
    calls
        .iter()
        .map(|c| format!("- {}", business_insight(c)))
        .collect()
}

/// City coaching corpus. Calls without a usable coaching insight are
/// skipped, so the result may be empty even for a busy window.
pub fn city_coaching_lines(calls: &[AnalyzedCall]) -> Vec<String> {
    calls
        .iter()
        .filter_map(|c| c.outcome.as_ref()?.coaching_insight.as_deref())
        .map(str::trim)
        .filter(|text| !text.is_empty() && *text != MISSING)
        .map(|text| format!("- {}", text))
        .collect()
}

fn business_insight(call: &AnalyzedCall) -> &str {
    text_or_missing(
        call.outcome
            .as_ref()
            .and_then(|o| o.business_insight.as_deref()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use callsight_core::Escalation;
    use callsight_test_utils::fixtures;
    use chrono::{TimeZone, Utc};

    fn ist() -> FixedOffset {
        FixedOffset::east_opt(330 * 60).unwrap()
    }

    #[test]
    fn test_agent_line_format() {
        let at = Utc.with_ymd_and_hms(2025, 6, 10, 20, 0, 0).unwrap();
        let call = fixtures::call_at(None, None, at, "Fire");
        let mut outcome = fixtures::outcome(call.call_id, 0.7, Escalation::Clear);
        outcome.coaching_insight = Some("Slow down".to_string());
        outcome.human_remarks = None;

        let lines = agent_lines(
            &[AnalyzedCall {
                call,
                outcome: Some(outcome),
            }],
            ist(),
        );
        assert_eq!(
            lines,
            vec!["- Call on 2025-06-11: Coaching Insight='Slow down', Human Remarks='N/A'"]
        );
    }

    #[test]
    fn test_unanalyzed_call_uses_missing_marker() {
        let call = fixtures::call_at(None, Some(1), Utc::now(), "Fire");
        let calls = vec![AnalyzedCall {
            call,
            outcome: None,
        }];
        assert_eq!(city_monthly_lines(&calls), vec!["- N/A"]);
        assert_eq!(city_daily_lines(&calls), vec!["- Call: N/A"]);
        assert!(city_coaching_lines(&calls).is_empty());
    }

    #[test]
    fn test_coaching_lines_skip_missing_markers() {
        let now = Utc::now();
        let mut calls = Vec::new();
        for text in [Some("Use the script"), Some("N/A"), Some("  "), None] {
            let call = fixtures::call_at(None, Some(1), now, "Fire");
            let mut outcome = fixtures::outcome(call.call_id, 0.5, Escalation::Clear);
            outcome.coaching_insight = text.map(str::to_string);
            calls.push(AnalyzedCall {
                call,
                outcome: Some(outcome),
            });
        }
        assert_eq!(city_coaching_lines(&calls), vec!["- Use the script"]);
    }
}
