//! Cache and refresh decisions.
//!
//! Two independent gates. [`decide`] chooses between serving the stored
//! insight and regenerating it; [`coaching_gate`] decides whether the
//! city coaching focus is regenerated during a refresh that is already
//! happening.

use callsight_core::Timestamp;
use chrono::{Datelike, Duration, FixedOffset};
use serde::{Deserialize, Serialize};

/// Why a refresh is going ahead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshReason {
    /// No insight has ever been generated for the entity.
    NeverGenerated,
    /// The stored insight is at least one TTL old.
    Expired,
    /// The stored insight is fresh, but a call arrived inside the
    /// recent-activity window.
    RecentActivity,
}

/// Outcome of the cache check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "action", content = "reason")]
pub enum RefreshDecision {
    ServeCached,
    Refresh(RefreshReason),
}

impl RefreshDecision {
    pub fn is_cached(&self) -> bool {
        matches!(self, RefreshDecision::ServeCached)
    }

    pub fn label(&self) -> &'static str {
        match self {
            RefreshDecision::ServeCached => "cached",
            RefreshDecision::Refresh(RefreshReason::NeverGenerated) => "never_generated",
            RefreshDecision::Refresh(RefreshReason::Expired) => "expired",
            RefreshDecision::Refresh(RefreshReason::RecentActivity) => "recent_activity",
        }
    }
}

/// Decide whether to serve the stored insight.
///
/// | age        | recent activity | action        |
/// |------------|-----------------|---------------|
/// | < ttl      | false           | serve cached  |
/// | < ttl      | true            | force refresh |
/// | >= ttl     | either          | refresh       |
/// | never      | either          | refresh       |
///
/// A clock in the future counts as fresh.
pub fn decide(
    last_generated: Option<Timestamp>,
    has_recent_activity: bool,
    now: Timestamp,
    ttl: Duration,
) -> RefreshDecision {
    let Some(last) = last_generated else {
        return RefreshDecision::Refresh(RefreshReason::NeverGenerated);
    };

    if now - last >= ttl {
        RefreshDecision::Refresh(RefreshReason::Expired)
    } else if has_recent_activity {
        RefreshDecision::Refresh(RefreshReason::RecentActivity)
    } else {
        RefreshDecision::ServeCached
    }
}

/// Whether the city coaching focus is rebuilt on this refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoachingDecision {
    Regenerate,
    CarryForward,
}

/// Regenerate the coaching focus only when none exists yet or when it was
/// last generated in a different local calendar month.
pub fn coaching_gate(
    existing: Option<&str>,
    last_generated: Option<Timestamp>,
    now: Timestamp,
    offset: FixedOffset,
) -> CoachingDecision {
    match (existing, last_generated) {
        (Some(_), Some(last)) if same_local_month(last, now, offset) => {
            CoachingDecision::CarryForward
        }
        _ => CoachingDecision::Regenerate,
    }
}

/// Whether two instants fall in the same calendar month at `offset`.
pub fn same_local_month(a: Timestamp, b: Timestamp, offset: FixedOffset) -> bool {
    let a = a.with_timezone(&offset);
    let b = b.with_timezone(&offset);
    a.year() == b.year() && a.month() == b.month()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Offset, TimeZone, Utc};

    fn ist() -> FixedOffset {
        FixedOffset::east_opt(330 * 60).unwrap()
    }

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> Timestamp {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_never_generated_refreshes() {
        let now = at(2025, 6, 10, 12, 0);
        for recent in [true, false] {
            assert_eq!(
                decide(None, recent, now, Duration::hours(1)),
                RefreshDecision::Refresh(RefreshReason::NeverGenerated)
            );
        }
    }

    #[test]
    fn test_fresh_without_activity_serves_cached() {
        let now = at(2025, 6, 10, 12, 0);
        let last = now - Duration::minutes(30);
        assert_eq!(
            decide(Some(last), false, now, Duration::hours(1)),
            RefreshDecision::ServeCached
        );
    }

    #[test]
    fn test_fresh_with_activity_forces_refresh() {
        let now = at(2025, 6, 10, 12, 0);
        let last = now - Duration::minutes(30);
        assert_eq!(
            decide(Some(last), true, now, Duration::hours(1)),
            RefreshDecision::Refresh(RefreshReason::RecentActivity)
        );
    }

    #[test]
    fn test_exactly_one_ttl_is_expired() {
        let now = at(2025, 6, 10, 12, 0);
        let last = now - Duration::hours(1);
        assert_eq!(
            decide(Some(last), false, now, Duration::hours(1)),
            RefreshDecision::Refresh(RefreshReason::Expired)
        );
    }

    #[test]
    fn test_future_clock_counts_as_fresh() {
        let now = at(2025, 6, 10, 12, 0);
        let last = now + Duration::minutes(5);
        assert!(decide(Some(last), false, now, Duration::hours(1)).is_cached());
    }

    #[test]
    fn test_coaching_same_month_carries_forward() {
        let now = at(2025, 6, 20, 12, 0);
        let last = at(2025, 6, 2, 12, 0);
        assert_eq!(
            coaching_gate(Some("Focus on empathy."), Some(last), now, ist()),
            CoachingDecision::CarryForward
        );
    }

    #[test]
    fn test_coaching_regenerates_when_missing_or_new_month() {
        let now = at(2025, 7, 1, 12, 0);
        let last = at(2025, 6, 30, 12, 0);
        assert_eq!(
            coaching_gate(Some("Focus"), Some(last), now, ist()),
            CoachingDecision::Regenerate
        );
        assert_eq!(
            coaching_gate(None, Some(now), now, ist()),
            CoachingDecision::Regenerate
        );
        assert_eq!(
            coaching_gate(Some("Focus"), None, now, ist()),
            CoachingDecision::Regenerate
        );
    }

    #[test]
    fn test_month_boundary_uses_local_offset() {
        // 20:00 UTC on June 30 is already July 1 at +05:30.
        let last = at(2025, 6, 30, 20, 0);
        let now = at(2025, 7, 1, 3, 0);
        assert!(same_local_month(last, now, ist()));
        assert!(!same_local_month(last, now, Utc.fix()));
    }

    #[test]
    fn test_decision_labels() {
        assert_eq!(RefreshDecision::ServeCached.label(), "cached");
        assert_eq!(
            RefreshDecision::Refresh(RefreshReason::RecentActivity).label(),
            "recent_activity"
        );
    }
}
