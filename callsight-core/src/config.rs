//! Insight pipeline configuration

use crate::error::ConfigError;
use chrono::{Duration, FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};

/// Tunables for the insight cache and aggregation pipeline.
///
/// Loaded once at startup and handed to the pipeline constructor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsightConfig {
    /// Age below which a stored insight is served without regeneration.
    pub cache_ttl_secs: i64,
    /// A call newer than this forces a refresh even inside the TTL.
    pub recent_activity_secs: i64,
    /// Trailing window fetched for aggregation.
    pub lookback_days: i64,
    /// Maximum records fed into one generation prompt.
    pub corpus_limit: usize,
    /// Maximum entries kept in insight history and recent trend.
    pub history_limit: usize,
    /// Local offset used for "today" and calendar-month boundaries.
    pub utc_offset_minutes: i32,
    pub escalation_window_secs: i64,
    pub worst_call_window_days: i64,
}

impl Default for InsightConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 3600,
            recent_activity_secs: 600,
            lookback_days: 30,
            corpus_limit: 50,
            history_limit: 12,
            utc_offset_minutes: 330,
            escalation_window_secs: 300,
            worst_call_window_days: 7,
        }
    }
}

impl InsightConfig {
    /// Load from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            cache_ttl_secs: env_or("CALLSIGHT_CACHE_TTL_SECS", defaults.cache_ttl_secs),
            recent_activity_secs: env_or(
                "CALLSIGHT_RECENT_ACTIVITY_SECS",
                defaults.recent_activity_secs,
            ),
            lookback_days: env_or("CALLSIGHT_LOOKBACK_DAYS", defaults.lookback_days),
            corpus_limit: env_or("CALLSIGHT_CORPUS_LIMIT", defaults.corpus_limit),
            history_limit: env_or("CALLSIGHT_HISTORY_LIMIT", defaults.history_limit),
            utc_offset_minutes: env_or("CALLSIGHT_UTC_OFFSET_MINUTES", defaults.utc_offset_minutes),
            escalation_window_secs: env_or(
                "CALLSIGHT_ESCALATION_WINDOW_SECS",
                defaults.escalation_window_secs,
            ),
            worst_call_window_days: env_or(
                "CALLSIGHT_WORST_CALL_WINDOW_DAYS",
                defaults.worst_call_window_days,
            ),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("cache_ttl_secs", self.cache_ttl_secs),
            ("recent_activity_secs", self.recent_activity_secs),
            ("lookback_days", self.lookback_days),
            ("escalation_window_secs", self.escalation_window_secs),
            ("worst_call_window_days", self.worst_call_window_days),
        ];
        for (field, value) in positive {
            if value <= 0 {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    value: value.to_string(),
                    reason: format!("{} must be greater than 0", field),
                });
            }
        }

        if self.corpus_limit == 0 {
            return Err(ConfigError::InvalidValue {
                field: "corpus_limit".to_string(),
                value: "0".to_string(),
                reason: "corpus_limit must be at least 1".to_string(),
            });
        }

        if self.history_limit == 0 {
            return Err(ConfigError::InvalidValue {
                field: "history_limit".to_string(),
                value: "0".to_string(),
                reason: "history_limit must be at least 1".to_string(),
            });
        }

        if self.utc_offset_minutes.abs() > MAX_OFFSET_MINUTES {
            return Err(ConfigError::InvalidValue {
                field: "utc_offset_minutes".to_string(),
                value: self.utc_offset_minutes.to_string(),
                reason: "offset must lie within +/-18h".to_string(),
            });
        }

        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::seconds(self.cache_ttl_secs)
    }

    pub fn recent_activity_window(&self) -> Duration {
        Duration::seconds(self.recent_activity_secs)
    }

    pub fn lookback(&self) -> Duration {
        Duration::days(self.lookback_days)
    }

    pub fn escalation_window(&self) -> Duration {
        Duration::seconds(self.escalation_window_secs)
    }

    pub fn worst_call_window(&self) -> Duration {
        Duration::days(self.worst_call_window_days)
    }

    /// Local offset. Out-of-range values fall back to UTC.
    pub fn local_offset(&self) -> FixedOffset {
        Some(self.utc_offset_minutes)
            .filter(|minutes| minutes.abs() <= MAX_OFFSET_MINUTES)
            .and_then(|minutes| FixedOffset::east_opt(minutes * 60))
            .unwrap_or_else(|| Utc.fix())
    }
}

const MAX_OFFSET_MINUTES: i32 = 18 * 60;

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
