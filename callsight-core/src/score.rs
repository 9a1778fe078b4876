//! Score normalization onto the allowed score domains.
//!
//! The analysis service reports every score as a float in `[0, 1]`. Two of
//! them are stored on discrete scales, so raw values are snapped to the
//! nearest bucket through fixed thresholds before an outcome is persisted.

use serde::{Deserialize, Serialize};

/// Allowed sentiment-stabilization values.
pub const SENTIMENT_LEVELS: [f64; 3] = [0.0, 0.5, 1.0];

/// Allowed resolution-validity values.
pub const RESOLUTION_LEVELS: [f64; 3] = [0.0, 0.75, 1.0];

/// Clamp a score into `[0, 1]`. NaN maps to 0.
pub fn clamp_unit(raw: f64) -> f64 {
    if raw.is_nan() {
        0.0
    } else {
        raw.clamp(0.0, 1.0)
    }
}

/// Snap a raw sentiment-stabilization score onto `{0, 0.5, 1}`.
///
/// Thresholds are 0.25 and 0.75; a value sitting exactly on a threshold
/// belongs to the upper bucket.
pub fn normalize_sentiment(raw: f64) -> f64 {
    let value = clamp_unit(raw);
    if value < 0.25 {
        0.0
    } else if value < 0.75 {
        0.5
    } else {
        1.0
    }
}

/// Snap a raw resolution-validity score onto `{0, 0.75, 1}`.
pub fn normalize_resolution_validity(raw: f64) -> f64 {
    let value = clamp_unit(raw);
    if value < 0.375 {
        0.0
    } else if value < 0.875 {
        0.75
    } else {
        1.0
    }
}

/// The domain a stored score must belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScoreDomain {
    /// Continuous `[0, 1]`.
    Unit,
    Sentiment,
    ResolutionValidity,
}

impl ScoreDomain {
    pub fn normalize(&self, raw: f64) -> f64 {
        match self {
            ScoreDomain::Unit => clamp_unit(raw),
            ScoreDomain::Sentiment => normalize_sentiment(raw),
            ScoreDomain::ResolutionValidity => normalize_resolution_validity(raw),
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        match self {
            ScoreDomain::Unit => (0.0..=1.0).contains(&value),
            ScoreDomain::Sentiment => SENTIMENT_LEVELS.contains(&value),
            ScoreDomain::ResolutionValidity => RESOLUTION_LEVELS.contains(&value),
        }
    }
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_sentiment_low_bucket(x in 0.0f64..0.25) {
            prop_assert_eq!(normalize_sentiment(x), 0.0);
        }

        #[test]
        fn prop_sentiment_mid_bucket(x in 0.25f64..0.75) {
            prop_assert_eq!(normalize_sentiment(x), 0.5);
        }

        #[test]
        fn prop_sentiment_high_bucket(x in 0.75f64..=1.0) {
            prop_assert_eq!(normalize_sentiment(x), 1.0);
        }

        /// Normalizing any float, in range or not, lands inside the domain
        /// and is idempotent.
        #[test]
        fn prop_normalize_is_total_and_idempotent(x in proptest::num::f64::ANY) {
            for domain in [ScoreDomain::Unit, ScoreDomain::Sentiment, ScoreDomain::ResolutionValidity] {
                let once = domain.normalize(x);
                prop_assert!(domain.contains(once));
                prop_assert_eq!(domain.normalize(once), once);
            }
        }
    }
}
