use clap::Args;
use thiserror::Error;

/// Execution statuses meaning the visit happened only partly or not at all.
pub const NOT_PERFORMED_STATUSES: [&str; 6] = [
    "not performed",
    "missed visit",
    "partially performed",
    "ej utfört",
    "bomkörning",
    "delvis utfört",
];

/// Longest accepted search window on either side of a planned visit: one week.
pub const MAX_WINDOW_MINUTES: i64 = 7 * 24 * 60;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be between 0 and 100, got {value}")]
    ThresholdOutOfRange { name: &'static str, value: u32 },

    #[error("{name} must not be negative, got {value}")]
    NegativeWindow { name: &'static str, value: i64 },

    #[error("{name} must be at most {max} minutes, got {value}")]
    WindowTooLarge { name: &'static str, value: i64, max: i64 },

    #[error("unsigned marker must not be empty")]
    EmptyUnsignedMarker,
}

/// Matching knobs, settable by flag or environment variable.
#[derive(Args, Debug, Clone)]
pub struct MatchConfig {
    /// Minutes before the planned time to search for an execution record
    #[arg(long, env = "SIGNMATCH_WINDOW_BEFORE", default_value_t = 240, allow_negative_numbers = true)]
    pub window_before: i64,

    /// Minutes after the planned time to search for an execution record
    #[arg(long, env = "SIGNMATCH_WINDOW_AFTER", default_value_t = 240, allow_negative_numbers = true)]
    pub window_after: i64,

    /// Minimum fuzzy client-name score for a fallback match
    #[arg(long, env = "SIGNMATCH_BASE_FUZZY_SCORE", default_value_t = 60)]
    pub base_fuzzy_score: u32,

    /// Minimum fuzzy score for two staff keys to be treated as one person
    #[arg(long, env = "SIGNMATCH_MERGE_THRESHOLD", default_value_t = 95)]
    pub merge_threshold: u32,

    /// Value of the performed-time column that marks an unsigned visit
    #[arg(long, env = "SIGNMATCH_UNSIGNED_MARKER", default_value = "Ej signerad")]
    pub unsigned_marker: String,

    /// Leading rows of the execution export that precede the header row
    #[arg(long, env = "SIGNMATCH_EXECUTION_SKIP_ROWS", default_value_t = 2)]
    pub execution_skip_rows: usize,
}

impl Default for MatchConfig {
    fn default() -> Self {
        MatchConfig {
            window_before: 240,
            window_after: 240,
            base_fuzzy_score: 60,
            merge_threshold: 95,
            unsigned_marker: "Ej signerad".to_string(),
            execution_skip_rows: 2,
        }
    }
}

impl MatchConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("base fuzzy score", self.base_fuzzy_score),
            ("merge threshold", self.merge_threshold),
        ] {
            if value > 100 {
                return Err(ConfigError::ThresholdOutOfRange { name, value });
            }
        }
        for (name, value) in [
            ("window before", self.window_before),
            ("window after", self.window_after),
        ] {
            if value < 0 {
                return Err(ConfigError::NegativeWindow { name, value });
            }
            if value > MAX_WINDOW_MINUTES {
                return Err(ConfigError::WindowTooLarge {
                    name,
                    value,
                    max: MAX_WINDOW_MINUTES,
                });
            }
        }
        if self.unsigned_marker.trim().is_empty() {
            return Err(ConfigError::EmptyUnsignedMarker);
        }
        Ok(())
    }

    /// Base fuzzy score as a 0-100 score; only meaningful after `validate`.
    pub fn base_score(&self) -> u8 {
        self.base_fuzzy_score.min(100) as u8
    }

    /// Merge threshold as a 0-100 score; only meaningful after `validate`.
    pub fn merge_score(&self) -> u8 {
        self.merge_threshold.min(100) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(MatchConfig::default().validate(), Ok(()));
    }

    #[test]
    fn rejects_threshold_above_hundred() {
        let config = MatchConfig {
            merge_threshold: 140,
            ..MatchConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::ThresholdOutOfRange {
                name: "merge threshold",
                value: 140
            })
        );
    }

    #[test]
    fn rejects_negative_window() {
        let config = MatchConfig {
            window_after: -5,
            ..MatchConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NegativeWindow { value: -5, .. })
        ));
    }

    #[test]
    fn rejects_window_longer_than_a_week() {
        let config = MatchConfig {
            window_before: 200_000_000_000,
            ..MatchConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::WindowTooLarge {
                name: "window before",
                value: 200_000_000_000,
                max: MAX_WINDOW_MINUTES
            })
        );

        let at_limit = MatchConfig {
            window_after: MAX_WINDOW_MINUTES,
            ..MatchConfig::default()
        };
        assert_eq!(at_limit.validate(), Ok(()));
    }

    #[test]
    fn rejects_blank_unsigned_marker() {
        let config = MatchConfig {
            unsigned_marker: "  ".to_string(),
            ..MatchConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::EmptyUnsignedMarker));
    }
}
