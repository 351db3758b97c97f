use std::fmt;

use crate::{config::ReconcilerConfig, kubernetes::JobRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupReason {
    SucceededThreshold,
    FailedThreshold,
}

impl CleanupReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CleanupReason::SucceededThreshold => "succeeded-threshold",
            CleanupReason::FailedThreshold => "failed-threshold",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupDecision {
    Keep,
    Cleanup(CleanupReason),
}

impl CleanupDecision {
    pub fn should_cleanup(&self) -> bool {
        matches!(self, CleanupDecision::Cleanup(_))
    }

    pub fn reason(&self) -> &'static str {
        match self {
            CleanupDecision::Keep => "none",
            CleanupDecision::Cleanup(reason) => reason.as_str(),
        }
    }
}

impl fmt::Display for CleanupDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CleanupDecision::Keep => write!(f, "keep"),
            CleanupDecision::Cleanup(reason) => write!(f, "cleanup ({})", reason.as_str()),
        }
    }
}

/// Counts of finished pods at which a Job becomes eligible for deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    pub succeeded: i32,
    pub failed: i32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            succeeded: 1,
            failed: 1,
        }
    }
}

impl From<&ReconcilerConfig> for Thresholds {
    fn from(config: &ReconcilerConfig) -> Self {
        Self {
            succeeded: config.succeeded_threshold,
            failed: config.failed_threshold,
        }
    }
}

impl Thresholds {
    /// Classifies a Job from its counters alone. Success wins when both thresholds are met.
    pub fn evaluate(&self, job: &JobRecord) -> CleanupDecision {
        if job.succeeded >= self.succeeded {
            CleanupDecision::Cleanup(CleanupReason::SucceededThreshold)
        } else if job.failed >= self.failed {
            CleanupDecision::Cleanup(CleanupReason::FailedThreshold)
        } else {
            CleanupDecision::Keep
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(succeeded: i32, failed: i32, active: i32) -> JobRecord {
        JobRecord {
            name: "demo".to_string(),
            namespace: "default".to_string(),
            succeeded,
            failed,
            active,
            ..Default::default()
        }
    }

    #[test]
    fn test_default_thresholds() {
        let thresholds = Thresholds::default();

        assert_eq!(
            thresholds.evaluate(&job(1, 0, 0)),
            CleanupDecision::Cleanup(CleanupReason::SucceededThreshold)
        );
        assert_eq!(
            thresholds.evaluate(&job(0, 1, 0)),
            CleanupDecision::Cleanup(CleanupReason::FailedThreshold)
        );
        assert_eq!(thresholds.evaluate(&job(0, 0, 1)), CleanupDecision::Keep);
        assert_eq!(thresholds.evaluate(&job(0, 0, 0)), CleanupDecision::Keep);
    }

    #[test]
    fn test_success_checked_before_failure() {
        let decision = Thresholds::default().evaluate(&job(1, 1, 0));
        assert_eq!(decision.reason(), "succeeded-threshold");
        assert!(decision.should_cleanup());
    }

    #[test]
    fn test_custom_thresholds() {
        let thresholds = Thresholds {
            succeeded: 3,
            failed: 2,
        };

        assert_eq!(thresholds.evaluate(&job(2, 1, 1)), CleanupDecision::Keep);
        assert_eq!(thresholds.evaluate(&job(2, 2, 0)).reason(), "failed-threshold");
        assert_eq!(thresholds.evaluate(&job(3, 0, 0)).reason(), "succeeded-threshold");
        assert_eq!(thresholds.evaluate(&job(5, 7, 0)).reason(), "succeeded-threshold");
    }

    #[test]
    fn test_thresholds_across_range() {
        let thresholds = Thresholds {
            succeeded: 2,
            failed: 3,
        };
        for succeeded in 0..5 {
            for failed in 0..5 {
                let record = job(succeeded, failed, 0);
                let first = thresholds.evaluate(&record);
                // Pure: a second look at the same snapshot agrees.
                assert_eq!(first, thresholds.evaluate(&record));

                let expected = if succeeded >= 2 {
                    "succeeded-threshold"
                } else if failed >= 3 {
                    "failed-threshold"
                } else {
                    "none"
                };
                assert_eq!(first.reason(), expected, "{}/{}", succeeded, failed);
                assert_eq!(first.should_cleanup(), expected != "none");
            }
        }
    }

    #[test]
    fn test_thresholds_from_config() {
        let config = ReconcilerConfig {
            succeeded_threshold: 4,
            failed_threshold: 2,
            ..Default::default()
        };
        assert_eq!(
            Thresholds::from(&config),
            Thresholds {
                succeeded: 4,
                failed: 2
            }
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(CleanupDecision::Keep.to_string(), "keep");
        assert_eq!(
            CleanupDecision::Cleanup(CleanupReason::FailedThreshold).to_string(),
            "cleanup (failed-threshold)"
        );
    }
}
