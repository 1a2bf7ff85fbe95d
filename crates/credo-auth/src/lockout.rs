//! Account lockout policy — pure decision functions over the failure
//! counters, evaluated before the password check commits any side
//! effects. MFA failures never feed this counter.

use chrono::{DateTime, Duration, Utc};

/// Lockout thresholds, taken from [`crate::AuthConfig`].
#[derive(Debug, Clone, Copy)]
pub struct LockoutPolicy {
    pub max_attempts: u32,
    pub lock_duration_secs: u64,
}

/// Outcome of the pre-password lockout check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockoutDecision {
    /// The attempt may proceed to password verification. When
    /// `reset_counter` is set, a previous lock has elapsed and the
    /// failure counter must be zeroed before evaluating this attempt.
    Proceed { reset_counter: bool },
    /// Locked — reject regardless of password correctness.
    Locked { until: DateTime<Utc> },
}

/// Counter update to commit after a failed password check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureUpdate {
    Count { failed_attempts: u32 },
    Lock { until: DateTime<Utc> },
}

/// Evaluate lockout state ahead of password verification. The failure
/// counter itself only matters through `locked_until`; it is reset, not
/// consulted, here.
pub fn evaluate(locked_until: Option<DateTime<Utc>>, now: DateTime<Utc>) -> LockoutDecision {
    match locked_until {
        Some(until) if until > now => LockoutDecision::Locked { until },
        // An elapsed lock means a fresh start for the counter.
        Some(_) => LockoutDecision::Proceed {
            reset_counter: true,
        },
        None => LockoutDecision::Proceed {
            reset_counter: false,
        },
    }
}

/// Account for one failed password check: either bump the counter, or
/// lock once the threshold is reached.
pub fn register_failure(
    failed_attempts: u32,
    now: DateTime<Utc>,
    policy: LockoutPolicy,
) -> FailureUpdate {
    let next = failed_attempts.saturating_add(1);
    if next >= policy.max_attempts {
        FailureUpdate::Lock {
            until: now + Duration::seconds(policy.lock_duration_secs as i64),
        }
    } else {
        FailureUpdate::Count {
            failed_attempts: next,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POLICY: LockoutPolicy = LockoutPolicy {
        max_attempts: 5,
        lock_duration_secs: 900,
    };

    #[test]
    fn unlocked_proceeds() {
        let now = Utc::now();
        assert_eq!(
            evaluate(None, now),
            LockoutDecision::Proceed {
                reset_counter: false
            }
        );
    }

    #[test]
    fn active_lock_rejects() {
        let now = Utc::now();
        let until = now + Duration::minutes(5);
        assert_eq!(
            evaluate(Some(until), now),
            LockoutDecision::Locked { until }
        );
    }

    #[test]
    fn elapsed_lock_resets_counter() {
        let now = Utc::now();
        let past = now - Duration::seconds(1);
        assert_eq!(
            evaluate(Some(past), now),
            LockoutDecision::Proceed {
                reset_counter: true
            }
        );
    }

    #[test]
    fn threshold_triggers_lock() {
        let now = Utc::now();
        assert_eq!(
            register_failure(3, now, POLICY),
            FailureUpdate::Count { failed_attempts: 4 }
        );
        match register_failure(4, now, POLICY) {
            FailureUpdate::Lock { until } => {
                assert_eq!(until, now + Duration::seconds(900));
            }
            other => panic!("expected lock, got {other:?}"),
        }
    }
}
