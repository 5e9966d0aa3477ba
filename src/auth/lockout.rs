//! Account lockout policy.
//!
//! The counters live on the `users` row (`failed_login_attempts`,
//! `locked_until`); this type only decides what the next values should be.

use chrono::{Duration, NaiveDateTime};
use tracing::{debug, warn};

use crate::models::User;

#[derive(Debug, Clone, Copy)]
pub struct LockoutPolicy {
    pub max_attempts: u32,
    pub lockout_duration: Duration,
}

/// Counter state to persist after a wrong password.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FailedAttempt {
    pub attempts: i32,
    pub locked_until: Option<NaiveDateTime>,
}

impl FailedAttempt {
    pub fn locked(&self) -> bool {
        self.locked_until.is_some()
    }
}

impl LockoutPolicy {
    pub fn new(max_attempts: u32, lockout_duration_mins: u32) -> Self {
        Self {
            max_attempts,
            lockout_duration: Duration::minutes(i64::from(lockout_duration_mins)),
        }
    }

    /// `Some(until)` while the account may not log in.
    pub fn check(&self, user: &User, at: NaiveDateTime) -> Option<NaiveDateTime> {
        user.locked_at(at)
    }

    /// Reaching the threshold locks the account and restarts the count.
    pub fn register_failure(&self, user: &User, at: NaiveDateTime) -> FailedAttempt {
        // An expired lock does not carry its old count into the next window.
        let previous = if user.locked_until.is_some_and(|until| until <= at) {
            0
        } else {
            user.failed_login_attempts
        };
        let attempts = previous.saturating_add(1);

        debug!(
            user_id = %user.id,
            attempts = attempts,
            max_attempts = self.max_attempts,
            "Recorded failed login attempt"
        );

        if self.max_attempts > 0 && attempts as u32 >= self.max_attempts {
            let until = at + self.lockout_duration;
            warn!(
                user_id = %user.id,
                locked_until = %until,
                "Account locked due to too many failed attempts"
            );
            FailedAttempt {
                attempts: 0,
                locked_until: Some(until),
            }
        } else {
            FailedAttempt {
                attempts,
                locked_until: None,
            }
        }
    }
}
