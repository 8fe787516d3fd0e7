use std::time::{Duration, Instant};

#[cfg(feature = "with-serde")]
use serde::{Deserialize, Serialize};

/// Upper bound on the number of exchangers probed for one recipient.
pub const MAX_PROBED_HOSTS: usize = 3;

/// Protocol-level identity of the validating system. Never the address under
/// test.
#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderIdentity {
    pub mail_from: String,
    pub helo: String,
}

impl Default for SenderIdentity {
    fn default() -> Self {
        Self {
            mail_from: "verify@localhost.localdomain".to_string(),
            helo: "localhost.localdomain".to_string(),
        }
    }
}

/// Transport settings shared by every dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogOptions {
    pub port: u16,
    pub starttls: bool,
}

impl Default for DialogOptions {
    fn default() -> Self {
        Self {
            port: 25,
            starttls: true,
        }
    }
}

/// Retry budget of the probe driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_hosts: usize,
    pub per_host_retries: u32,
    pub retry_delay: Duration,
    pub attempt_timeout: Duration,
    pub deadline: Option<Instant>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_hosts: MAX_PROBED_HOSTS,
            per_host_retries: 2,
            retry_delay: Duration::from_secs(3),
            attempt_timeout: Duration::from_secs(30),
            deadline: None,
        }
    }
}

impl RetryPolicy {
    /// Single attempt per host with a short pause, used for disposable probes.
    pub fn single_attempt(attempt_timeout: Duration) -> Self {
        Self {
            per_host_retries: 1,
            retry_delay: Duration::from_secs(2),
            attempt_timeout,
            ..Self::default()
        }
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub(crate) fn host_limit(&self) -> usize {
        self.max_hosts.clamp(1, MAX_PROBED_HOSTS)
    }

    pub(crate) fn attempts(&self) -> u32 {
        self.per_host_retries.max(1)
    }

    /// Timeout for the next attempt, capped by the time left before the
    /// deadline. `None` once the deadline has passed.
    pub(crate) fn next_timeout(&self, now: Instant) -> Option<Duration> {
        match self.deadline {
            None => Some(self.attempt_timeout),
            Some(deadline) => {
                let left = deadline.checked_duration_since(now)?;
                if left.is_zero() {
                    None
                } else {
                    Some(left.min(self.attempt_timeout))
                }
            }
        }
    }

    /// Whether waiting `wait` from `now` still leaves time before the
    /// deadline.
    pub(crate) fn leaves_time_after(&self, wait: Duration, now: Instant) -> bool {
        self.deadline.is_none_or(|deadline| now + wait < deadline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_limit_is_capped() {
        let policy = RetryPolicy {
            max_hosts: 10,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.host_limit(), 3);
        let zero = RetryPolicy {
            max_hosts: 0,
            per_host_retries: 0,
            ..RetryPolicy::default()
        };
        assert_eq!(zero.host_limit(), 1);
        assert_eq!(zero.attempts(), 1);
    }

    #[test]
    fn deadline_caps_timeout() {
        let now = Instant::now();
        let policy = RetryPolicy::default().with_deadline(now + Duration::from_secs(2));
        assert_eq!(policy.next_timeout(now), Some(Duration::from_secs(2)));
        assert_eq!(policy.next_timeout(now + Duration::from_secs(3)), None);
        assert_eq!(
            RetryPolicy::default().next_timeout(now),
            Some(Duration::from_secs(30))
        );
    }

    #[test]
    fn waits_must_end_before_the_deadline() {
        let now = Instant::now();
        let policy = RetryPolicy::default().with_deadline(now + Duration::from_secs(2));
        assert!(policy.leaves_time_after(Duration::from_secs(1), now));
        assert!(!policy.leaves_time_after(Duration::from_secs(2), now));
        assert!(RetryPolicy::default().leaves_time_after(Duration::from_secs(3600), now));
    }
}
