//! Pacing between probes sent to the same destination.

use std::time::{Duration, Instant};

use rand::Rng;

/// Decides how long to wait before the next probe. Callers sleep; the
/// strategy only picks the duration, so blocking and async code share it.
pub trait DelayStrategy: Send + Sync {
    fn next_delay(&self) -> Duration;
}

/// Uniformly random delay in `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RandomDelay {
    min: Duration,
    max: Duration,
}

impl RandomDelay {
    pub fn new(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    pub fn from_millis(min: u64, max: u64) -> Self {
        Self::new(Duration::from_millis(min), Duration::from_millis(max))
    }
}

impl DelayStrategy for RandomDelay {
    fn next_delay(&self) -> Duration {
        if self.min == self.max {
            return self.min;
        }
        rand::thread_rng().gen_range(self.min..=self.max)
    }
}

/// Never waits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoDelay;

impl DelayStrategy for NoDelay {
    fn next_delay(&self) -> Duration {
        Duration::ZERO
    }
}

/// Sleeps for the strategy's next delay unless that would reach `deadline`,
/// in which case nothing is slept and `false` is returned.
pub(crate) fn pause_before(strategy: &dyn DelayStrategy, deadline: Option<Instant>) -> bool {
    let delay = strategy.next_delay();
    if deadline.is_some_and(|deadline| Instant::now() + delay >= deadline) {
        return false;
    }
    if !delay.is_zero() {
        std::thread::sleep(delay);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_delay_stays_in_window() {
        let strategy = RandomDelay::from_millis(200, 1_000);
        for _ in 0..100 {
            let d = strategy.next_delay();
            assert!(d >= Duration::from_millis(200) && d <= Duration::from_millis(1_000));
        }
    }

    #[test]
    fn inverted_bounds_are_swapped() {
        let strategy = RandomDelay::from_millis(50, 10);
        let d = strategy.next_delay();
        assert!(d >= Duration::from_millis(10) && d <= Duration::from_millis(50));
    }

    #[test]
    fn no_delay_is_zero() {
        assert_eq!(NoDelay.next_delay(), Duration::ZERO);
    }

    #[test]
    fn pause_refuses_to_reach_the_deadline() {
        let long = RandomDelay::from_millis(5_000, 5_000);
        let started = Instant::now();
        assert!(!pause_before(&long, Some(started + Duration::from_millis(100))));
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(pause_before(&NoDelay, None));
    }
}
