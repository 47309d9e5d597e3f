//! Exponential reconnection backoff

use std::time::Duration;

use crate::common::config::ReconnectConfig;

/// Exponential backoff capped at a maximum delay
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    multiplier: f64,
    current: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration, multiplier: f64) -> Self {
        let initial = initial.min(max);
        Self {
            initial,
            max,
            multiplier: multiplier.max(1.0),
            current: initial,
        }
    }

    pub fn from_config(config: &ReconnectConfig) -> Self {
        Self::new(
            Duration::from_millis(config.initial_delay_ms),
            Duration::from_millis(config.max_delay_ms),
            config.multiplier,
        )
    }

    /// Delay to wait before the next attempt; grows the following one
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = Duration::try_from_secs_f64(self.current.as_secs_f64() * self.multiplier)
            .map_or(self.max, |next| next.min(self.max));
        delay
    }

    /// Back to the initial delay (after a successful connect)
    pub fn reset(&mut self) {
        self.current = self.initial;
    }

    pub fn initial(&self) -> Duration {
        self.initial
    }

    pub fn max(&self) -> Duration {
        self.max
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::from_config(&ReconnectConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delays_double_until_cap() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(30), 2.0);
        let delays: Vec<u64> = (0..8).map(|_| backoff.next_delay().as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 30, 30, 30]);
    }

    #[test]
    fn test_delays_non_decreasing_and_capped() {
        let max = Duration::from_millis(750);
        let mut backoff = Backoff::new(Duration::from_millis(7), max, 1.7);
        let mut previous = Duration::ZERO;
        for _ in 0..50 {
            let delay = backoff.next_delay();
            assert!(delay >= previous);
            assert!(delay <= max);
            previous = delay;
        }
        assert_eq!(previous, max);
    }

    #[test]
    fn test_reset_returns_to_initial() {
        let mut backoff = Backoff::default();
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        assert_eq!(backoff.next_delay(), backoff.initial());
    }

    #[test]
    fn test_huge_multiplier_saturates_at_max() {
        let max = Duration::from_secs(30);
        for multiplier in [1e20, f64::INFINITY, f64::MAX] {
            let mut backoff = Backoff::new(Duration::from_secs(1), max, multiplier);
            assert_eq!(backoff.next_delay(), Duration::from_secs(1));
            assert_eq!(backoff.next_delay(), max);
            assert_eq!(backoff.next_delay(), max);
        }
    }

    #[test]
    fn test_large_max_does_not_overflow() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::MAX, 1e10);
        for _ in 0..10 {
            assert!(backoff.next_delay() <= Duration::MAX);
        }
    }

    #[test]
    fn test_initial_clamped_to_max() {
        let mut backoff = Backoff::new(Duration::from_secs(60), Duration::from_secs(5), 2.0);
        assert_eq!(backoff.next_delay(), Duration::from_secs(5));
    }
}
