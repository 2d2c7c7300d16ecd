//! Reconnect delays for the store subscription.

use std::time::Duration;

use rand::Rng;

/// Delay schedule between subscription attempts.
///
/// Doubles from `base` on every consecutive failure up to `max`, then
/// spreads each delay by up to `jitter` of itself in either direction so a
/// fleet of managers does not reconnect in lockstep after a store restart.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub max: Duration,

    /// Fraction of the delay used as jitter, clamped to `0.0..=1.0`.
    pub jitter: f64,
}

impl Default for BackoffPolicy {
    /// 100ms doubling to 30s with 25% jitter.
    fn default() -> Self {
        Self {
            base: Duration::from_millis(100),
            max: Duration::from_secs(30),
            jitter: 0.25,
        }
    }
}

impl BackoffPolicy {
    /// Delay before reconnect attempt `attempt`, counted from zero after the
    /// last successful subscription.
    pub fn delay(&self, attempt: u32) -> Duration {
        let doubled = self.base.saturating_mul(1u32 << attempt.min(31));
        let delay = doubled.min(self.max);

        let spread = delay.as_secs_f64() * self.jitter.clamp(0.0, 1.0);
        if spread <= 0.0 {
            return delay;
        }
        let offset = rand::rng().random_range(-spread..=spread);
        Duration::from_secs_f64((delay.as_secs_f64() + offset).max(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_grows_and_caps() {
        let policy = BackoffPolicy {
            base: Duration::from_millis(100),
            max: Duration::from_secs(1),
            jitter: 0.0,
        };

        assert_eq!(policy.delay(0), Duration::from_millis(100));
        assert_eq!(policy.delay(1), Duration::from_millis(200));
        assert_eq!(policy.delay(3), Duration::from_millis(800));
        assert_eq!(policy.delay(4), Duration::from_secs(1));
        assert_eq!(policy.delay(u32::MAX), Duration::from_secs(1));
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let policy = BackoffPolicy::default();
        for _ in 0..100 {
            let delay = policy.delay(2);
            assert!(delay >= Duration::from_millis(300));
            assert!(delay <= Duration::from_millis(500));
        }
    }
}
