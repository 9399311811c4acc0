//! Bounded exponential reconnect backoff.

use std::time::Duration;

/// Fixed reconnect delay sequence: `base`, doubling, capped at `max`.
#[derive(Debug, Clone, PartialEq)]
pub struct Backoff {
    steps: Vec<Duration>,
}

impl Backoff {
    /// Build the sequence from `base` doubling up to `max`.
    ///
    /// The last step is always `max`, so 1s/30s yields 1, 2, 4, 8, 16, 30.
    pub fn exponential(base: Duration, max: Duration) -> Self {
        let base = base.max(Duration::from_millis(1));
        let max = max.max(base);

        let mut steps = Vec::new();
        let mut delay = base;
        while delay < max {
            steps.push(delay);
            delay = delay.saturating_mul(2);
        }
        steps.push(max);

        Self { steps }
    }

    /// Delay before the reconnect following `attempt` earlier ones.
    ///
    /// Indexes `min(attempt, last)`, so it never decreases as attempts grow.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let last = self.steps.len() - 1;
        let index = usize::try_from(attempt).map_or(last, |a| a.min(last));
        self.steps[index]
    }

    #[cfg(test)]
    fn steps(&self) -> &[Duration] {
        &self.steps
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::exponential(Duration::from_secs(1), Duration::from_secs(30))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(values: &[u64]) -> Vec<Duration> {
        values.iter().map(|s| Duration::from_secs(*s)).collect()
    }

    #[test]
    fn default_sequence() {
        assert_eq!(Backoff::default().steps(), secs(&[1, 2, 4, 8, 16, 30]).as_slice());
    }

    #[test]
    fn delay_saturates_at_last_step() {
        let backoff = Backoff::default();

        assert_eq!(backoff.delay_for(0), Duration::from_secs(1));
        assert_eq!(backoff.delay_for(1), Duration::from_secs(2));
        assert_eq!(backoff.delay_for(2), Duration::from_secs(4));
        assert_eq!(backoff.delay_for(5), Duration::from_secs(30));
        assert_eq!(backoff.delay_for(100), Duration::from_secs(30));
        assert_eq!(backoff.delay_for(u32::MAX), Duration::from_secs(30));
    }

    #[test]
    fn never_decreases() {
        let backoff = Backoff::exponential(Duration::from_millis(250), Duration::from_secs(10));
        let delays: Vec<_> = (0..20).map(|n| backoff.delay_for(n)).collect();
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn max_below_base() {
        let backoff = Backoff::exponential(Duration::from_secs(5), Duration::from_secs(1));
        assert_eq!(backoff.steps(), secs(&[5]).as_slice());
    }

    #[test]
    fn power_of_two_cap_has_no_duplicate() {
        let backoff = Backoff::exponential(Duration::from_secs(1), Duration::from_secs(8));
        assert_eq!(backoff.steps(), secs(&[1, 2, 4, 8]).as_slice());
    }
}
