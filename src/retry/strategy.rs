use crate::constants::{RECONNECT_MAX_DELAY, RECONNECT_MIN_DELAY};
use rand::random;
use std::time::Duration;

/// Logic used to determine how long to wait between retry attempts.
#[derive(Clone, Copy, Debug, PartialEq)]
#[non_exhaustive]
pub enum Strategy {
    /// The node will wait for the same amount of time between each retry.
    Every(Duration),
    /// Exponential backoff waiting strategy, where the duration between
    /// attempts (approximately) doubles each time.
    Backoff(ExponentialBackoff),
}

impl Strategy {
    pub(crate) fn retry_in(&self, last_wait: Option<Duration>) -> Duration {
        match self {
            Self::Every(t) => *t,
            Self::Backoff(exp) => exp.retry_in(last_wait),
        }
    }
}

/// Exponential backoff waiting strategy.
///
/// Each attempt waits for twice the last delay plus/minus a
/// random jitter, clamped to a min and max value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ExponentialBackoff {
    /// Minimum amount of time to wait between retries.
    ///
    /// *Defaults to 1s.*
    pub min: Duration,
    /// Maximum amount of time to wait between retries.
    ///
    /// This will be clamped to `>=` min.
    ///
    /// *Defaults to 60s.*
    pub max: Duration,
    /// Amount of uniform random jitter to apply to generated wait times.
    /// I.e., 0.1 will add +/-10% to generated intervals.
    ///
    /// This is restricted to within +/-100%.
    ///
    /// *Defaults to `0.0`.*
    pub jitter: f32,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            min: RECONNECT_MIN_DELAY,
            max: RECONNECT_MAX_DELAY,
            jitter: 0.0,
        }
    }
}

impl ExponentialBackoff {
    pub(crate) fn retry_in(&self, last_wait: Option<Duration>) -> Duration {
        let attempt = last_wait.map_or(self.min, |t| t.saturating_mul(2));

        let safe_max = if self.max < self.min {
            self.min
        } else {
            self.max
        };

        // Clamp before perturbing so that a long-running outage can't overflow.
        let mut target_time = attempt.min(safe_max);

        if self.jitter > 0.0 {
            let jitter = self.jitter.min(1.0);
            let perturb = (1.0 + jitter * (2.0 * random::<f32>() - 1.0)).clamp(0.0, 2.0);
            target_time = target_time.mul_f32(perturb);
        }

        target_time.clamp(self.min, safe_max)
    }
}
