//! Configuration for node reconnection attempts.

mod strategy;

pub use self::strategy::*;

use std::time::Duration;

/// Configuration to be used for reconnecting to a node after its
/// connection drops.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Retry {
    /// Strategy used to determine how long to wait between retry attempts.
    ///
    /// *Defaults to an [`ExponentialBackoff`] from 1s
    /// to 60s, without jitter.*
    ///
    /// [`ExponentialBackoff`]: Strategy::Backoff
    pub strategy: Strategy,
    /// The maximum number of retries to attempt.
    ///
    /// `None` will attempt an infinite number of retries,
    /// while `Some(0)` will never attempt to reconnect.
    ///
    /// *Defaults to `None`.*
    pub retry_limit: Option<usize>,
}

impl Default for Retry {
    fn default() -> Self {
        Self {
            strategy: Strategy::Backoff(ExponentialBackoff::default()),
            retry_limit: None,
        }
    }
}

impl Retry {
    /// Returns how long to wait before retry number `attempt` (counting from 0),
    /// or `None` if the retry limit has been reached.
    pub(crate) fn retry_in(&self, attempt: usize, last_wait: Option<Duration>) -> Option<Duration> {
        if self.retry_limit.map_or(false, |limit| attempt >= limit) {
            None
        } else {
            Some(self.strategy.retry_in(last_wait))
        }
    }
}
