// Bounded polling schedule for asynchronous Read operations

use std::time::Duration;

use crate::core::config::OcrConfig;

/// How often and for how long a Read job is polled.
///
/// The first re-check happens after `interval`; each following wait is
/// multiplied by `backoff` and capped at `max_interval`. The whole wait is
/// bounded by `deadline`.
#[derive(Debug, Clone, PartialEq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_interval: Duration,
    pub backoff: f64,
    pub deadline: Duration,
}

impl PollPolicy {
    pub fn from_config(config: &OcrConfig) -> Self {
        Self {
            interval: config.poll_interval,
            max_interval: config.poll_max_interval,
            backoff: config.poll_backoff,
            deadline: config.timeout,
        }
    }

    /// Fixed interval, no back-off
    pub fn fixed(interval: Duration, deadline: Duration) -> Self {
        Self {
            interval,
            max_interval: interval,
            backoff: 1.0,
            deadline,
        }
    }

    /// Delay to use after waiting `current`
    pub fn next_interval(&self, current: Duration) -> Duration {
        let factor = if self.backoff.is_finite() && self.backoff >= 1.0 {
            self.backoff
        } else {
            1.0
        };
        let cap = self.max_interval.max(self.interval);
        Duration::try_from_secs_f64(current.min(cap).as_secs_f64() * factor)
            .map(|next| next.min(cap))
            .unwrap_or(cap)
    }

    /// Successive waits between status checks
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        std::iter::successors(Some(self.interval), move |d| Some(self.next_interval(*d)))
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(5),
            backoff: 1.0,
            deadline: Duration::from_secs(60),
        }
    }
}
