//! Random delay between outbound requests.

use std::time::Duration;

use rand::Rng;

use crate::error::Result;
use crate::models::RateLimitConfig;
use crate::utils::Shutdown;

/// Sleeps a uniformly random, bounded time before each network request.
///
/// Only there to stay under remote throttling; it has no effect on ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimiter {
    min: Duration,
    max: Duration,
}

impl RateLimiter {
    pub fn new(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(
            Duration::from_millis(config.min_delay_ms),
            Duration::from_millis(config.max_delay_ms),
        )
    }

    /// No delay at all.
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    /// Draw the next delay.
    pub fn sample(&self) -> Duration {
        if self.min == self.max {
            return self.min;
        }
        let millis = rand::thread_rng()
            .gen_range(self.min.as_millis() as u64..=self.max.as_millis() as u64);
        Duration::from_millis(millis)
    }

    /// Block until the drawn delay has elapsed or the run is cancelled.
    pub async fn wait(&self, shutdown: &Shutdown) -> Result<()> {
        let delay = self.sample();
        if delay.is_zero() {
            return Ok(());
        }
        log::debug!("Rate limit: sleeping {} ms", delay.as_millis());
        shutdown
            .guard(async {
                tokio::time::sleep(delay).await;
                Ok(())
            })
            .await
    }
}
