//! # Per-Source Rate Limiter
//!
//! Minimum-delay gate in front of each source's outbound calls. One limiter
//! exists per source per execution, so there is never more than one waiter
//! and no fairness machinery is needed. `acquire` always eventually grants.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::trace;

/// Minimum-interval gate for one source's outbound calls.
#[derive(Debug)]
pub struct SourceRateLimiter {
    min_delay: Duration,
    last_acquire: Mutex<Option<Instant>>,
}

impl SourceRateLimiter {
    pub fn new(min_delay_ms: u64) -> Self {
        Self {
            min_delay: Duration::from_millis(min_delay_ms),
            last_acquire: Mutex::new(None),
        }
    }

    /// Wait until at least the configured delay has elapsed since the
    /// previous acquire. The first acquire is immediate.
    pub async fn acquire(&self) {
        let mut last = self.last_acquire.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_delay {
                let wait = self.min_delay - elapsed;
                trace!(wait_ms = wait.as_millis() as u64, "rate limiter waiting");
                tokio::time::sleep(wait).await;
            }
        }
        *last = Some(Instant::now());
    }

    pub fn min_delay(&self) -> Duration {
        self.min_delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn first_acquire_is_immediate() {
        let limiter = SourceRateLimiter::new(5_000);
        let before = Instant::now();
        limiter.acquire().await;
        assert_eq!(before.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn consecutive_acquires_are_spaced_by_min_delay() {
        let limiter = SourceRateLimiter::new(200);
        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        limiter.acquire().await;
        // Two enforced gaps of 200ms each under paused time.
        assert!(start.elapsed() >= Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn elapsed_time_counts_toward_the_delay() {
        let limiter = SourceRateLimiter::new(300);
        limiter.acquire().await;
        tokio::time::sleep(Duration::from_millis(300)).await;
        let before = Instant::now();
        limiter.acquire().await;
        assert_eq!(before.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn different_sources_are_independent() {
        let ads = SourceRateLimiter::new(10_000);
        let pos = SourceRateLimiter::new(10_000);
        let start = Instant::now();
        ads.acquire().await;
        pos.acquire().await;
        // Neither limiter delays the other's first acquire.
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_delay_never_blocks() {
        let limiter = SourceRateLimiter::new(0);
        let start = Instant::now();
        for _ in 0..10 {
            limiter.acquire().await;
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
