//! Per-provider request throttling.
//!
//! Scraped sources tolerate very little traffic, so each registered provider
//! can carry a [`RateLimiter`] that the engine acquires before every call.
//! The limiter enforces a randomized minimum spacing between consecutive
//! acquisitions; the jitter keeps request timing from looking mechanical.

use std::ops::RangeInclusive;
use std::time::Duration;

use rand::Rng;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Enforces a jittered minimum interval between acquisitions.
///
/// Acquirers are serialized: holding the internal lock across the sleep means
/// concurrent callers line up behind one another, which is exactly the
/// pacing a scraped source needs.
pub struct RateLimiter {
    interval_ms: RangeInclusive<u64>,
    last: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Limiter with a fixed interval between calls.
    pub fn new(interval: Duration) -> Self {
        let ms = interval.as_millis() as u64;
        Self::with_jitter(ms..=ms)
    }

    /// Limiter whose interval is re-rolled uniformly from `interval_ms` on
    /// every acquisition.
    pub fn with_jitter(interval_ms: RangeInclusive<u64>) -> Self {
        Self {
            interval_ms,
            last: Mutex::new(None),
        }
    }

    /// Wait until enough time has passed since the previous acquisition.
    /// The first acquisition never waits.
    pub async fn acquire(&self) {
        let interval = Duration::from_millis(rand::rng().random_range(self.interval_ms.clone()));

        let mut last = self.last.lock().await;
        if let Some(previous) = *last {
            let due = previous + interval;
            let now = Instant::now();
            if due > now {
                tokio::time::sleep(due - now).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_first_acquire_is_immediate() {
        let limiter = RateLimiter::new(Duration::from_millis(500));
        let start = Instant::now();
        limiter.acquire().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_consecutive_acquires_are_spaced() {
        let limiter = RateLimiter::new(Duration::from_millis(500));
        limiter.acquire().await;

        let start = Instant::now();
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_jittered_spacing_stays_in_range() {
        let limiter = RateLimiter::with_jitter(500..=1500);
        limiter.acquire().await;

        let start = Instant::now();
        limiter.acquire().await;
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(500));
        assert!(elapsed <= Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_wait_after_long_gap() {
        let limiter = RateLimiter::new(Duration::from_millis(100));
        limiter.acquire().await;
        tokio::time::sleep(Duration::from_secs(5)).await;

        let start = Instant::now();
        limiter.acquire().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
