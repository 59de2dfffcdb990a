//! Token-bucket rate limiter shared by all extraction workers.
//!
//! The bucket holds up to `max_requests` tokens and refills continuously at
//! `max_requests / window`. Each quote-source call takes one token; callers
//! with an empty bucket sleep until the next token is due without holding
//! the lock, so other workers are never blocked by a waiting one.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Configuration for the rate limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Requests allowed per window. Zero disables limiting.
    pub max_requests: u32,
    /// Length of the window.
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 60,
            window: Duration::from_secs(60),
        }
    }
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Shared token bucket.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    /// Create a limiter with a full bucket.
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            bucket: Mutex::new(Bucket {
                tokens: f64::from(config.max_requests),
                last_refill: Instant::now(),
            }),
        }
    }

    /// A limiter that never waits.
    #[must_use]
    pub fn unlimited() -> Self {
        Self::new(RateLimitConfig {
            max_requests: 0,
            window: Duration::from_secs(1),
        })
    }

    /// Whether limiting is active.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.config.max_requests > 0 && !self.config.window.is_zero()
    }

    /// Wait until a token is available and take it.
    pub async fn acquire(&self) {
        loop {
            match self.try_take().await {
                Ok(()) => return,
                Err(wait) => {
                    tracing::debug!(wait_ms = wait.as_millis(), "rate limiter throttling request");
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    /// Take a token, or report how long until the next one is due.
    async fn try_take(&self) -> Result<(), Duration> {
        if !self.is_enabled() {
            return Ok(());
        }

        let mut bucket = self.bucket.lock().await;
        let now = Instant::now();
        let capacity = f64::from(self.config.max_requests);
        let per_token = self.config.window.as_secs_f64() / capacity;

        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = elapsed.mul_add(1.0 / per_token, bucket.tokens).min(capacity);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            return Ok(());
        }

        let missing = 1.0 - bucket.tokens;
        drop(bucket);
        Err(Duration::from_secs_f64(missing * per_token).max(Duration::from_millis(1)))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn limiter(max_requests: u32, window_secs: u64) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            max_requests,
            window: Duration::from_secs(window_secs),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn burst_up_to_capacity_is_immediate() {
        let limiter = limiter(3, 3);
        let start = Instant::now();
        for _ in 0..3 {
            limiter.acquire().await;
        }
        assert_eq!(start.elapsed(), Duration::ZERO);

        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(999));
    }

    #[tokio::test(start_paused = true)]
    async fn empty_bucket_waits_for_refill() {
        let limiter = limiter(2, 2);
        limiter.acquire().await;
        limiter.acquire().await;

        let start = Instant::now();
        limiter.acquire().await;
        let waited = start.elapsed();
        assert!(waited >= Duration::from_millis(999), "waited {waited:?}");
        assert!(waited <= Duration::from_millis(1_100), "waited {waited:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn shared_across_tasks() {
        let limiter = Arc::new(limiter(2, 10));
        let start = Instant::now();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                tokio::spawn(async move { limiter.acquire().await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        // Two immediate tokens, then one every five seconds.
        assert!(start.elapsed() >= Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn unlimited_never_blocks() {
        let limiter = RateLimiter::unlimited();
        assert!(!limiter.is_enabled());
        let start = Instant::now();
        for _ in 0..1_000 {
            limiter.acquire().await;
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
