//! Resilience patterns for external calls.
//!
//! The retry policy turns classified failures into wait-and-retry decisions;
//! the rate limiter keeps aggregate request volume under the quote source's
//! limits.

mod rate_limiter;
mod retry_policy;

pub use rate_limiter::{RateLimitConfig, RateLimiter};
pub use retry_policy::{RetryPolicy, parse_retry_after};
