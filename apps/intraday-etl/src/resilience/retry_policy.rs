//! Retry policy: maps a failure and its category to a retry decision.
//!
//! # Backoff by category
//!
//! | Category | Wait | Exhausted |
//! |----------|------|-----------|
//! | `rate_limited` | `base × 2^attempt`, ±jitter, capped | escalate |
//! | `connectivity_lost` | fixed | escalate |
//! | `transient` / `unknown` | `step × (attempt + 1)`, capped | escalate |
//! | `data_invalid` | - | abort immediately |
//!
//! A `Retry-After` hint raises a rate-limited wait to at least the hint,
//! still bounded by `max_delay`. The policy never sleeps; callers do.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::domain::failure::{DecisionCategory, ErrorKind, FailureContext, RetryDecision};

/// Retry policy configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries allowed per failure site before escalating (default: 5).
    pub max_retries: u32,
    /// First exponential delay for rate-limited calls (default: 10s).
    pub base_delay: Duration,
    /// Upper bound for any wait (default: 300s).
    pub max_delay: Duration,
    /// Jitter applied to exponential delays (default: 0.2 = ±20%).
    pub jitter_factor: f64,
    /// Linear step for transient and unknown failures (default: 60s).
    pub linear_step: Duration,
    /// Fixed delay between database reconnect attempts (default: 10s).
    pub fixed_db_retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(300),
            jitter_factor: 0.2,
            linear_step: Duration::from_secs(60),
            fixed_db_retry_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Decide what to do about a classified failure.
    #[must_use]
    pub fn decide(&self, context: &FailureContext, category: DecisionCategory) -> RetryDecision {
        if context.error_kind == ErrorKind::Cancelled {
            return RetryDecision::abort(category);
        }

        let exhausted = context.attempt_count >= self.max_retries;

        match category {
            DecisionCategory::DataInvalid => RetryDecision::abort(category),
            _ if exhausted => RetryDecision::escalate(category),
            DecisionCategory::RateLimited => {
                let mut wait = self.exponential_delay(context.attempt_count);
                if let Some(hint) = context.retry_after_hint {
                    wait = wait.max(hint).min(self.max_delay);
                }
                RetryDecision::retry(category, wait)
            }
            DecisionCategory::ConnectivityLost => RetryDecision::retry(category, self.db_retry_delay()),
            DecisionCategory::Transient | DecisionCategory::Unknown => {
                RetryDecision::retry(category, self.linear_delay(context.attempt_count))
            }
        }
    }

    /// Wait before reconnecting after `attempt` failed reconnects, or `None`
    /// once retries are spent. Same schedule as a `connectivity_lost` decision.
    #[must_use]
    pub fn reconnect_delay(&self, attempt: u32) -> Option<Duration> {
        (attempt < self.max_retries).then(|| self.db_retry_delay())
    }

    fn db_retry_delay(&self) -> Duration {
        self.fixed_db_retry_delay.min(self.max_delay)
    }

    /// Exponential delay with jitter for the given attempt.
    #[must_use]
    pub fn exponential_delay(&self, attempt: u32) -> Duration {
        let base_ms = self.base_exponential_ms(attempt);
        let jittered_ms = self.apply_jitter(base_ms);
        Duration::from_millis(jittered_ms.min(self.max_delay_ms()))
    }

    /// Linear delay for the given attempt, capped at `max_delay`.
    #[must_use]
    pub fn linear_delay(&self, attempt: u32) -> Duration {
        self.linear_step
            .saturating_mul(attempt.saturating_add(1))
            .min(self.max_delay)
    }

    /// Base exponential backoff without jitter, capped.
    fn base_exponential_ms(&self, attempt: u32) -> u64 {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let multiplier = 2f64.powi(exponent);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
        let backoff = (self.base_delay.as_millis() as f64 * multiplier).min(u64::MAX as f64) as u64;
        backoff.min(self.max_delay_ms())
    }

    /// Random value in `[backoff * (1 - jitter), backoff * (1 + jitter)]`.
    #[allow(clippy::cast_precision_loss)]
    fn apply_jitter(&self, backoff_ms: u64) -> u64 {
        if self.jitter_factor <= 0.0 || backoff_ms == 0 {
            return backoff_ms;
        }
        let mut rng = rand::rng();
        let jitter_range = backoff_ms as f64 * self.jitter_factor;
        let min = (backoff_ms as f64 - jitter_range).max(0.0);
        let max = backoff_ms as f64 + jitter_range;

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let jittered = rng.random_range(min..=max) as u64;
        jittered
    }

    fn max_delay_ms(&self) -> u64 {
        u64::try_from(self.max_delay.as_millis()).unwrap_or(u64::MAX)
    }
}

/// Parse a `Retry-After` header value.
///
/// Supports both delta-seconds (`"120"`) and HTTP-date
/// (`"Wed, 21 Oct 2015 07:28:00 GMT"`); dates in the past yield zero.
#[must_use]
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let date = DateTime::parse_from_rfc2822(value).ok()?;
    let delta = date.with_timezone(&Utc) - now;
    Some(delta.to_std().unwrap_or(Duration::ZERO))
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone};
    use proptest::prelude::*;

    use super::*;
    use crate::domain::failure::{RetryAction, Stage};
    use crate::domain::shared::{DateRange, Symbol};
    use crate::domain::work::UnitOfWork;

    fn context(stage: Stage, kind: ErrorKind, attempt: u32) -> FailureContext {
        let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let unit = UnitOfWork::new(Symbol::new("IBM"), DateRange::new(day, day).unwrap());
        let mut ctx = FailureContext::new(stage, kind, "boom", unit);
        ctx.attempt_count = attempt;
        ctx
    }

    fn no_jitter() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            jitter_factor: 0.0,
            linear_step: Duration::from_secs(2),
            fixed_db_retry_delay: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.base_delay, Duration::from_secs(10));
        assert_eq!(policy.max_delay, Duration::from_secs(300));
        assert!((policy.jitter_factor - 0.2).abs() < f64::EPSILON);
    }

    #[test]
    fn test_rate_limited_exponential_sequence() {
        let policy = no_jitter();
        let waits: Vec<_> = (0..3)
            .map(|attempt| {
                policy
                    .decide(
                        &context(Stage::Extract, ErrorKind::HttpStatus(429), attempt),
                        DecisionCategory::RateLimited,
                    )
                    .wait
            })
            .collect();
        assert_eq!(
            waits,
            vec![Duration::from_secs(1), Duration::from_secs(2), Duration::from_secs(4)]
        );
    }

    #[test]
    fn test_rate_limited_exhausted_escalates() {
        let decision = no_jitter().decide(
            &context(Stage::Extract, ErrorKind::HttpStatus(429), 3),
            DecisionCategory::RateLimited,
        );
        assert_eq!(decision.action, RetryAction::Escalate);
        assert_eq!(decision.wait, Duration::ZERO);
    }

    #[test]
    fn test_retry_after_hint_raises_wait() {
        let ctx = context(Stage::Extract, ErrorKind::HttpStatus(429), 0)
            .with_retry_after(Some(Duration::from_secs(12)));
        let decision = no_jitter().decide(&ctx, DecisionCategory::RateLimited);
        assert_eq!(decision.wait, Duration::from_secs(12));

        let huge = context(Stage::Extract, ErrorKind::HttpStatus(429), 0)
            .with_retry_after(Some(Duration::from_secs(3600)));
        let decision = no_jitter().decide(&huge, DecisionCategory::RateLimited);
        assert_eq!(decision.wait, Duration::from_secs(30));
    }

    #[test]
    fn test_connectivity_lost_fixed_then_escalate() {
        let policy = no_jitter();
        for attempt in 0..3 {
            let decision = policy.decide(
                &context(Stage::Load, ErrorKind::DbConnection, attempt),
                DecisionCategory::ConnectivityLost,
            );
            assert_eq!(decision.action, RetryAction::Retry);
            assert_eq!(decision.wait, Duration::from_secs(5));
        }
        let decision = policy.decide(
            &context(Stage::Load, ErrorKind::DbConnection, 3),
            DecisionCategory::ConnectivityLost,
        );
        assert_eq!(decision.action, RetryAction::Escalate);
    }

    #[test]
    fn test_reconnect_follows_connectivity_schedule() {
        let policy = no_jitter();
        for attempt in 0..3 {
            let decision = policy.decide(
                &context(Stage::Load, ErrorKind::DbConnection, attempt),
                DecisionCategory::ConnectivityLost,
            );
            assert_eq!(policy.reconnect_delay(attempt), Some(decision.wait));
        }
        assert_eq!(policy.reconnect_delay(3), None);
    }

    #[test]
    fn test_unknown_linear_backoff() {
        let policy = no_jitter();
        let ctx = context(Stage::Extract, ErrorKind::Other, 1);
        let decision = policy.decide(&ctx, DecisionCategory::Unknown);
        assert_eq!(decision.action, RetryAction::Retry);
        assert_eq!(decision.wait, Duration::from_secs(4));
    }

    #[test]
    fn test_linear_backoff_capped() {
        let policy = RetryPolicy {
            max_retries: 100,
            ..no_jitter()
        };
        assert_eq!(policy.linear_delay(50), Duration::from_secs(30));
    }

    #[test]
    fn test_cancelled_always_aborts() {
        let decision = no_jitter().decide(
            &context(Stage::Extract, ErrorKind::Cancelled, 0),
            DecisionCategory::Unknown,
        );
        assert_eq!(decision.action, RetryAction::Abort);
    }

    #[test]
    fn test_jitter_range() {
        let policy = RetryPolicy {
            base_delay: Duration::from_millis(100),
            ..RetryPolicy::default()
        };

        for _ in 0..100 {
            let duration = policy.exponential_delay(0);
            assert!(
                duration >= Duration::from_millis(80) && duration <= Duration::from_millis(120),
                "Duration {duration:?} not in expected range 80-120ms"
            );
        }
    }

    #[test]
    fn test_jitter_never_exceeds_cap() {
        let policy = RetryPolicy {
            base_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(10),
            ..RetryPolicy::default()
        };
        for _ in 0..100 {
            assert!(policy.exponential_delay(0) <= Duration::from_secs(10));
        }
    }

    #[test]
    fn test_retry_after_parsing() {
        let now = Utc.with_ymd_and_hms(2015, 10, 21, 7, 27, 0).unwrap();
        assert_eq!(parse_retry_after("120", now), Some(Duration::from_secs(120)));
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT", now),
            Some(Duration::from_secs(60))
        );
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:00:00 GMT", now),
            Some(Duration::ZERO)
        );
        assert!(parse_retry_after("soon", now).is_none());
    }

    fn category_strategy() -> impl Strategy<Value = DecisionCategory> {
        prop::sample::select(DecisionCategory::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn data_invalid_aborts_for_any_attempt(attempt in 0u32..1_000) {
            let decision = RetryPolicy::default().decide(
                &context(Stage::Transform, ErrorKind::MalformedData, attempt),
                DecisionCategory::DataInvalid,
            );
            prop_assert_eq!(decision.action, RetryAction::Abort);
        }

        #[test]
        fn wait_never_exceeds_max_delay(
            attempt in 0u32..64,
            category in category_strategy(),
            hint_secs in proptest::option::of(0u64..10_000),
        ) {
            let policy = RetryPolicy { max_retries: 64, ..RetryPolicy::default() };
            let ctx = context(Stage::Extract, ErrorKind::HttpStatus(429), attempt)
                .with_retry_after(hint_secs.map(Duration::from_secs));
            let decision = policy.decide(&ctx, category);
            prop_assert!(decision.wait <= policy.max_delay);
        }

        #[test]
        fn exhausted_attempts_never_retry(
            extra in 0u32..100,
            category in category_strategy(),
        ) {
            let policy = RetryPolicy::default();
            let ctx = context(Stage::Load, ErrorKind::Other, policy.max_retries + extra);
            prop_assert!(!policy.decide(&ctx, category).is_retry());
        }
    }
}
