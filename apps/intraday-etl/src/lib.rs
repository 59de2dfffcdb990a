// Allow unwrap/expect in tests - tests should panic on unexpected errors
// Allow test-specific patterns and pedantic lints in test code
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::needless_collect,
        clippy::option_if_let_else,
        clippy::default_trait_access,
        clippy::items_after_statements,
        clippy::or_fun_call
    )
)]

//! Intraday ETL - Rust Core Library
//!
//! Resilient extract-transform-load pipeline for intraday market bars.
//!
//! # Architecture (Clean Architecture + Hexagonal)
//!
//! ## Layers (inside → outside)
//!
//! - **Domain**: Core types with no I/O
//!   - `market_data`: raw and canonical bars, rejection reasons
//!   - `work`: units of work, checkpoints and their lifecycle
//!   - `failure`: failure context, decision categories and retry decisions
//!
//! - **Application**: Orchestration
//!   - `ports`: Interfaces for external systems (`QuoteSourcePort`, `RecordStorePort`, ...)
//!   - `services`: classifier, decision engine, extractor, transformer, loader
//!   - `use_cases`: `RunPipeline`
//!
//! - **Infrastructure**: Adapters (implementations)
//!   - `quote_source`: chart API client
//!   - `persistence`: SQLite and in-memory stores
//!   - `notification`: log and webhook alerting
//!   - `inference`: text-generation classifier client
//!
//! Cross-cutting: `resilience` (retry policy, rate limiter), `observability`
//! (tracing, metrics) and `config`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Clean Architecture Layers
// =============================================================================

/// Domain layer - Core types with no external dependencies.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Cross-cutting
// =============================================================================

/// YAML configuration loading.
pub mod config;

/// Logging and metrics.
pub mod observability;

/// Retry policy and rate limiting.
pub mod resilience;

// =============================================================================
// Re-exports
// =============================================================================

pub use application::dto::RunSummary;
pub use application::use_cases::{PauseScope, PipelineConfig, PipelineError, RunPipelineUseCase};
pub use domain::failure::{DecisionCategory, FailureContext, RetryAction, RetryDecision, Stage};
pub use domain::shared::{DateRange, Symbol};
pub use domain::work::{Checkpoint, CheckpointStatus, UnitOfWork};
pub use resilience::{RateLimiter, RetryPolicy};
