//! Failure Handling Bounded Context
//!
//! Describes what went wrong at a pipeline stage and what the pipeline
//! decided to do about it.

mod context;
mod decision;

pub use context::{ErrorKind, FailureContext, Stage};
pub use decision::{DecisionCategory, DecisionLogEntry, RetryAction, RetryDecision};
