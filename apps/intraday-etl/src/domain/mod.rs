//! Domain Layer
//!
//! Business types for the ETL pipeline with no infrastructure dependencies.
//!
//! # Bounded Contexts
//!
//! - [`market_data`]: Raw and canonical bars, rejection reasons
//! - [`work`]: Units of work and the checkpoint lifecycle
//! - [`failure`]: Failure contexts, categories and retry decisions
//! - [`shared`]: Value objects and domain errors used across contexts

pub mod failure;
pub mod market_data;
pub mod shared;
pub mod work;
