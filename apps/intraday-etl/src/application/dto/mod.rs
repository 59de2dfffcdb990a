//! Data Transfer Objects (DTOs)
//!
//! DTOs are used for use case outputs and notification payloads.

mod run_summary;

pub use run_summary::{RunSummary, UnitFailureDto};
