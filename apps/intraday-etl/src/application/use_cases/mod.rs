//! Application Use Cases
//!
//! Use cases orchestrate domain logic to fulfill application requirements.

mod run_pipeline;

pub use run_pipeline::{PauseScope, PipelineConfig, PipelineError, RunPipelineUseCase};
