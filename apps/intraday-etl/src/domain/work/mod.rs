//! Work Tracking Bounded Context
//!
//! Units of work and the checkpoint lifecycle that makes runs resumable.

mod checkpoint;
mod pause;
mod state_machine;
mod unit;

pub use checkpoint::{Checkpoint, CheckpointStatus};
pub use pause::PauseRecord;
pub use state_machine::CheckpointStateMachine;
pub use unit::{UnitKey, UnitOfWork};
