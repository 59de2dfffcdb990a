//! Checkpoint State Machine
//!
//! Validates checkpoint status transitions within a run.

use super::CheckpointStatus;
use crate::domain::shared::DomainError;

/// Checkpoint state machine.
///
/// `pending -> in_progress -> {succeeded, failed}`. Units never dispatched
/// stay `pending` and are picked up by the next run.
pub struct CheckpointStateMachine;

impl CheckpointStateMachine {
    /// Check if a state transition is valid.
    #[must_use]
    pub const fn is_valid_transition(from: CheckpointStatus, to: CheckpointStatus) -> bool {
        matches!(
            (from, to),
            (CheckpointStatus::Pending, CheckpointStatus::InProgress)
                | (CheckpointStatus::InProgress, CheckpointStatus::Succeeded)
                | (CheckpointStatus::InProgress, CheckpointStatus::Failed)
        )
    }

    /// Validate a state transition.
    ///
    /// # Errors
    ///
    /// Returns error if the transition is invalid.
    pub fn validate_transition(
        from: CheckpointStatus,
        to: CheckpointStatus,
    ) -> Result<(), DomainError> {
        if Self::is_valid_transition(from, to) {
            return Ok(());
        }

        let reason = if from.is_terminal() {
            format!("checkpoint is already {from}")
        } else {
            format!("{from} cannot move to {to}")
        };

        Err(DomainError::InvalidStateTransition {
            entity: "Checkpoint".to_string(),
            from: from.to_string(),
            to: to.to_string(),
            reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [CheckpointStatus; 4] = [
        CheckpointStatus::Pending,
        CheckpointStatus::InProgress,
        CheckpointStatus::Succeeded,
        CheckpointStatus::Failed,
    ];

    #[test]
    fn only_forward_transitions_are_valid() {
        let valid = [
            (CheckpointStatus::Pending, CheckpointStatus::InProgress),
            (CheckpointStatus::InProgress, CheckpointStatus::Succeeded),
            (CheckpointStatus::InProgress, CheckpointStatus::Failed),
        ];
        for from in ALL {
            for to in ALL {
                assert_eq!(
                    CheckpointStateMachine::is_valid_transition(from, to),
                    valid.contains(&(from, to)),
                    "{from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn undispatched_unit_cannot_fail() {
        let err = CheckpointStateMachine::validate_transition(
            CheckpointStatus::Pending,
            CheckpointStatus::Failed,
        )
        .unwrap_err();
        assert!(err.to_string().contains("pending cannot move to failed"));
    }

    #[test]
    fn regression_is_rejected_with_reason() {
        let err = CheckpointStateMachine::validate_transition(
            CheckpointStatus::Failed,
            CheckpointStatus::InProgress,
        )
        .unwrap_err();
        assert!(err.to_string().contains("already failed"));
    }
}
