use crate::error::LotteryError;
use serde::{Deserialize, Serialize};

/// Lifecycle of one confirm-then-commit workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    AwaitingConfirmation,
    Confirmed,
    Cancelled,
    Executing,
    Succeeded,
    Failed,
}

impl WorkflowState {
    pub fn name(self) -> &'static str {
        match self {
            Self::AwaitingConfirmation => "awaiting_confirmation",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
            Self::Executing => "executing",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled | Self::Succeeded | Self::Failed)
    }
}

/// Enforces the forward-only workflow transitions.
///
/// ```text
/// awaiting_confirmation -> confirmed -> executing -> succeeded
///                       \-> cancelled  \-> failed  \-> failed
/// ```
#[derive(Debug, Clone)]
pub struct WorkflowStateMachine {
    state: WorkflowState,
}

impl Default for WorkflowStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowStateMachine {
    pub fn new() -> Self {
        Self {
            state: WorkflowState::AwaitingConfirmation,
        }
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    pub fn confirm(&mut self) -> Result<(), LotteryError> {
        self.advance(WorkflowState::AwaitingConfirmation, WorkflowState::Confirmed)
    }

    pub fn cancel(&mut self) -> Result<(), LotteryError> {
        self.advance(WorkflowState::AwaitingConfirmation, WorkflowState::Cancelled)
    }

    pub fn begin_execution(&mut self) -> Result<(), LotteryError> {
        self.advance(WorkflowState::Confirmed, WorkflowState::Executing)
    }

    pub fn succeed(&mut self) -> Result<(), LotteryError> {
        self.advance(WorkflowState::Executing, WorkflowState::Succeeded)
    }

    /// Pre-flight failures leave from `Confirmed`, commit failures from `Executing`.
    pub fn fail(&mut self) -> Result<(), LotteryError> {
        match self.state {
            WorkflowState::Confirmed | WorkflowState::Executing => {
                self.state = WorkflowState::Failed;
                Ok(())
            }
            other => Err(LotteryError::state_violation(
                "confirmed|executing",
                other.name(),
            )),
        }
    }

    fn advance(
        &mut self,
        expected_current: WorkflowState,
        next: WorkflowState,
    ) -> Result<(), LotteryError> {
        if self.state != expected_current {
            return Err(LotteryError::state_violation(
                expected_current.name(),
                self.state.name(),
            ));
        }
        self.state = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_reaches_succeeded() {
        let mut machine = WorkflowStateMachine::new();
        machine.confirm().unwrap();
        machine.begin_execution().unwrap();
        machine.succeed().unwrap();
        assert_eq!(machine.state(), WorkflowState::Succeeded);
        assert!(machine.state().is_terminal());
    }

    #[test]
    fn preflight_failure_leaves_from_confirmed() {
        let mut machine = WorkflowStateMachine::new();
        machine.confirm().unwrap();
        machine.fail().unwrap();
        assert_eq!(machine.state(), WorkflowState::Failed);
    }

    #[test]
    fn cancelled_is_final() {
        let mut machine = WorkflowStateMachine::new();
        machine.cancel().unwrap();

        let err = machine.confirm().unwrap_err();
        assert!(err
            .to_string()
            .contains("expected 'awaiting_confirmation', got 'cancelled'"));
        assert!(machine.fail().is_err());
    }

    #[test]
    fn rejects_skipping_confirmation() {
        let mut machine = WorkflowStateMachine::new();
        let err = machine.begin_execution().unwrap_err();
        assert!(err
            .to_string()
            .contains("expected 'confirmed', got 'awaiting_confirmation'"));
    }

    #[test]
    fn terminal_states_cannot_be_revisited() {
        let mut machine = WorkflowStateMachine::new();
        machine.confirm().unwrap();
        machine.begin_execution().unwrap();
        machine.fail().unwrap();
        assert!(machine.succeed().is_err());
        assert!(machine.fail().is_err());
        assert_eq!(machine.state(), WorkflowState::Failed);
    }
}
