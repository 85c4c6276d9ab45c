use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Lottery workflow errors.
#[derive(Debug, Error)]
pub enum LotteryError {
    #[error("You need to connect a wallet first using {link_command}.")]
    NotAuthorized { link_command: String },

    #[error("{0}")]
    Configuration(String),

    #[error("Insufficient {symbol}. You need {required} {symbol}.")]
    InsufficientFunds { required: String, symbol: String },

    #[error("Lottery is not active.")]
    LotteryInactive,

    #[error("Need at least {minimum} {} (current: {current}).", participant_noun(.minimum))]
    InsufficientParticipants { current: u64, minimum: u64 },

    /// The wait was abandoned; the transaction itself may still land.
    #[error("Transaction timed out")]
    TransactionTimeout {
        step: &'static str,
        tx_hash: String,
        waited: Duration,
    },

    #[error("{0}")]
    ExecutionFailed(String),

    #[error("Another lottery action is still processing for your account. Try again once it completes.")]
    ActorBusy,

    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Invalid interaction token: {0}")]
    InvalidToken(String),

    #[error("Prompt '{0}' is no longer awaiting a response")]
    PromptNotFound(String),

    #[error("Prompt '{0}' belongs to another user")]
    PromptOwnership(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Interaction surface error: {0}")]
    Surface(String),

    #[error("Account store error: {0}")]
    AccountStore(String),

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
}

impl LotteryError {
    pub fn state_violation(expected: &str, actual: &str) -> Self {
        Self::InvariantViolation(format!(
            "state order violation: expected '{}', got '{}'",
            expected, actual
        ))
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            Self::NotAuthorized { .. } => FailureKind::NotAuthorized,
            Self::Configuration(_) => FailureKind::ConfigurationError,
            Self::InsufficientFunds { .. } => FailureKind::InsufficientFunds,
            Self::LotteryInactive => FailureKind::LotteryInactive,
            Self::InsufficientParticipants { .. } => FailureKind::InsufficientParticipants,
            Self::TransactionTimeout { .. } => FailureKind::TransactionTimeout,
            Self::ExecutionFailed(_) => FailureKind::ExecutionFailed,
            Self::ActorBusy => FailureKind::ActorBusy,
            Self::InvalidCommand(_) => FailureKind::InvalidCommand,
            Self::InvalidToken(_) | Self::PromptNotFound(_) | Self::PromptOwnership(_) => {
                FailureKind::InvalidInteraction
            }
            Self::InvalidAddress(_) => FailureKind::ConfigurationError,
            Self::Surface(_) | Self::AccountStore(_) | Self::InvariantViolation(_) => {
                FailureKind::Internal
            }
        }
    }

    /// Precondition failures shown to the user as a plain rejection rather than an error.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::NotAuthorized { .. }
                | Self::InsufficientFunds { .. }
                | Self::LotteryInactive
                | Self::InsufficientParticipants { .. }
                | Self::ActorBusy
        )
    }
}

fn participant_noun(minimum: &u64) -> &'static str {
    if *minimum == 1 {
        "participant"
    } else {
        "participants"
    }
}

/// Serializable failure classification carried in replies and outcomes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    NotAuthorized,
    ConfigurationError,
    InsufficientFunds,
    LotteryInactive,
    InsufficientParticipants,
    TransactionTimeout,
    ExecutionFailed,
    ActorBusy,
    InvalidCommand,
    InvalidInteraction,
    Internal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn participant_message_states_minimum() {
        let err = LotteryError::InsufficientParticipants {
            current: 0,
            minimum: 1,
        };
        assert_eq!(err.to_string(), "Need at least 1 participant (current: 0).");
        assert!(err.is_rejection());
    }

    #[test]
    fn timeout_message_is_generic() {
        let err = LotteryError::TransactionTimeout {
            step: "approve",
            tx_hash: "0xabc".to_string(),
            waited: Duration::from_secs(60),
        };
        assert_eq!(err.to_string(), "Transaction timed out");
        assert_eq!(err.kind(), FailureKind::TransactionTimeout);
        assert!(!err.is_rejection());
    }
}
