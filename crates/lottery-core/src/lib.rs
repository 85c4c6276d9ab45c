//! Confirm-then-commit workflows for an on-chain RLUSD lottery.
//!
//! Two chat commands, `buy-lottery-ticket` and `draw-lottery`, each run the same three stages:
//! - intent capture: validate and show a confirm/cancel prompt;
//! - confirmation gate: park the request until the actor answers, at most once;
//! - commit execution: re-check preconditions, then submit timeout-guarded ledger writes in order.
//!
//! The chat platform, blockchain client and account storage are collaborators behind the
//! [`InteractionSurface`], [`LedgerClient`] and [`AccountStore`] traits.

#![deny(unsafe_code)]

pub mod accounts;
pub mod commands;
pub mod commit;
pub mod config;
pub mod error;
pub mod flow;
pub mod gate;
pub mod ledger;
pub mod locks;
pub mod mocks;
pub mod preflight;
pub mod render;
pub mod request;
pub mod runtime;
pub mod snapshot;
pub mod surface;
pub mod types;
pub mod workflows;

pub use accounts::{AccountStore, InMemoryAccountStore, SigningCredential};
pub use commands::{catalog, Command, CommandDefinition, CommandOptionDefinition};
pub use commit::{CommitExecutor, TransactionHandle, WriteStep};
pub use config::{LotteryConfig, MAX_TOKEN_DECIMALS, RLUSD_TOKEN_ADDRESS};
pub use error::{FailureKind, LotteryError};
pub use flow::{WorkflowState, WorkflowStateMachine};
pub use gate::{ConfirmationGate, Decision, GateToken, TokenAction};
pub use ledger::{
    ContractField, FieldValue, LedgerClient, LedgerClientError, PendingTransaction, Receipt,
    WriteMethod,
};
pub use locks::{ActorLease, ActorLocks};
pub use preflight::PreflightValidator;
pub use request::{WorkflowKind, WorkflowRequest};
pub use runtime::{CommandReply, LotteryEngine, WorkflowOutcome};
pub use snapshot::{DrawSnapshot, LedgerReader};
pub use surface::{
    Embed, InteractionSurface, OptionStyle, Presentation, PromptOption, Tone, Visibility,
};
pub use types::{ActorId, ChainAddress, PromptId, RequestId, TicketAmount, TokenAmount};
pub use workflows::{DrawWorkflow, LotteryWorkflow, PurchaseWorkflow};
