//! The two confirm-then-commit workflows.
//!
//! [`crate::LotteryEngine`] runs the shared stages; each workflow supplies its own prompt,
//! pre-flight checks, write plan and messages.

mod draw;
mod purchase;

pub use draw::DrawWorkflow;
pub use purchase::PurchaseWorkflow;

use crate::accounts::SigningCredential;
use crate::commit::WriteStep;
use crate::config::LotteryConfig;
use crate::error::LotteryError;
use crate::ledger::Receipt;
use crate::preflight::PreflightValidator;
use crate::request::WorkflowKind;
use crate::snapshot::LedgerReader;
use crate::surface::Presentation;
use crate::types::{ActorId, ChainAddress};
use async_trait::async_trait;

/// Everything a workflow stage may consult.
pub struct WorkflowContext<'a> {
    pub actor: &'a ActorId,
    pub config: &'a LotteryConfig,
    pub lottery: &'a ChainAddress,
    pub credential: &'a SigningCredential,
    pub reader: &'a LedgerReader,
    pub validator: &'a PreflightValidator,
}

/// Result of a successful commit.
#[derive(Debug, Clone)]
pub struct Completion {
    /// Replaces the actor's processing placeholder.
    pub presentation: Presentation,
    /// Public announcement, if the workflow makes one.
    pub broadcast: Option<Presentation>,
}

#[async_trait]
pub trait LotteryWorkflow: Send + Sync {
    fn kind(&self) -> WorkflowKind;

    /// Used in "Error initiating ..." messages.
    fn capture_activity(&self) -> &'static str;

    /// Used in "Error ..." messages once confirmed.
    fn commit_activity(&self) -> &'static str;

    /// Confirmation summary, without buttons. May reject early.
    async fn prompt(&self, ctx: &WorkflowContext<'_>) -> Result<Presentation, LotteryError>;

    fn processing(&self) -> Presentation;

    fn cancelled(&self) -> Presentation;

    async fn preflight(&self, ctx: &WorkflowContext<'_>) -> Result<(), LotteryError>;

    /// Ordered writes; fails only if the amounts cannot be represented.
    fn plan(&self, ctx: &WorkflowContext<'_>) -> Result<Vec<WriteStep>, LotteryError>;

    async fn complete(
        &self,
        ctx: &WorkflowContext<'_>,
        receipts: &[Receipt],
    ) -> Result<Completion, LotteryError>;
}

pub fn workflow_for(kind: WorkflowKind) -> Box<dyn LotteryWorkflow> {
    match kind {
        WorkflowKind::PurchaseTickets { ticket_amount } => {
            Box::new(PurchaseWorkflow::new(ticket_amount))
        }
        WorkflowKind::DrawWinner => Box::new(DrawWorkflow),
    }
}
