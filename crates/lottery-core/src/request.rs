use crate::error::LotteryError;
use crate::flow::{WorkflowState, WorkflowStateMachine};
use crate::types::{ActorId, RequestId, TicketAmount};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What the actor asked for, together with its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkflowKind {
    PurchaseTickets { ticket_amount: TicketAmount },
    DrawWinner,
}

impl WorkflowKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::PurchaseTickets { .. } => "purchase_tickets",
            Self::DrawWinner => "draw_winner",
        }
    }
}

/// One in-flight user action, alive from prompt to terminal state.
#[derive(Debug, Clone)]
pub struct WorkflowRequest {
    id: RequestId,
    actor: ActorId,
    kind: WorkflowKind,
    machine: WorkflowStateMachine,
    created_at: DateTime<Utc>,
}

impl WorkflowRequest {
    pub fn new(actor: ActorId, kind: WorkflowKind) -> Self {
        Self {
            id: RequestId::generate(),
            actor,
            kind,
            machine: WorkflowStateMachine::new(),
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn actor(&self) -> &ActorId {
        &self.actor
    }

    pub fn kind(&self) -> WorkflowKind {
        self.kind
    }

    pub fn state(&self) -> WorkflowState {
        self.machine.state()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn confirm(&mut self) -> Result<(), LotteryError> {
        self.machine.confirm()
    }

    pub fn cancel(&mut self) -> Result<(), LotteryError> {
        self.machine.cancel()
    }

    pub fn begin_execution(&mut self) -> Result<(), LotteryError> {
        self.machine.begin_execution()
    }

    pub fn succeed(&mut self) -> Result<(), LotteryError> {
        self.machine.succeed()
    }

    pub fn fail(&mut self) -> Result<(), LotteryError> {
        self.machine.fail()
    }
}
