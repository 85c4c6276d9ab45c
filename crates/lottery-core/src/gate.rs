//! Single-use confirmation gate.
//!
//! A request is parked under a fresh [`PromptId`] when its prompt is shown and is handed back
//! exactly once, when a matching button token arrives from the actor who opened it.

use crate::error::LotteryError;
use crate::flow::WorkflowState;
use crate::request::{WorkflowKind, WorkflowRequest};
use crate::surface::{OptionStyle, PromptOption};
use crate::types::{ActorId, PromptId, TicketAmount};
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

const CONFIRM_PURCHASE_PREFIX: &str = "confirm_buy_ticket_";
const CANCEL_PURCHASE: &str = "cancel_buy_ticket";
const CONFIRM_DRAW: &str = "confirm_draw";
const CANCEL_DRAW: &str = "cancel_draw";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Confirm,
    Cancel,
}

/// Button action half of a token. Purchase confirmations carry the ticket count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenAction {
    ConfirmPurchase { ticket_amount: TicketAmount },
    CancelPurchase,
    ConfirmDraw,
    CancelDraw,
}

impl TokenAction {
    pub fn for_kind(kind: WorkflowKind, decision: Decision) -> Self {
        match (kind, decision) {
            (WorkflowKind::PurchaseTickets { ticket_amount }, Decision::Confirm) => {
                Self::ConfirmPurchase { ticket_amount }
            }
            (WorkflowKind::PurchaseTickets { .. }, Decision::Cancel) => Self::CancelPurchase,
            (WorkflowKind::DrawWinner, Decision::Confirm) => Self::ConfirmDraw,
            (WorkflowKind::DrawWinner, Decision::Cancel) => Self::CancelDraw,
        }
    }

    pub fn parse(value: &str) -> Result<Self, LotteryError> {
        match value {
            CANCEL_PURCHASE => Ok(Self::CancelPurchase),
            CONFIRM_DRAW => Ok(Self::ConfirmDraw),
            CANCEL_DRAW => Ok(Self::CancelDraw),
            other => {
                let count = other.strip_prefix(CONFIRM_PURCHASE_PREFIX).ok_or_else(|| {
                    LotteryError::InvalidToken(format!("unknown action '{other}'"))
                })?;
                let count: u64 = count.parse().map_err(|_| {
                    LotteryError::InvalidToken(format!("bad ticket count in '{other}'"))
                })?;
                let ticket_amount = TicketAmount::new(count).map_err(|_| {
                    LotteryError::InvalidToken(format!("bad ticket count in '{other}'"))
                })?;
                Ok(Self::ConfirmPurchase { ticket_amount })
            }
        }
    }

    pub fn decision(self) -> Decision {
        match self {
            Self::ConfirmPurchase { .. } | Self::ConfirmDraw => Decision::Confirm,
            Self::CancelPurchase | Self::CancelDraw => Decision::Cancel,
        }
    }

    /// True when this action could have been issued for a prompt of `kind`.
    pub fn matches(self, kind: WorkflowKind) -> bool {
        Self::for_kind(kind, self.decision()) == self
    }
}

impl fmt::Display for TokenAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfirmPurchase { ticket_amount } => {
                write!(f, "{CONFIRM_PURCHASE_PREFIX}{ticket_amount}")
            }
            Self::CancelPurchase => f.write_str(CANCEL_PURCHASE),
            Self::ConfirmDraw => f.write_str(CONFIRM_DRAW),
            Self::CancelDraw => f.write_str(CANCEL_DRAW),
        }
    }
}

/// `<action>:<prompt-id>`, the custom id carried by a prompt button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateToken {
    pub action: TokenAction,
    pub prompt_id: PromptId,
}

impl GateToken {
    pub fn new(action: TokenAction, prompt_id: PromptId) -> Self {
        Self { action, prompt_id }
    }

    pub fn parse(value: &str) -> Result<Self, LotteryError> {
        let (action, prompt_id) = split_token(value)?;
        Ok(Self {
            action: TokenAction::parse(action)?,
            prompt_id,
        })
    }
}

impl fmt::Display for GateToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.action, self.prompt_id)
    }
}

fn split_token(value: &str) -> Result<(&str, PromptId), LotteryError> {
    let (action, prompt_id) = value
        .rsplit_once(':')
        .ok_or_else(|| LotteryError::InvalidToken(format!("'{value}' has no prompt id")))?;
    Ok((action, PromptId::parse(prompt_id)?))
}

/// Confirm and cancel buttons for a freshly opened prompt.
pub fn prompt_options(kind: WorkflowKind, prompt_id: PromptId) -> Vec<PromptOption> {
    vec![
        PromptOption {
            token: GateToken::new(TokenAction::for_kind(kind, Decision::Confirm), prompt_id)
                .to_string(),
            label: "Confirm".to_string(),
            style: OptionStyle::Success,
            disabled: false,
        },
        PromptOption {
            token: GateToken::new(TokenAction::for_kind(kind, Decision::Cancel), prompt_id)
                .to_string(),
            label: "Cancel".to_string(),
            style: OptionStyle::Danger,
            disabled: false,
        },
    ]
}

/// A response accepted by the gate.
#[derive(Debug)]
pub struct ConsumedPrompt {
    pub prompt_id: PromptId,
    pub request: WorkflowRequest,
    pub decision: Decision,
}

struct ParkedPrompt {
    request: WorkflowRequest,
    opened_at: Instant,
}

/// Requests waiting on a confirm/cancel response, keyed by prompt id.
#[derive(Default)]
pub struct ConfirmationGate {
    parked: Mutex<HashMap<PromptId, ParkedPrompt>>,
}

impl ConfirmationGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Park `request` and return the id its buttons must quote.
    pub fn open(&self, request: WorkflowRequest) -> Result<PromptId, LotteryError> {
        if request.state() != WorkflowState::AwaitingConfirmation {
            return Err(LotteryError::state_violation(
                WorkflowState::AwaitingConfirmation.name(),
                request.state().name(),
            ));
        }

        let prompt_id = PromptId::generate();
        let mut parked = self.lock()?;
        parked.insert(
            prompt_id,
            ParkedPrompt {
                request,
                opened_at: Instant::now(),
            },
        );
        Ok(prompt_id)
    }

    /// Hand the parked request back if `token` is a valid response from `actor`.
    ///
    /// Checks run in order: prompt still open, responder owns it, action matches the request.
    /// Any failed check leaves the prompt parked.
    pub fn consume(
        &self,
        actor: &ActorId,
        token: &str,
    ) -> Result<ConsumedPrompt, LotteryError> {
        let (action, prompt_id) = split_token(token)?;

        let mut parked = self.lock()?;
        let entry = parked
            .get(&prompt_id)
            .ok_or_else(|| LotteryError::PromptNotFound(prompt_id.to_string()))?;

        if entry.request.actor() != actor {
            return Err(LotteryError::PromptOwnership(prompt_id.to_string()));
        }

        let action = TokenAction::parse(action)?;
        if !action.matches(entry.request.kind()) {
            return Err(LotteryError::InvalidToken(format!(
                "'{action}' does not match prompt {prompt_id}"
            )));
        }

        let ParkedPrompt { request, .. } = parked
            .remove(&prompt_id)
            .ok_or_else(|| LotteryError::PromptNotFound(prompt_id.to_string()))?;
        Ok(ConsumedPrompt {
            prompt_id,
            request,
            decision: action.decision(),
        })
    }

    /// Remove a prompt that never reached the actor.
    pub fn withdraw(&self, prompt_id: PromptId) -> Result<Option<WorkflowRequest>, LotteryError> {
        Ok(self.lock()?.remove(&prompt_id).map(|entry| entry.request))
    }

    /// Drop prompts older than `max_age`, returning the abandoned requests.
    pub fn discard_expired(&self, max_age: Duration) -> Result<Vec<WorkflowRequest>, LotteryError> {
        let now = Instant::now();
        let mut parked = self.lock()?;
        let expired: Vec<PromptId> = parked
            .iter()
            .filter(|(_, entry)| now.duration_since(entry.opened_at) >= max_age)
            .map(|(id, _)| *id)
            .collect();

        let mut dropped = Vec::with_capacity(expired.len());
        for prompt_id in expired {
            if let Some(entry) = parked.remove(&prompt_id) {
                debug!(
                    prompt_id = %prompt_id,
                    request_id = %entry.request.id(),
                    actor = %entry.request.actor(),
                    "discarding expired prompt"
                );
                dropped.push(entry.request);
            }
        }
        Ok(dropped)
    }

    pub fn pending(&self) -> usize {
        self.parked.lock().map(|parked| parked.len()).unwrap_or(0)
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<PromptId, ParkedPrompt>>, LotteryError> {
        self.parked
            .lock()
            .map_err(|_| LotteryError::InvariantViolation("gate lock poisoned".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn purchase(count: u64) -> WorkflowKind {
        WorkflowKind::PurchaseTickets {
            ticket_amount: TicketAmount::new(count).unwrap(),
        }
    }

    #[test]
    fn token_embeds_ticket_count() {
        let prompt_id = PromptId::generate();
        let action = TokenAction::for_kind(purchase(5), Decision::Confirm);
        let token = GateToken::new(action, prompt_id);
        let rendered = token.to_string();
        assert!(rendered.starts_with("confirm_buy_ticket_5:"));
        assert!(rendered.len() < 100);
        assert_eq!(GateToken::parse(&rendered).unwrap(), token);
    }

    #[test]
    fn cancel_tokens_use_plain_ids() {
        let prompt_id = PromptId::generate();
        let options = prompt_options(WorkflowKind::DrawWinner, prompt_id);
        assert_eq!(options[0].token, format!("confirm_draw:{prompt_id}"));
        assert_eq!(options[1].token, format!("cancel_draw:{prompt_id}"));
    }

    #[test]
    fn response_is_consumed_once() {
        let gate = ConfirmationGate::new();
        let actor = ActorId::new("alice");
        let prompt_id = gate
            .open(WorkflowRequest::new(actor.clone(), WorkflowKind::DrawWinner))
            .unwrap();
        let token = format!("confirm_draw:{prompt_id}");

        let consumed = gate.consume(&actor, &token).unwrap();
        assert_eq!(consumed.decision, Decision::Confirm);
        assert_eq!(consumed.prompt_id, prompt_id);
        assert_eq!(consumed.request.kind(), WorkflowKind::DrawWinner);

        let err = gate.consume(&actor, &token).unwrap_err();
        assert!(matches!(err, LotteryError::PromptNotFound(_)));
    }

    #[test]
    fn foreign_actor_cannot_answer() {
        let gate = ConfirmationGate::new();
        let owner = ActorId::new("alice");
        let prompt_id = gate
            .open(WorkflowRequest::new(owner.clone(), purchase(2)))
            .unwrap();
        let token = format!("cancel_buy_ticket:{prompt_id}");

        let err = gate.consume(&ActorId::new("mallory"), &token).unwrap_err();
        assert!(matches!(err, LotteryError::PromptOwnership(_)));
        assert_eq!(gate.pending(), 1);

        let consumed = gate.consume(&owner, &token).unwrap();
        assert_eq!(consumed.decision, Decision::Cancel);
    }

    #[test]
    fn tampered_count_keeps_prompt_parked() {
        let gate = ConfirmationGate::new();
        let actor = ActorId::new("alice");
        let prompt_id = gate.open(WorkflowRequest::new(actor.clone(), purchase(5))).unwrap();

        let err = gate
            .consume(&actor, &format!("confirm_buy_ticket_500:{prompt_id}"))
            .unwrap_err();
        assert!(matches!(err, LotteryError::InvalidToken(_)));

        let err = gate
            .consume(&actor, &format!("confirm_draw:{prompt_id}"))
            .unwrap_err();
        assert!(matches!(err, LotteryError::InvalidToken(_)));

        assert!(gate
            .consume(&actor, &format!("confirm_buy_ticket_5:{prompt_id}"))
            .is_ok());
    }

    #[test]
    fn malformed_tokens_are_invalid() {
        let gate = ConfirmationGate::new();
        let actor = ActorId::new("alice");
        for token in ["confirm_draw", "confirm_draw:not-a-uuid", ""] {
            let err = gate.consume(&actor, token).unwrap_err();
            assert!(matches!(err, LotteryError::InvalidToken(_)), "{token}");
        }
        assert!(TokenAction::parse("confirm_buy_ticket_0").is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn expired_prompts_are_discarded() {
        let gate = ConfirmationGate::new();
        let actor = ActorId::new("alice");
        gate.open(WorkflowRequest::new(actor.clone(), WorkflowKind::DrawWinner))
            .unwrap();

        assert!(gate.discard_expired(Duration::from_secs(900)).unwrap().is_empty());
        tokio::time::advance(Duration::from_secs(901)).await;

        let dropped = gate.discard_expired(Duration::from_secs(900)).unwrap();
        assert_eq!(dropped.len(), 1);
        assert_eq!(gate.pending(), 0);
    }
}
