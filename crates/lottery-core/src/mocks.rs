//! In-process collaborators for tests and local runs.

use crate::accounts::SigningCredential;
use crate::config::RLUSD_TOKEN_ADDRESS;
use crate::error::LotteryError;
use crate::ledger::{
    ContractField, FieldValue, LedgerClient, LedgerClientError, PendingTransaction, Receipt,
    WriteMethod,
};
use crate::surface::{InteractionSurface, Presentation};
use crate::types::{ActorId, ChainAddress, RequestId, TokenAmount};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Shared, ordered record of what the mocks observed.
///
/// Hand the same journal to a [`MockLedger`] and a [`RecordingSurface`] to assert on
/// interleaving, e.g. that a placeholder was shown before the first write.
#[derive(Clone, Default)]
pub struct Journal {
    entries: Arc<Mutex<Vec<String>>>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, entry: impl Into<String>) {
        lock(&self.entries).push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        lock(&self.entries).clone()
    }

    pub fn position(&self, prefix: &str) -> Option<usize> {
        lock(&self.entries)
            .iter()
            .position(|entry| entry.starts_with(prefix))
    }
}

/// How the mock ledger answers a confirmation wait for a given write method.
#[derive(Debug, Clone)]
pub enum ConfirmBehavior {
    Confirm,
    /// Never resolves.
    Hang,
    /// Mined with a failed status.
    Revert,
    Delay(Duration),
    Fail(String),
}

/// A write the mock accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedWrite {
    pub contract: ChainAddress,
    pub method: WriteMethod,
    pub signer: ChainAddress,
    pub tx_hash: String,
}

struct LedgerState {
    balances: HashMap<ChainAddress, TokenAmount>,
    active: bool,
    participants: u64,
    ticket_counts: HashMap<ChainAddress, u64>,
    total_tickets: u64,
    prize_token: ChainAddress,
    winner: ChainAddress,
    confirm_behaviors: HashMap<&'static str, ConfirmBehavior>,
    rejections: HashMap<&'static str, String>,
    read_failures: HashMap<&'static str, String>,
    pending: HashMap<String, &'static str>,
    writes: Vec<SubmittedWrite>,
    reads: Vec<&'static str>,
    nonce: u64,
}

const DEFAULT_WINNER: &str = "0x3c44cdddb6a900fa2b585dd299e03d12fa4293bc";

/// Scriptable ledger: an active lottery with one participant and no balances.
pub struct MockLedger {
    state: Mutex<LedgerState>,
    journal: Option<Journal>,
}

impl Default for MockLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLedger {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LedgerState {
                balances: HashMap::new(),
                active: true,
                participants: 1,
                ticket_counts: HashMap::new(),
                total_tickets: 0,
                prize_token: ChainAddress::from_canonical(RLUSD_TOKEN_ADDRESS),
                winner: ChainAddress::from_canonical(DEFAULT_WINNER),
                confirm_behaviors: HashMap::new(),
                rejections: HashMap::new(),
                read_failures: HashMap::new(),
                pending: HashMap::new(),
                writes: Vec::new(),
                reads: Vec::new(),
                nonce: 0,
            }),
            journal: None,
        }
    }

    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Fixed address tests use for the lottery contract.
    pub fn lottery_address() -> ChainAddress {
        ChainAddress::from_canonical("0x5fbdb2315678afecb367f032d93f642f64180aa3")
    }

    pub fn set_balance(&self, holder: &ChainAddress, amount: TokenAmount) {
        lock(&self.state).balances.insert(holder.clone(), amount);
    }

    pub fn set_active(&self, active: bool) {
        lock(&self.state).active = active;
    }

    pub fn set_participants(&self, participants: u64) {
        lock(&self.state).participants = participants;
    }

    pub fn set_ticket_count(&self, holder: &ChainAddress, tickets: u64) {
        lock(&self.state).ticket_counts.insert(holder.clone(), tickets);
    }

    pub fn set_total_tickets(&self, tickets: u64) {
        lock(&self.state).total_tickets = tickets;
    }

    pub fn set_winner(&self, winner: ChainAddress) {
        lock(&self.state).winner = winner;
    }

    /// `method` is the ABI name, e.g. `approve` or `drawWinner`.
    pub fn set_confirm_behavior(&self, method: &'static str, behavior: ConfirmBehavior) {
        lock(&self.state).confirm_behaviors.insert(method, behavior);
    }

    pub fn reject_submission(&self, method: &'static str, message: impl Into<String>) {
        lock(&self.state).rejections.insert(method, message.into());
    }

    /// Make every read of `field` fail with a transport error, e.g. `balanceOf` or `winner`.
    pub fn fail_read(&self, field: &'static str, message: impl Into<String>) {
        lock(&self.state).read_failures.insert(field, message.into());
    }

    pub fn submitted_writes(&self) -> Vec<SubmittedWrite> {
        lock(&self.state).writes.clone()
    }

    pub fn submitted_methods(&self) -> Vec<&'static str> {
        lock(&self.state)
            .writes
            .iter()
            .map(|write| write.method.name())
            .collect()
    }

    pub fn reads_of(&self, field: &str) -> usize {
        lock(&self.state)
            .reads
            .iter()
            .filter(|name| **name == field)
            .count()
    }

    fn note(&self, entry: String) {
        if let Some(journal) = &self.journal {
            journal.record(entry);
        }
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    fn network(&self) -> &str {
        "mock"
    }

    async fn read_contract_field(
        &self,
        _contract: &ChainAddress,
        field: &ContractField,
    ) -> Result<FieldValue, LedgerClientError> {
        let mut state = lock(&self.state);
        state.reads.push(field.name());
        if let Some(message) = state.read_failures.get(field.name()) {
            return Err(LedgerClientError::Transport(message.clone()));
        }
        let value = match field {
            ContractField::BalanceOf { holder } => FieldValue::Amount(
                state.balances.get(holder).copied().unwrap_or(TokenAmount::ZERO),
            ),
            ContractField::IsLotteryActive => FieldValue::Flag(state.active),
            ContractField::ParticipantCount => FieldValue::Count(state.participants),
            ContractField::TicketCount { holder } => {
                FieldValue::Count(state.ticket_counts.get(holder).copied().unwrap_or(0))
            }
            ContractField::TotalTicketCount => FieldValue::Count(state.total_tickets),
            ContractField::PrizeToken => FieldValue::Address(state.prize_token.clone()),
            ContractField::Winner => FieldValue::Address(state.winner.clone()),
        };
        drop(state);
        self.note(format!("ledger:read:{}", field.name()));
        Ok(value)
    }

    async fn submit_write(
        &self,
        contract: &ChainAddress,
        method: &WriteMethod,
        signer: &SigningCredential,
    ) -> Result<PendingTransaction, LedgerClientError> {
        let pending = {
            let mut state = lock(&self.state);
            if let Some(message) = state.rejections.get(method.name()) {
                return Err(LedgerClientError::Rejected(message.clone()));
            }
            state.nonce += 1;
            let tx_hash = format!("0x{:064x}", state.nonce);
            state.pending.insert(tx_hash.clone(), method.name());
            state.writes.push(SubmittedWrite {
                contract: contract.clone(),
                method: method.clone(),
                signer: signer.address().clone(),
                tx_hash: tx_hash.clone(),
            });
            PendingTransaction {
                tx_hash,
                contract: contract.clone(),
                method: method.name().to_string(),
            }
        };
        self.note(format!("ledger:submit:{}", method.name()));
        Ok(pending)
    }

    async fn await_confirmation(
        &self,
        pending: &PendingTransaction,
    ) -> Result<Receipt, LedgerClientError> {
        let (behavior, block_number) = {
            let state = lock(&self.state);
            let method = state
                .pending
                .get(&pending.tx_hash)
                .copied()
                .ok_or_else(|| {
                    LedgerClientError::Transport(format!("unknown transaction {}", pending.tx_hash))
                })?;
            let behavior = state
                .confirm_behaviors
                .get(method)
                .cloned()
                .unwrap_or(ConfirmBehavior::Confirm);
            (behavior, state.nonce + 100)
        };

        let succeeded = match behavior {
            ConfirmBehavior::Confirm => true,
            ConfirmBehavior::Hang => {
                std::future::pending::<()>().await;
                true
            }
            ConfirmBehavior::Revert => false,
            ConfirmBehavior::Delay(delay) => {
                tokio::time::sleep(delay).await;
                true
            }
            ConfirmBehavior::Fail(message) => return Err(LedgerClientError::Transport(message)),
        };

        self.note(format!("ledger:confirmed:{}", pending.method));
        Ok(Receipt {
            tx_hash: pending.tx_hash.clone(),
            block_number: Some(block_number),
            succeeded,
        })
    }
}

#[derive(Default)]
struct SurfaceState {
    views: HashMap<RequestId, (ActorId, Presentation)>,
    last_touched: HashMap<ActorId, RequestId>,
    prompts: Vec<(ActorId, Presentation)>,
    updates: Vec<(ActorId, Presentation)>,
    broadcasts: Vec<Presentation>,
    disable_calls: usize,
}

impl SurfaceState {
    fn show(&mut self, actor: &ActorId, interaction: RequestId, presentation: Presentation) {
        self.views.insert(interaction, (actor.clone(), presentation));
        self.last_touched.insert(actor.clone(), interaction);
    }
}

/// Interaction surface that remembers everything it was asked to show.
#[derive(Default)]
pub struct RecordingSurface {
    state: Mutex<SurfaceState>,
    journal: Option<Journal>,
    fail_updates: AtomicBool,
    fail_prompts: AtomicBool,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Make `update_presentation` fail from now on.
    pub fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    /// Make `present_prompt` fail from now on.
    pub fn fail_prompts(&self, fail: bool) {
        self.fail_prompts.store(fail, Ordering::SeqCst);
    }

    /// The view of whichever interaction `actor` saw change last.
    pub fn current(&self, actor: &ActorId) -> Option<Presentation> {
        let state = lock(&self.state);
        let interaction = state.last_touched.get(actor)?;
        state
            .views
            .get(interaction)
            .map(|(_, presentation)| presentation.clone())
    }

    pub fn view(&self, interaction: RequestId) -> Option<Presentation> {
        lock(&self.state)
            .views
            .get(&interaction)
            .map(|(_, presentation)| presentation.clone())
    }

    pub fn prompts(&self) -> Vec<(ActorId, Presentation)> {
        lock(&self.state).prompts.clone()
    }

    pub fn updates(&self) -> Vec<(ActorId, Presentation)> {
        lock(&self.state).updates.clone()
    }

    pub fn broadcasts(&self) -> Vec<Presentation> {
        lock(&self.state).broadcasts.clone()
    }

    pub fn disable_calls(&self) -> usize {
        lock(&self.state).disable_calls
    }

    /// Confirm and cancel tokens of the last prompt shown to `actor`.
    pub fn prompt_tokens(&self, actor: &ActorId) -> Option<(String, String)> {
        let state = lock(&self.state);
        let (_, prompt) = state.prompts.iter().rev().find(|(owner, _)| owner == actor)?;
        match prompt.options.as_slice() {
            [confirm, cancel, ..] => Some((confirm.token.clone(), cancel.token.clone())),
            _ => None,
        }
    }

    fn note(&self, entry: String) {
        if let Some(journal) = &self.journal {
            journal.record(entry);
        }
    }
}

fn headline(presentation: &Presentation) -> String {
    presentation
        .embed
        .as_ref()
        .map(|embed| embed.title.clone())
        .unwrap_or_else(|| presentation.content.clone())
}

#[async_trait]
impl InteractionSurface for RecordingSurface {
    async fn present_prompt(
        &self,
        actor: &ActorId,
        interaction: RequestId,
        prompt: Presentation,
    ) -> Result<String, LotteryError> {
        if self.fail_prompts.load(Ordering::SeqCst) {
            return Err(LotteryError::Surface("channel unavailable".to_string()));
        }
        let token = prompt
            .options
            .first()
            .map(|option| option.token.clone())
            .ok_or_else(|| LotteryError::Surface("prompt has no options".to_string()))?;
        self.note(format!("surface:prompt:{}", headline(&prompt)));
        let mut state = lock(&self.state);
        state.show(actor, interaction, prompt.clone());
        state.prompts.push((actor.clone(), prompt));
        Ok(token)
    }

    async fn update_presentation(
        &self,
        actor: &ActorId,
        interaction: RequestId,
        presentation: Presentation,
    ) -> Result<(), LotteryError> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(LotteryError::Surface("interaction expired".to_string()));
        }
        self.note(format!("surface:update:{}", headline(&presentation)));
        let mut state = lock(&self.state);
        state.show(actor, interaction, presentation.clone());
        state.updates.push((actor.clone(), presentation));
        Ok(())
    }

    async fn disable_options(
        &self,
        _actor: &ActorId,
        interaction: RequestId,
    ) -> Result<(), LotteryError> {
        self.note("surface:disable".to_string());
        let mut state = lock(&self.state);
        state.disable_calls += 1;
        if let Some((_, view)) = state.views.get_mut(&interaction) {
            let disabled = view.clone().with_options_disabled();
            *view = disabled;
        }
        Ok(())
    }

    async fn broadcast_to_channel(&self, presentation: Presentation) -> Result<(), LotteryError> {
        self.note(format!("surface:broadcast:{}", headline(&presentation)));
        lock(&self.state).broadcasts.push(presentation);
        Ok(())
    }
}
