use crate::accounts::{AccountStore, SigningCredential};
use crate::config::LotteryConfig;
use crate::error::LotteryError;
use crate::snapshot::LedgerReader;
use crate::types::{ActorId, ChainAddress, TicketAmount, TokenAmount};
use std::sync::Arc;
use tracing::debug;

/// Re-checks workflow preconditions against fresh ledger state.
#[derive(Clone)]
pub struct PreflightValidator {
    accounts: Arc<dyn AccountStore>,
    reader: LedgerReader,
    token_address: ChainAddress,
    token_symbol: String,
    token_decimals: u8,
    wallet_link_command: String,
    min_participants: u64,
}

impl PreflightValidator {
    pub fn new(
        config: &LotteryConfig,
        accounts: Arc<dyn AccountStore>,
        reader: LedgerReader,
    ) -> Self {
        Self {
            accounts,
            reader,
            token_address: config.token_address.clone(),
            token_symbol: config.token_symbol.clone(),
            token_decimals: config.token_decimals,
            wallet_link_command: config.wallet_link_command.clone(),
            min_participants: config.min_participants,
        }
    }

    pub async fn require_credential(
        &self,
        actor: &ActorId,
    ) -> Result<SigningCredential, LotteryError> {
        self.accounts
            .find_credential(actor)
            .await?
            .ok_or_else(|| LotteryError::NotAuthorized {
                link_command: self.wallet_link_command.clone(),
            })
    }

    /// Token cost of `ticket_amount` tickets, one whole token each.
    pub fn ticket_cost(&self, ticket_amount: TicketAmount) -> Result<TokenAmount, LotteryError> {
        TokenAmount::from_whole(ticket_amount.get(), self.token_decimals).ok_or_else(|| {
            LotteryError::InvalidCommand(format!(
                "{ticket_amount} tickets cost more than a token amount can hold"
            ))
        })
    }

    pub async fn check_funds(
        &self,
        holder: &ChainAddress,
        ticket_amount: TicketAmount,
    ) -> Result<(), LotteryError> {
        let balance = self.reader.token_balance(&self.token_address, holder).await?;
        let cost = self.ticket_cost(ticket_amount)?;
        debug!(
            holder = %holder,
            balance = %balance.format_units(self.token_decimals),
            cost = %cost.format_units(self.token_decimals),
            "checked token balance"
        );
        if balance < cost {
            return Err(LotteryError::InsufficientFunds {
                required: cost.format_units(self.token_decimals),
                symbol: self.token_symbol.clone(),
            });
        }
        Ok(())
    }

    pub async fn check_draw(&self, lottery: &ChainAddress) -> Result<(), LotteryError> {
        let active = self.reader.is_lottery_active(lottery).await?;
        if !active {
            return Err(LotteryError::LotteryInactive);
        }
        let participants = self.reader.participant_count(lottery).await?;
        self.check_draw_state(active, participants)
    }

    /// Same rule as [`Self::check_draw`], over values already read.
    pub fn check_draw_state(&self, active: bool, participants: u64) -> Result<(), LotteryError> {
        if !active {
            return Err(LotteryError::LotteryInactive);
        }
        if participants < self.min_participants {
            return Err(LotteryError::InsufficientParticipants {
                current: participants,
                minimum: self.min_participants,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::InMemoryAccountStore;
    use crate::mocks::MockLedger;

    fn validator(
        ledger: Arc<MockLedger>,
        accounts: Arc<InMemoryAccountStore>,
    ) -> PreflightValidator {
        PreflightValidator::new(&LotteryConfig::default(), accounts, LedgerReader::new(ledger))
    }

    #[tokio::test]
    async fn missing_credential_is_not_authorized() {
        let validator = validator(
            Arc::new(MockLedger::new()),
            Arc::new(InMemoryAccountStore::new()),
        );
        let err = validator
            .require_credential(&ActorId::new("nobody"))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "You need to connect a wallet first using /connect-wallet."
        );
    }

    #[tokio::test]
    async fn balance_below_cost_is_insufficient() {
        let ledger = Arc::new(MockLedger::new());
        let holder = ChainAddress::parse("0x70997970c51812dc3a010c7d01b50e0d17dc79c8").unwrap();
        ledger.set_balance(&holder, TokenAmount::from_whole(3, 18).unwrap());
        let validator = validator(ledger, Arc::new(InMemoryAccountStore::new()));

        let err = validator
            .check_funds(&holder, TicketAmount::new(5).unwrap())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Insufficient RLUSD. You need 5 RLUSD.");

        assert!(validator
            .check_funds(&holder, TicketAmount::new(3).unwrap())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn inactive_lottery_is_checked_before_participants() {
        let ledger = Arc::new(MockLedger::new());
        ledger.set_active(false);
        ledger.set_participants(0);
        let validator = validator(ledger, Arc::new(InMemoryAccountStore::new()));

        let err = validator
            .check_draw(&MockLedger::lottery_address())
            .await
            .unwrap_err();
        assert!(matches!(err, LotteryError::LotteryInactive));
    }

    #[test]
    fn participants_below_minimum_are_rejected() {
        let validator = validator(
            Arc::new(MockLedger::new()),
            Arc::new(InMemoryAccountStore::new()),
        );
        let err = validator.check_draw_state(true, 0).unwrap_err();
        assert_eq!(err.to_string(), "Need at least 1 participant (current: 0).");
        assert!(validator.check_draw_state(true, 1).is_ok());
    }

    #[test]
    fn unrepresentable_cost_is_an_error() {
        let mut config = LotteryConfig::default();
        config.token_decimals = 38;
        let validator = PreflightValidator::new(
            &config,
            Arc::new(InMemoryAccountStore::new()),
            LedgerReader::new(Arc::new(MockLedger::new())),
        );
        assert!(validator.ticket_cost(TicketAmount::new(3).unwrap()).is_ok());
        assert!(matches!(
            validator.ticket_cost(TicketAmount::new(4).unwrap()),
            Err(LotteryError::InvalidCommand(_))
        ));
    }
}
