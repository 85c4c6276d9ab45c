use crate::error::LotteryError;
use crate::ledger::{ContractField, FieldValue, LedgerClient, LedgerClientError};
use crate::types::{ChainAddress, TokenAmount};
use std::sync::Arc;
use tracing::debug;

/// Lottery state shown on the draw confirmation prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawSnapshot {
    pub is_active: bool,
    pub participant_count: u64,
    pub actor_tickets: u64,
    pub total_tickets: u64,
    pub prize_token: ChainAddress,
    pub prize_pool: TokenAmount,
}

/// Typed view calls over a [`LedgerClient`]. Nothing is cached; each call hits the ledger.
#[derive(Clone)]
pub struct LedgerReader {
    ledger: Arc<dyn LedgerClient>,
}

impl LedgerReader {
    pub fn new(ledger: Arc<dyn LedgerClient>) -> Self {
        Self { ledger }
    }

    pub async fn token_balance(
        &self,
        token: &ChainAddress,
        holder: &ChainAddress,
    ) -> Result<TokenAmount, LotteryError> {
        let field = ContractField::BalanceOf {
            holder: holder.clone(),
        };
        match self.read(token, &field).await? {
            FieldValue::Amount(amount) => Ok(amount),
            other => Err(unexpected(&field, &other)),
        }
    }

    pub async fn is_lottery_active(&self, lottery: &ChainAddress) -> Result<bool, LotteryError> {
        let field = ContractField::IsLotteryActive;
        match self.read(lottery, &field).await? {
            FieldValue::Flag(active) => Ok(active),
            other => Err(unexpected(&field, &other)),
        }
    }

    pub async fn participant_count(&self, lottery: &ChainAddress) -> Result<u64, LotteryError> {
        self.read_count(lottery, ContractField::ParticipantCount).await
    }

    pub async fn ticket_count(
        &self,
        lottery: &ChainAddress,
        holder: &ChainAddress,
    ) -> Result<u64, LotteryError> {
        self.read_count(
            lottery,
            ContractField::TicketCount {
                holder: holder.clone(),
            },
        )
        .await
    }

    pub async fn total_ticket_count(&self, lottery: &ChainAddress) -> Result<u64, LotteryError> {
        self.read_count(lottery, ContractField::TotalTicketCount).await
    }

    pub async fn prize_token(&self, lottery: &ChainAddress) -> Result<ChainAddress, LotteryError> {
        self.read_address(lottery, ContractField::PrizeToken).await
    }

    pub async fn winner(&self, lottery: &ChainAddress) -> Result<ChainAddress, LotteryError> {
        self.read_address(lottery, ContractField::Winner).await
    }

    pub async fn draw_snapshot(
        &self,
        lottery: &ChainAddress,
        actor_wallet: &ChainAddress,
    ) -> Result<DrawSnapshot, LotteryError> {
        let is_active = self.is_lottery_active(lottery).await?;
        let participant_count = self.participant_count(lottery).await?;
        let actor_tickets = self.ticket_count(lottery, actor_wallet).await?;
        let total_tickets = self.total_ticket_count(lottery).await?;
        let prize_token = self.prize_token(lottery).await?;
        let prize_pool = self.token_balance(&prize_token, lottery).await?;

        Ok(DrawSnapshot {
            is_active,
            participant_count,
            actor_tickets,
            total_tickets,
            prize_token,
            prize_pool,
        })
    }

    async fn read_count(
        &self,
        contract: &ChainAddress,
        field: ContractField,
    ) -> Result<u64, LotteryError> {
        match self.read(contract, &field).await? {
            FieldValue::Count(count) => Ok(count),
            other => Err(unexpected(&field, &other)),
        }
    }

    async fn read_address(
        &self,
        contract: &ChainAddress,
        field: ContractField,
    ) -> Result<ChainAddress, LotteryError> {
        match self.read(contract, &field).await? {
            FieldValue::Address(address) => Ok(address),
            other => Err(unexpected(&field, &other)),
        }
    }

    async fn read(
        &self,
        contract: &ChainAddress,
        field: &ContractField,
    ) -> Result<FieldValue, LotteryError> {
        let value = self.ledger.read_contract_field(contract, field).await?;
        debug!(contract = %contract, field = field.name(), value = ?value, "ledger read");
        Ok(value)
    }
}

fn unexpected(field: &ContractField, value: &FieldValue) -> LotteryError {
    LedgerClientError::Decode(format!(
        "{} returned {} instead of the expected type",
        field.name(),
        value.kind()
    ))
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::MockLedger;

    #[tokio::test]
    async fn draw_snapshot_reads_prize_pool_from_prize_token() {
        let ledger = Arc::new(MockLedger::new());
        let lottery = MockLedger::lottery_address();
        let actor = ChainAddress::parse("0x70997970c51812dc3a010c7d01b50e0d17dc79c8").unwrap();
        ledger.set_participants(3);
        ledger.set_ticket_count(&actor, 2);
        ledger.set_total_tickets(9);
        ledger.set_balance(&lottery, TokenAmount::from_whole(9, 18).unwrap());

        let snapshot = LedgerReader::new(ledger.clone())
            .draw_snapshot(&lottery, &actor)
            .await
            .unwrap();
        assert!(snapshot.is_active);
        assert_eq!(snapshot.participant_count, 3);
        assert_eq!(snapshot.actor_tickets, 2);
        assert_eq!(snapshot.total_tickets, 9);
        assert_eq!(snapshot.prize_pool.format_units(18), "9");
    }
}
