use crate::accounts::SigningCredential;
use crate::types::{ChainAddress, TicketAmount, TokenAmount};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// View calls the workflows make against the token and lottery contracts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", rename_all = "snake_case")]
pub enum ContractField {
    /// ERC-20 `balanceOf(holder)`.
    BalanceOf { holder: ChainAddress },
    /// `isLotteryActive()`.
    IsLotteryActive,
    /// `getParticipantCount()`.
    ParticipantCount,
    /// `ticketCount(holder)`.
    TicketCount { holder: ChainAddress },
    /// `getTotalTicketCount()`.
    TotalTicketCount,
    /// `rlusdToken()`, the prize token the lottery pays out in.
    PrizeToken,
    /// `winner()`.
    Winner,
}

impl ContractField {
    pub fn name(&self) -> &'static str {
        match self {
            Self::BalanceOf { .. } => "balanceOf",
            Self::IsLotteryActive => "isLotteryActive",
            Self::ParticipantCount => "getParticipantCount",
            Self::TicketCount { .. } => "ticketCount",
            Self::TotalTicketCount => "getTotalTicketCount",
            Self::PrizeToken => "rlusdToken",
            Self::Winner => "winner",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Amount(TokenAmount),
    Count(u64),
    Flag(bool),
    Address(ChainAddress),
}

impl FieldValue {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Amount(_) => "amount",
            Self::Count(_) => "count",
            Self::Flag(_) => "flag",
            Self::Address(_) => "address",
        }
    }
}

/// State-mutating contract calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum WriteMethod {
    /// ERC-20 `approve(spender, amount)`.
    Approve {
        spender: ChainAddress,
        amount: TokenAmount,
    },
    /// `buyTicket(ticketAmount)`.
    BuyTicket { ticket_amount: TicketAmount },
    /// `drawWinner()`.
    DrawWinner,
}

impl WriteMethod {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Approve { .. } => "approve",
            Self::BuyTicket { .. } => "buyTicket",
            Self::DrawWinner => "drawWinner",
        }
    }
}

/// A write accepted by the node but not yet observed on-ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTransaction {
    pub tx_hash: String,
    pub contract: ChainAddress,
    pub method: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub tx_hash: String,
    pub block_number: Option<u64>,
    /// False when the transaction was mined but reverted.
    pub succeeded: bool,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerClientError {
    #[error("transaction rejected: {0}")]
    Rejected(String),
    #[error("execution reverted: {0}")]
    Reverted(String),
    #[error("ledger transport error: {0}")]
    Transport(String),
    #[error("unexpected contract response: {0}")]
    Decode(String),
}

/// Blockchain client the workflows talk to.
///
/// `await_confirmation` may wait indefinitely; callers bound it with their own timer.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    fn network(&self) -> &str;

    async fn read_contract_field(
        &self,
        contract: &ChainAddress,
        field: &ContractField,
    ) -> Result<FieldValue, LedgerClientError>;

    async fn submit_write(
        &self,
        contract: &ChainAddress,
        method: &WriteMethod,
        signer: &SigningCredential,
    ) -> Result<PendingTransaction, LedgerClientError>;

    async fn await_confirmation(
        &self,
        pending: &PendingTransaction,
    ) -> Result<Receipt, LedgerClientError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_and_method_names_match_contract_abi() {
        assert_eq!(ContractField::ParticipantCount.name(), "getParticipantCount");
        assert_eq!(ContractField::PrizeToken.name(), "rlusdToken");
        assert_eq!(
            WriteMethod::BuyTicket {
                ticket_amount: TicketAmount::new(2).unwrap()
            }
            .name(),
            "buyTicket"
        );
    }

    #[test]
    fn client_errors_keep_underlying_message() {
        let err = LedgerClientError::Reverted("ERC20: insufficient allowance".to_string());
        assert_eq!(
            err.to_string(),
            "execution reverted: ERC20: insufficient allowance"
        );
    }
}
