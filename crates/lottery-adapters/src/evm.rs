//! JSON-RPC ledger client for EVM chains.

use alloy::network::EthereumWallet;
use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use alloy::sol;
use alloy::sol_types::SolCall;
use alloy::transports::http::reqwest::Url;
use alloy::transports::{RpcError, TransportErrorKind};
use async_trait::async_trait;
use lottery_core::{
    ChainAddress, ContractField, FieldValue, LedgerClient, LedgerClientError, PendingTransaction,
    Receipt, SigningCredential, TokenAmount, WriteMethod,
};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

sol! {
    interface IRlusd {
        function approve(address spender, uint256 amount) external returns (bool);
        function balanceOf(address account) external view returns (uint256);
    }

    interface ILottery {
        function buyTicket(uint256 ticketAmount) external;
        function drawWinner() external;
        function winner() external view returns (address);
        function isLotteryActive() external view returns (bool);
        function getParticipantCount() external view returns (uint256);
        function ticketCount(address holder) external view returns (uint256);
        function getTotalTicketCount() external view returns (uint256);
        function rlusdToken() external view returns (address);
    }
}

#[derive(Debug, Clone)]
pub struct EvmLedgerConfig {
    pub rpc_url: String,
    /// Receipt polling cadence while a write is pending.
    pub poll_interval: Duration,
}

impl EvmLedgerConfig {
    pub fn new(rpc_url: impl Into<String>) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            poll_interval: Duration::from_secs(1),
        }
    }
}

/// [`LedgerClient`] over an HTTP JSON-RPC endpoint.
///
/// Writes are signed locally with the actor's key; nonce, gas and chain id come from the
/// provider's recommended fillers.
pub struct EvmLedgerClient {
    rpc_url: Url,
    poll_interval: Duration,
}

impl EvmLedgerClient {
    pub fn new(config: EvmLedgerConfig) -> Result<Self, LedgerClientError> {
        let rpc_url = config.rpc_url.parse::<Url>().map_err(|e| {
            LedgerClientError::Transport(format!("invalid RPC url '{}': {e}", config.rpc_url))
        })?;
        Ok(Self {
            rpc_url,
            poll_interval: config.poll_interval,
        })
    }

    pub fn rpc_url(&self) -> &Url {
        &self.rpc_url
    }

    async fn call(
        &self,
        contract: &ChainAddress,
        calldata: Vec<u8>,
    ) -> Result<Bytes, LedgerClientError> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.clone());
        let tx = TransactionRequest::default()
            .to(to_address(contract)?)
            .input(calldata.into());
        provider.call(&tx).await.map_err(classify_rpc_error)
    }
}

#[async_trait]
impl LedgerClient for EvmLedgerClient {
    fn network(&self) -> &str {
        "evm"
    }

    async fn read_contract_field(
        &self,
        contract: &ChainAddress,
        field: &ContractField,
    ) -> Result<FieldValue, LedgerClientError> {
        let output = self.call(contract, encode_read(field)?).await?;
        decode_read(field, &output)
    }

    async fn submit_write(
        &self,
        contract: &ChainAddress,
        method: &WriteMethod,
        signer: &SigningCredential,
    ) -> Result<PendingTransaction, LedgerClientError> {
        let key = PrivateKeySigner::from_str(signer.expose_private_key().trim_start_matches("0x"))
            .map_err(|_| {
                LedgerClientError::Rejected(
                    "linked private key is not a valid secp256k1 key".to_string(),
                )
            })?;
        let wallet = EthereumWallet::from(key);
        let provider = ProviderBuilder::new()
            .with_recommended_fillers()
            .wallet(wallet)
            .on_http(self.rpc_url.clone());

        let tx = TransactionRequest::default()
            .to(to_address(contract)?)
            .input(encode_write(method)?.into());
        let pending = provider
            .send_transaction(tx)
            .await
            .map_err(classify_rpc_error)?;

        Ok(PendingTransaction {
            tx_hash: format!("{:#x}", pending.tx_hash()),
            contract: contract.clone(),
            method: method.name().to_string(),
        })
    }

    async fn await_confirmation(
        &self,
        pending: &PendingTransaction,
    ) -> Result<Receipt, LedgerClientError> {
        let hash = TxHash::from_str(&pending.tx_hash).map_err(|e| {
            LedgerClientError::Decode(format!("bad tx hash '{}': {e}", pending.tx_hash))
        })?;
        let provider = ProviderBuilder::new().on_http(self.rpc_url.clone());

        loop {
            let receipt = provider
                .get_transaction_receipt(hash)
                .await
                .map_err(classify_rpc_error)?;
            if let Some(receipt) = receipt {
                return Ok(Receipt {
                    tx_hash: format!("{:#x}", receipt.transaction_hash),
                    block_number: receipt.block_number,
                    succeeded: receipt.status(),
                });
            }
            debug!(tx_hash = %pending.tx_hash, "receipt not available yet");
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

fn to_address(address: &ChainAddress) -> Result<Address, LedgerClientError> {
    Address::from_str(address.as_str())
        .map_err(|e| LedgerClientError::Decode(format!("address {address}: {e}")))
}

fn from_address(address: Address) -> Result<ChainAddress, LedgerClientError> {
    ChainAddress::parse(&format!("{address:#x}"))
        .map_err(|e| LedgerClientError::Decode(e.to_string()))
}

fn to_count(field: &ContractField, value: U256) -> Result<u64, LedgerClientError> {
    u64::try_from(value).map_err(|_| {
        LedgerClientError::Decode(format!("{} value {value} exceeds u64", field.name()))
    })
}

fn encode_read(field: &ContractField) -> Result<Vec<u8>, LedgerClientError> {
    Ok(match field {
        ContractField::BalanceOf { holder } => IRlusd::balanceOfCall {
            account: to_address(holder)?,
        }
        .abi_encode(),
        ContractField::IsLotteryActive => ILottery::isLotteryActiveCall {}.abi_encode(),
        ContractField::ParticipantCount => ILottery::getParticipantCountCall {}.abi_encode(),
        ContractField::TicketCount { holder } => ILottery::ticketCountCall {
            holder: to_address(holder)?,
        }
        .abi_encode(),
        ContractField::TotalTicketCount => ILottery::getTotalTicketCountCall {}.abi_encode(),
        ContractField::PrizeToken => ILottery::rlusdTokenCall {}.abi_encode(),
        ContractField::Winner => ILottery::winnerCall {}.abi_encode(),
    })
}

fn decode_read(field: &ContractField, output: &[u8]) -> Result<FieldValue, LedgerClientError> {
    let decode_err =
        |e: alloy::sol_types::Error| LedgerClientError::Decode(format!("{}: {e}", field.name()));

    Ok(match field {
        ContractField::BalanceOf { .. } => {
            let value = IRlusd::balanceOfCall::abi_decode_returns(output, true)
                .map_err(decode_err)?
                ._0;
            let units = u128::try_from(value).map_err(|_| {
                LedgerClientError::Decode(format!("balance {value} exceeds u128"))
            })?;
            FieldValue::Amount(TokenAmount::from_base_units(units))
        }
        ContractField::IsLotteryActive => FieldValue::Flag(
            ILottery::isLotteryActiveCall::abi_decode_returns(output, true)
                .map_err(decode_err)?
                ._0,
        ),
        ContractField::ParticipantCount => FieldValue::Count(to_count(
            field,
            ILottery::getParticipantCountCall::abi_decode_returns(output, true)
                .map_err(decode_err)?
                ._0,
        )?),
        ContractField::TicketCount { .. } => FieldValue::Count(to_count(
            field,
            ILottery::ticketCountCall::abi_decode_returns(output, true)
                .map_err(decode_err)?
                ._0,
        )?),
        ContractField::TotalTicketCount => FieldValue::Count(to_count(
            field,
            ILottery::getTotalTicketCountCall::abi_decode_returns(output, true)
                .map_err(decode_err)?
                ._0,
        )?),
        ContractField::PrizeToken => FieldValue::Address(from_address(
            ILottery::rlusdTokenCall::abi_decode_returns(output, true)
                .map_err(decode_err)?
                ._0,
        )?),
        ContractField::Winner => FieldValue::Address(from_address(
            ILottery::winnerCall::abi_decode_returns(output, true)
                .map_err(decode_err)?
                ._0,
        )?),
    })
}

fn encode_write(method: &WriteMethod) -> Result<Vec<u8>, LedgerClientError> {
    Ok(match method {
        WriteMethod::Approve { spender, amount } => IRlusd::approveCall {
            spender: to_address(spender)?,
            amount: U256::from(amount.base_units()),
        }
        .abi_encode(),
        WriteMethod::BuyTicket { ticket_amount } => ILottery::buyTicketCall {
            ticketAmount: U256::from(ticket_amount.get()),
        }
        .abi_encode(),
        WriteMethod::DrawWinner => ILottery::drawWinnerCall {}.abi_encode(),
    })
}

/// Node-side refusals become `Rejected` (or `Reverted` when the node says so); everything else
/// is a transport problem.
fn classify_rpc_error(err: RpcError<TransportErrorKind>) -> LedgerClientError {
    match err {
        RpcError::ErrorResp(payload) => {
            let message = payload.message.to_string();
            if message.to_ascii_lowercase().contains("revert") {
                LedgerClientError::Reverted(message)
            } else {
                LedgerClientError::Rejected(message)
            }
        }
        other => LedgerClientError::Transport(other.to_string()),
    }
}
