use crate::accounts::SigningCredential;
use crate::error::LotteryError;
use crate::ledger::{LedgerClient, LedgerClientError, PendingTransaction, Receipt, WriteMethod};
use crate::types::ChainAddress;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// One planned write in a commit sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteStep {
    /// Log label, e.g. `approve`.
    pub label: &'static str,
    pub contract: ChainAddress,
    pub method: WriteMethod,
}

impl WriteStep {
    pub fn new(label: &'static str, contract: ChainAddress, method: WriteMethod) -> Self {
        Self {
            label,
            contract,
            method,
        }
    }
}

impl From<LedgerClientError> for LotteryError {
    fn from(value: LedgerClientError) -> Self {
        LotteryError::ExecutionFailed(value.to_string())
    }
}

/// A submitted write whose confirmation has not been observed yet.
pub struct TransactionHandle {
    step: &'static str,
    pending: PendingTransaction,
    ledger: Arc<dyn LedgerClient>,
}

impl TransactionHandle {
    pub fn tx_hash(&self) -> &str {
        &self.pending.tx_hash
    }

    pub fn step(&self) -> &'static str {
        self.step
    }

    /// Wait for the receipt, giving up after `timeout`.
    ///
    /// Giving up abandons the wait only. The transaction may still be mined later.
    #[instrument(skip(self), fields(step = self.step, tx_hash = %self.pending.tx_hash))]
    pub async fn confirm(self, timeout: Duration) -> Result<Receipt, LotteryError> {
        let wait = self.ledger.await_confirmation(&self.pending);
        let outcome = tokio::time::timeout(timeout, wait).await;
        let receipt = match outcome {
            Ok(result) => result?,
            Err(_) => {
                warn!(
                    waited_ms = timeout.as_millis() as u64,
                    "confirmation wait timed out; transaction may still be pending"
                );
                return Err(LotteryError::TransactionTimeout {
                    step: self.step,
                    tx_hash: self.pending.tx_hash,
                    waited: timeout,
                });
            }
        };

        if !receipt.succeeded {
            return Err(LotteryError::ExecutionFailed(format!(
                "{} transaction {} reverted",
                self.pending.method, receipt.tx_hash
            )));
        }
        Ok(receipt)
    }
}

/// Issues an ordered sequence of writes, each confirmed before the next is submitted.
#[derive(Clone)]
pub struct CommitExecutor {
    ledger: Arc<dyn LedgerClient>,
    confirmation_timeout: Duration,
}

impl CommitExecutor {
    pub fn new(ledger: Arc<dyn LedgerClient>, confirmation_timeout: Duration) -> Self {
        Self {
            ledger,
            confirmation_timeout,
        }
    }

    pub fn confirmation_timeout(&self) -> Duration {
        self.confirmation_timeout
    }

    pub async fn submit(
        &self,
        step: &WriteStep,
        signer: &SigningCredential,
    ) -> Result<TransactionHandle, LotteryError> {
        let pending = self
            .ledger
            .submit_write(&step.contract, &step.method, signer)
            .await?;
        info!(
            step = step.label,
            tx_hash = %pending.tx_hash,
            contract = %step.contract,
            "transaction sent"
        );
        Ok(TransactionHandle {
            step: step.label,
            pending,
            ledger: Arc::clone(&self.ledger),
        })
    }

    /// Run `steps` in order. Stops at the first failure; earlier writes are not undone.
    pub async fn execute(
        &self,
        steps: &[WriteStep],
        signer: &SigningCredential,
    ) -> Result<Vec<Receipt>, LotteryError> {
        let mut receipts: Vec<Receipt> = Vec::with_capacity(steps.len());
        for step in steps {
            let outcome = match self.submit(step, signer).await {
                Ok(handle) => handle.confirm(self.confirmation_timeout).await,
                Err(err) => Err(err),
            };

            match outcome {
                Ok(receipt) => {
                    info!(
                        step = step.label,
                        tx_hash = %receipt.tx_hash,
                        block_number = receipt.block_number,
                        "transaction confirmed"
                    );
                    receipts.push(receipt);
                }
                Err(err) => {
                    if let Some(previous) = receipts.last() {
                        warn!(
                            step = step.label,
                            committed_tx_hash = %previous.tx_hash,
                            completed_steps = receipts.len(),
                            error = %err,
                            "write sequence stopped after earlier writes committed; they stay in effect"
                        );
                    }
                    return Err(err);
                }
            }
        }
        Ok(receipts)
    }
}
