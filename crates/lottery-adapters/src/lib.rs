//! Concrete collaborators for `lottery-core`: an EVM JSON-RPC ledger client and
//! file / PostgreSQL account stores.

pub mod accounts;
pub mod evm;

pub use accounts::{
    bootstrap_account_store, AccountStoreConfig, AccountStoreError, FileAccountStore,
    LinkedAccount, PostgresAccountStore,
};
pub use evm::{EvmLedgerClient, EvmLedgerConfig};
