use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lottery_core::{
    AccountStore, ActorId, ChainAddress, InMemoryAccountStore, LotteryError, SigningCredential,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum AccountStoreError {
    #[error("account store IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("account store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("account store database error: {0}")]
    Database(String),
    #[error("account store contains invalid data: {0}")]
    Corrupt(String),
    #[error("account store lock poisoned")]
    Poisoned,
}

impl From<AccountStoreError> for LotteryError {
    fn from(value: AccountStoreError) -> Self {
        LotteryError::AccountStore(value.to_string())
    }
}

/// Where linked wallets live.
#[derive(Debug, Clone)]
pub enum AccountStoreConfig {
    /// Process memory only; links vanish on restart.
    Memory,
    /// JSON file rewritten on every link.
    File { path: PathBuf },
    Postgres {
        database_url: String,
        max_connections: u32,
    },
}

impl AccountStoreConfig {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::File { .. } => "file",
            Self::Postgres { .. } => "postgres",
        }
    }
}

impl Default for AccountStoreConfig {
    fn default() -> Self {
        Self::Memory
    }
}

pub async fn bootstrap_account_store(
    config: AccountStoreConfig,
) -> Result<Arc<dyn AccountStore>, AccountStoreError> {
    let store: Arc<dyn AccountStore> = match config {
        AccountStoreConfig::Memory => Arc::new(InMemoryAccountStore::new()),
        AccountStoreConfig::File { path } => Arc::new(FileAccountStore::load(path)?),
        AccountStoreConfig::Postgres {
            database_url,
            max_connections,
        } => {
            let store = PostgresAccountStore::connect(&database_url, max_connections).await?;
            store.ensure_schema().await?;
            Arc::new(store)
        }
    };
    info!(backend = store.backend(), "account store ready");
    Ok(store)
}

/// One actor's linked wallet as stored on disk.
///
/// `Debug` shows the key as redacted; only the file itself holds it in clear.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkedAccount {
    pub address: ChainAddress,
    #[serde(with = "stored_key")]
    pub private_key: SecretString,
    pub linked_at: DateTime<Utc>,
}

impl LinkedAccount {
    fn credential(&self) -> SigningCredential {
        SigningCredential::new(
            self.address.clone(),
            self.private_key.expose_secret().clone(),
        )
    }
}

mod stored_key {
    use super::*;

    pub fn serialize<S: Serializer>(key: &SecretString, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(key.expose_secret())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(SecretString::new)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct AccountFileData {
    accounts: BTreeMap<ActorId, LinkedAccount>,
}

/// File-backed account store.
///
/// The file is rewritten through a temp file and rename after every mutation.
#[derive(Debug)]
pub struct FileAccountStore {
    path: PathBuf,
    data: Mutex<AccountFileData>,
}

impl FileAccountStore {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, AccountStoreError> {
        let path = path.into();
        let data = if path.exists() {
            let bytes = fs::read(&path)?;
            if bytes.is_empty() {
                AccountFileData::default()
            } else {
                serde_json::from_slice(&bytes)?
            }
        } else {
            AccountFileData::default()
        };

        Ok(Self {
            path,
            data: Mutex::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn link(
        &self,
        actor: ActorId,
        address: ChainAddress,
        private_key: impl Into<String>,
    ) -> Result<(), AccountStoreError> {
        let mut data = self.data.lock().map_err(|_| AccountStoreError::Poisoned)?;
        data.accounts.insert(
            actor,
            LinkedAccount {
                address,
                private_key: SecretString::new(private_key.into()),
                linked_at: Utc::now(),
            },
        );
        self.persist(&data)
    }

    pub fn unlink(&self, actor: &ActorId) -> Result<bool, AccountStoreError> {
        let mut data = self.data.lock().map_err(|_| AccountStoreError::Poisoned)?;
        let removed = data.accounts.remove(actor).is_some();
        if removed {
            self.persist(&data)?;
        }
        Ok(removed)
    }

    pub fn len(&self) -> usize {
        self.data.lock().map(|data| data.accounts.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn persist(&self, data: &AccountFileData) -> Result<(), AccountStoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let bytes = serde_json::to_vec_pretty(data)?;
        let tmp_path = self.path.with_extension("tmp");
        fs::write(&tmp_path, bytes)?;
        fs::rename(tmp_path, &self.path)?;
        Ok(())
    }
}

#[async_trait]
impl AccountStore for FileAccountStore {
    fn backend(&self) -> &'static str {
        "file"
    }

    async fn find_credential(
        &self,
        actor: &ActorId,
    ) -> Result<Option<SigningCredential>, LotteryError> {
        let data = self.data.lock().map_err(|_| AccountStoreError::Poisoned)?;
        Ok(data.accounts.get(actor).map(LinkedAccount::credential))
    }
}

/// PostgreSQL-backed account store, one row per actor in `lottery_accounts`.
#[derive(Debug, Clone)]
pub struct PostgresAccountStore {
    pool: PgPool,
}

impl PostgresAccountStore {
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
    ) -> Result<Self, AccountStoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect(database_url)
            .await
            .map_err(|e| AccountStoreError::Database(format!("postgres connect failed: {e}")))?;

        Ok(Self { pool })
    }

    pub async fn ensure_schema(&self) -> Result<(), AccountStoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS lottery_accounts (
                actor_id TEXT PRIMARY KEY,
                wallet_address TEXT NOT NULL,
                private_key TEXT NOT NULL,
                linked_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AccountStoreError::Database(format!("postgres schema create failed: {e}"))
        })?;

        Ok(())
    }

    pub async fn link(
        &self,
        actor: &ActorId,
        address: &ChainAddress,
        private_key: &str,
    ) -> Result<(), AccountStoreError> {
        sqlx::query(
            r#"
            INSERT INTO lottery_accounts (actor_id, wallet_address, private_key, linked_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (actor_id) DO UPDATE
            SET wallet_address = EXCLUDED.wallet_address,
                private_key = EXCLUDED.private_key,
                linked_at = EXCLUDED.linked_at
            "#,
        )
        .bind(actor.as_str())
        .bind(address.as_str())
        .bind(private_key)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| AccountStoreError::Database(format!("postgres upsert failed: {e}")))?;

        Ok(())
    }

    async fn load(&self, actor: &ActorId) -> Result<Option<SigningCredential>, AccountStoreError> {
        let row = sqlx::query(
            "SELECT wallet_address, private_key FROM lottery_accounts WHERE actor_id = $1",
        )
        .bind(actor.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AccountStoreError::Database(format!("postgres select failed: {e}")))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let address: String = row.try_get("wallet_address").map_err(|e| {
            AccountStoreError::Database(format!("wallet_address decode failed: {e}"))
        })?;
        let private_key: String = row.try_get("private_key").map_err(|e| {
            AccountStoreError::Database(format!("private_key decode failed: {e}"))
        })?;
        let address = ChainAddress::parse(&address)
            .map_err(|e| AccountStoreError::Corrupt(format!("actor {actor}: {e}")))?;

        Ok(Some(SigningCredential::new(address, private_key)))
    }
}

#[async_trait]
impl AccountStore for PostgresAccountStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn find_credential(
        &self,
        actor: &ActorId,
    ) -> Result<Option<SigningCredential>, LotteryError> {
        Ok(self.load(actor).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    const WALLET: &str = "0x70997970c51812dc3a010c7d01b50e0d17dc79c8";
    const KEY: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

    fn temp_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("lottery-accounts-{}", Uuid::new_v4()))
            .join("accounts.json")
    }

    #[tokio::test]
    async fn links_survive_reload() {
        let path = temp_path();
        let store = FileAccountStore::load(&path).unwrap();
        let actor = ActorId::new("discord-42");
        store
            .link(actor.clone(), ChainAddress::parse(WALLET).unwrap(), KEY)
            .unwrap();

        let reloaded = FileAccountStore::load(&path).unwrap();
        assert_eq!(reloaded.len(), 1);
        let credential = reloaded.find_credential(&actor).await.unwrap().unwrap();
        assert_eq!(credential.address().as_str(), WALLET);
        assert_eq!(credential.expose_private_key(), KEY);
    }

    #[tokio::test]
    async fn unknown_actor_has_no_credential() {
        let store = FileAccountStore::load(temp_path()).unwrap();
        assert!(store.is_empty());
        assert!(store
            .find_credential(&ActorId::new("nobody"))
            .await
            .unwrap()
            .is_none());
    }

    #[test]
    fn unlink_rewrites_file() {
        let path = temp_path();
        let store = FileAccountStore::load(&path).unwrap();
        let actor = ActorId::new("discord-7");
        store
            .link(actor.clone(), ChainAddress::parse(WALLET).unwrap(), KEY)
            .unwrap();
        assert!(store.unlink(&actor).unwrap());
        assert!(!store.unlink(&actor).unwrap());
        assert!(FileAccountStore::load(&path).unwrap().is_empty());
    }

    #[test]
    fn corrupt_file_is_reported() {
        let path = temp_path();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"{not json").unwrap();
        assert!(matches!(
            FileAccountStore::load(&path).unwrap_err(),
            AccountStoreError::Serialization(_)
        ));
    }

    #[test]
    fn debug_output_of_file_store_redacts_keys() {
        let store = FileAccountStore::load(temp_path()).unwrap();
        store
            .link(
                ActorId::new("discord-9"),
                ChainAddress::parse(WALLET).unwrap(),
                KEY,
            )
            .unwrap();

        let rendered = format!("{store:?}");
        assert!(!rendered.contains("59c6995e"));
        assert!(rendered.contains(WALLET));

        let stored = fs::read_to_string(store.path()).unwrap();
        assert!(stored.contains(KEY));
    }

    #[tokio::test]
    async fn memory_config_bootstraps() {
        let store = bootstrap_account_store(AccountStoreConfig::Memory)
            .await
            .unwrap();
        assert_eq!(store.backend(), "memory");
    }
}
