use crate::error::LotteryError;
use crate::types::{ActorId, ChainAddress};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

/// Private key material plus the wallet address it controls.
///
/// Borrowed read-only while a workflow commits; never persisted or logged by the core.
#[derive(Clone)]
pub struct SigningCredential {
    address: ChainAddress,
    private_key: SecretString,
}

impl SigningCredential {
    pub fn new(address: ChainAddress, private_key: impl Into<String>) -> Self {
        Self {
            address,
            private_key: SecretString::new(private_key.into()),
        }
    }

    pub fn address(&self) -> &ChainAddress {
        &self.address
    }

    /// Hex-encoded secp256k1 key, for the signer only.
    pub fn expose_private_key(&self) -> &str {
        self.private_key.expose_secret()
    }
}

impl fmt::Debug for SigningCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningCredential")
            .field("address", &self.address)
            .field("private_key", &"[REDACTED]")
            .finish()
    }
}

/// Lookup of linked wallets by actor.
#[async_trait]
pub trait AccountStore: Send + Sync {
    fn backend(&self) -> &'static str;

    async fn find_credential(
        &self,
        actor: &ActorId,
    ) -> Result<Option<SigningCredential>, LotteryError>;
}

/// Process-local account store.
#[derive(Default)]
pub struct InMemoryAccountStore {
    credentials: RwLock<HashMap<ActorId, SigningCredential>>,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn link(&self, actor: ActorId, credential: SigningCredential) -> Result<(), LotteryError> {
        let mut credentials = self
            .credentials
            .write()
            .map_err(|_| LotteryError::InvariantViolation("account lock poisoned".to_string()))?;
        credentials.insert(actor, credential);
        Ok(())
    }

    pub fn unlink(&self, actor: &ActorId) -> Result<bool, LotteryError> {
        let mut credentials = self
            .credentials
            .write()
            .map_err(|_| LotteryError::InvariantViolation("account lock poisoned".to_string()))?;
        Ok(credentials.remove(actor).is_some())
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn find_credential(
        &self,
        actor: &ActorId,
    ) -> Result<Option<SigningCredential>, LotteryError> {
        let credentials = self
            .credentials
            .read()
            .map_err(|_| LotteryError::InvariantViolation("account lock poisoned".to_string()))?;
        Ok(credentials.get(actor).cloned())
    }
}
