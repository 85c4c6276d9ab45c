use crate::error::LotteryError;
use crate::types::ActorId;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::warn;

/// Per-actor execution leases. At most one confirmed workflow per actor runs at a time.
#[derive(Clone, Default)]
pub struct ActorLocks {
    held: Arc<Mutex<HashSet<ActorId>>>,
}

impl ActorLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails with `ActorBusy` while another lease for `actor` is alive.
    pub fn acquire(&self, actor: &ActorId) -> Result<ActorLease, LotteryError> {
        let mut held = self
            .held
            .lock()
            .map_err(|_| LotteryError::InvariantViolation("lease lock poisoned".to_string()))?;
        if !held.insert(actor.clone()) {
            return Err(LotteryError::ActorBusy);
        }
        Ok(ActorLease {
            actor: actor.clone(),
            held: Arc::clone(&self.held),
        })
    }

    pub fn is_held(&self, actor: &ActorId) -> bool {
        self.held
            .lock()
            .map(|held| held.contains(actor))
            .unwrap_or(false)
    }
}

/// Released on drop.
#[derive(Debug)]
pub struct ActorLease {
    actor: ActorId,
    held: Arc<Mutex<HashSet<ActorId>>>,
}

impl ActorLease {
    pub fn actor(&self) -> &ActorId {
        &self.actor
    }
}

impl Drop for ActorLease {
    fn drop(&mut self) {
        match self.held.lock() {
            Ok(mut held) => {
                held.remove(&self.actor);
            }
            Err(poisoned) => {
                warn!(actor = %self.actor, "lease table poisoned; releasing anyway");
                poisoned.into_inner().remove(&self.actor);
            }
        }
    }
}
