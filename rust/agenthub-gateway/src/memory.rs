//! An in-process [`ChainStore`](crate::ChainStore).

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use agenthub_delegation::DelegationChain;
use async_trait::async_trait;

use crate::{ChainStore, CollaboratorError};

/// An in-process [`ChainStore`]. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryChainStore {
    chains: Arc<Mutex<HashMap<String, DelegationChain>>>,
}

impl MemoryChainStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `chain` as the chain behind `token_id`, replacing any previous
    /// one.
    pub fn insert(
        &self,
        token_id: impl Into<String>,
        chain: impl Into<DelegationChain>,
    ) -> Result<(), CollaboratorError> {
        self.chains
            .lock()
            .map_err(|_| poisoned())?
            .insert(token_id.into(), chain.into());
        Ok(())
    }

    /// Forget the chain behind `token_id`.
    pub fn remove(&self, token_id: &str) -> Result<Option<DelegationChain>, CollaboratorError> {
        Ok(self.chains.lock().map_err(|_| poisoned())?.remove(token_id))
    }
}

#[async_trait]
impl ChainStore for MemoryChainStore {
    async fn get_delegation_chain(
        &self,
        token_id: &str,
    ) -> Result<DelegationChain, CollaboratorError> {
        self.chains
            .lock()
            .map_err(|_| poisoned())?
            .get(token_id)
            .cloned()
            .ok_or_else(|| {
                CollaboratorError::NotFound(format!("No delegation chain for token {token_id}"))
            })
    }
}

fn poisoned() -> CollaboratorError {
    CollaboratorError::Unavailable("chain store lock poisoned".to_string())
}
