//! Services the gateway consults for every delegated request.

use agenthub_delegation::DelegationChain;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Failures reported by a [`TokenVerifier`] or [`ChainStore`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollaboratorError {
    /// The token was refused
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The requested record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// The collaborator could not answer
    #[error("Unavailable: {0}")]
    Unavailable(String),
}

/// What the rest of the request pipeline learns about an authorized
/// delegated caller. Inserted into the request's extensions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationContext {
    /// The presented token
    pub token_id: String,
    /// Agent that issued the delegation
    pub issuer_agent_id: String,
    /// Agent acting under the delegation
    pub subject_agent_id: String,
    /// Scopes the token carries
    pub delegated_scopes: Vec<String>,
    /// Number of delegations between the root grant and this token
    pub chain_depth: usize,
}

/// Cryptographic validation of a presented delegation token.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// Validate `token` and describe the delegation it carries.
    async fn verify_delegation_token(
        &self,
        token: &str,
    ) -> Result<DelegationContext, CollaboratorError>;
}

/// Storage of the hop chain behind each delegation token.
#[async_trait]
pub trait ChainStore: Send + Sync {
    /// Load the chain that ends in `token_id`.
    async fn get_delegation_chain(
        &self,
        token_id: &str,
    ) -> Result<DelegationChain, CollaboratorError>;
}
