//! A [`TokenVerifier`] backed by the capability token engine.

use agenthub_token::{CapabilityToken, TokenEngine, VerificationContext};
use async_trait::async_trait;

use crate::{CollaboratorError, DelegationContext, TokenVerifier};

/// A [`TokenVerifier`] that accepts capability tokens in their header form
/// and checks them with a [`TokenEngine`].
#[derive(Debug, Clone)]
pub struct CapabilityTokenVerifier {
    engine: TokenEngine,
}

impl CapabilityTokenVerifier {
    /// Verify tokens with `engine`.
    pub fn new(engine: TokenEngine) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl TokenVerifier for CapabilityTokenVerifier {
    async fn verify_delegation_token(
        &self,
        token: &str,
    ) -> Result<DelegationContext, CollaboratorError> {
        let denied = |err: agenthub_token::TokenError| CollaboratorError::PermissionDenied(err.to_string());

        let token = CapabilityToken::decode(token).map_err(denied)?;
        let verified = self
            .engine
            .verify(&token, &VerificationContext::new())
            .map_err(denied)?;

        Ok(DelegationContext {
            token_id: verified.token_id,
            issuer_agent_id: verified.issuer,
            subject_agent_id: verified.subject,
            delegated_scopes: verified.effective_scopes.into_iter().collect(),
            chain_depth: verified.block_count - 1,
        })
    }
}
