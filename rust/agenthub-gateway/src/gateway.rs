//! The per-request authorization decision.

use std::sync::Arc;

use agenthub_delegation::{RouteScopes, default_routes};
use agenthub_token::scope;
use tracing::{debug, warn};

use crate::{ChainStore, DelegationContext, Rejection, TokenVerifier};

/// The result of authorizing a request that was not rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// No delegation credential was presented; the request proceeds as-is
    Passthrough,
    /// The delegated caller may proceed under this context
    Authorized(DelegationContext),
}

/// Decides whether a request carrying a delegation token may proceed.
///
/// A presented token is checked in order: the verifier must accept it, its
/// stored chain must load and must not widen scope at any hop, and its scopes
/// must cover what the route requires.
pub struct Gateway<V, C> {
    verifier: Arc<V>,
    chains: Arc<C>,
    routes: Arc<RouteScopes>,
}

impl<V, C> Clone for Gateway<V, C> {
    fn clone(&self) -> Self {
        Self {
            verifier: self.verifier.clone(),
            chains: self.chains.clone(),
            routes: self.routes.clone(),
        }
    }
}

impl<V, C> Gateway<V, C>
where
    V: TokenVerifier,
    C: ChainStore,
{
    /// A gateway using the default route table.
    pub fn new(verifier: V, chains: C) -> Self {
        Self {
            verifier: Arc::new(verifier),
            chains: Arc::new(chains),
            routes: Arc::new(default_routes().clone()),
        }
    }

    /// Replace the route table.
    pub fn with_routes(mut self, routes: RouteScopes) -> Self {
        self.routes = Arc::new(routes);
        self
    }

    /// The route table in use.
    pub fn routes(&self) -> &RouteScopes {
        &self.routes
    }

    /// Authorize `method` on `path` for the holder of `credential`.
    ///
    /// An absent or blank credential passes through untouched.
    ///
    /// # Errors
    ///
    /// Returns a [`Rejection`] with the code the client should see.
    pub async fn authorize(
        &self,
        method: &str,
        path: &str,
        credential: Option<&str>,
    ) -> Result<Outcome, Rejection> {
        let Some(credential) = credential.map(str::trim).filter(|c| !c.is_empty()) else {
            return Ok(Outcome::Passthrough);
        };

        self.judge(method, path, credential)
            .await
            .map(Outcome::Authorized)
            .inspect_err(|rejection| {
                warn!(
                    method,
                    path,
                    code = %rejection.code,
                    "Delegated request rejected: {}",
                    rejection.message
                );
            })
    }

    async fn judge(
        &self,
        method: &str,
        path: &str,
        credential: &str,
    ) -> Result<DelegationContext, Rejection> {
        let context = self
            .verifier
            .verify_delegation_token(credential)
            .await
            .map_err(|err| Rejection::invalid(format!("Invalid delegation token: {err}")))?;

        let chain = self
            .chains
            .get_delegation_chain(&context.token_id)
            .await
            .map_err(|err| {
                Rejection::invalid(format!("Delegation chain unavailable: {err}"))
            })?;

        if chain.len() >= 2 {
            if let Some(violation) = chain.verify_attenuation() {
                return Err(Rejection::scope_escalation(&violation));
            }
        }

        if let Some(required) = self.routes.required_scope(method, path) {
            if !scope::grants(&context.delegated_scopes, required) {
                return Err(Rejection::insufficient_scope(required));
            }
        }

        debug!(
            method,
            path,
            token_id = %context.token_id,
            subject = %context.subject_agent_id,
            chain_depth = context.chain_depth,
            "Authorized delegated request"
        );
        Ok(context)
    }
}
