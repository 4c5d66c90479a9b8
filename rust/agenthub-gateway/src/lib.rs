#![warn(missing_docs)]

//! Delegation-aware authorization for AgentHub HTTP services.
//!
//! Requests carrying an `x-delegation-token` header are authorized by a
//! [`Gateway`] before they reach the service:
//!
//! 1. a [`TokenVerifier`] must accept the token (else `delegation.invalid`, 401)
//! 2. the token's chain is loaded from a [`ChainStore`] (else
//!    `delegation.invalid`, 401)
//! 3. no hop of the chain may widen scope (else
//!    `delegation.scope_escalation`, 403)
//! 4. the token must carry the scope the route requires (else
//!    `delegation.insufficient_scope`, 403)
//!
//! Authorized requests continue with a [`DelegationContext`] attached.
//! Requests without the header pass through untouched.
//!
//! [`DelegationLayer`] runs the gateway as [`tower`] middleware.
//! [`CapabilityTokenVerifier`] verifies capability tokens issued by
//! [`agenthub_token`], and [`MemoryChainStore`] keeps chains in process.

mod bridge;
mod collaborator;
mod error;
mod gateway;
mod layer;
mod memory;

pub use bridge::*;
pub use collaborator::*;
pub use error::*;
pub use gateway::*;
pub use layer::*;
pub use memory::*;
