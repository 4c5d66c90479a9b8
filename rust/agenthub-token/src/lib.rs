#![warn(missing_docs)]

//! Attenuable capability tokens for agent-to-agent delegation.
//!
//! A [`CapabilityToken`] is a self-certifying grant of scopes from one agent
//! to another. Its holder can hand a *narrower* version of it to a third
//! agent without contacting the issuer: every hop appends a signed block,
//! and no block may grant a scope its parent did not hold.
//!
//! # Overview
//!
//! ```text
//! authority  ──sig[0] = HMAC(root, authority)
//!   block 1  ──sig[1] = HMAC(HMAC(root, sig[0]), block 1)
//!   block 2  ──sig[2] = HMAC(HMAC(root, sig[1]), block 2)
//! ```
//!
//! Because each block's key is derived from the signature before it,
//! truncating, reordering or splicing blocks breaks the chain.
//!
//! # Example
//!
//! ```rust
//! use agenthub_token::{
//!     AttenuationRequest, SigningConfig, TokenEngine, TokenRequest, VerificationContext,
//! };
//!
//! # fn main() -> Result<(), agenthub_token::TokenError> {
//! let engine = TokenEngine::new(&SigningConfig::new("root-secret")?);
//!
//! let token = engine.issue(TokenRequest::new("agent-a", "agent-b", ["read", "write"]).ttl(60))?;
//! let narrowed = engine.attenuate(&token, AttenuationRequest::by("agent-b").scopes(["read"]))?;
//!
//! let verified = engine.verify(&narrowed, &VerificationContext::new().require_scope("read"))?;
//! assert!(verified.effective_scopes.contains("read"));
//! assert!(!verified.effective_scopes.contains("write"));
//! # Ok(())
//! # }
//! ```

pub mod block;
pub mod canonical;
pub mod caveat;
pub mod config;
pub mod engine;
pub mod error;
pub mod scope;
pub mod signer;
pub mod time;
pub mod token;

pub use block::{AttenuationBlock, AuthorityBlock, Block, ThirdPartyBlock};
pub use caveat::{Caveat, CaveatType};
pub use config::SigningConfig;
pub use engine::{AttenuationRequest, TokenEngine, TokenRequest, VerificationContext, VerifiedToken};
pub use error::TokenError;
pub use token::{CapabilityToken, MAX_BLOCKS, TOKEN_VERSION};
