//! The capability token value type and its wire forms.

use std::collections::BTreeSet;

use base64::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    TokenError,
    block::{AuthorityBlock, Block, ThirdPartyBlock},
    caveat::Caveat,
};

/// Current token format version.
pub const TOKEN_VERSION: u32 = 1;

/// Upper bound on the number of blocks, counting the authority block.
///
/// A token can carry at most `MAX_BLOCKS - 1` appended blocks.
pub const MAX_BLOCKS: usize = 10;

/// A self-certifying authorization token.
///
/// Tokens are immutable values. [`TokenEngine::attenuate`] and
/// [`TokenEngine::add_third_party_block`] return new tokens and leave the
/// one they were given untouched, so a parent token can be shared freely.
///
/// [`TokenEngine::attenuate`]: crate::TokenEngine::attenuate
/// [`TokenEngine::add_third_party_block`]: crate::TokenEngine::add_third_party_block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityToken {
    pub(crate) token_id: String,
    pub(crate) version: u32,
    pub(crate) authority: AuthorityBlock,
    pub(crate) blocks: Vec<Block>,
    pub(crate) signatures: Vec<String>,
}

impl CapabilityToken {
    /// Unique id assigned at issuance.
    pub fn token_id(&self) -> &str {
        &self.token_id
    }

    /// Format version.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// The root grant.
    pub fn authority(&self) -> &AuthorityBlock {
        &self.authority
    }

    /// Blocks appended after the authority block, in order.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Hex signatures; index 0 covers the authority block.
    pub fn signatures(&self) -> &[String] {
        &self.signatures
    }

    /// The agent that issued the token.
    pub fn issuer(&self) -> &str {
        &self.authority.issuer_agent_id
    }

    /// The agent the token was issued to.
    pub fn subject(&self) -> &str {
        &self.authority.subject_agent_id
    }

    /// Scopes of the most recent attenuation block, or the authority's scopes
    /// when the token has not been narrowed.
    ///
    /// This reads the token as-is; only [`TokenEngine::verify`] establishes
    /// that the scopes can be trusted.
    ///
    /// [`TokenEngine::verify`]: crate::TokenEngine::verify
    pub fn effective_scopes(&self) -> &BTreeSet<String> {
        self.blocks
            .iter()
            .rev()
            .find_map(Block::scopes)
            .unwrap_or(&self.authority.scopes)
    }

    /// Every caveat in force: the authority's and each attenuation block's.
    pub fn caveats(&self) -> impl Iterator<Item = &Caveat> {
        self.authority
            .caveats
            .iter()
            .chain(self.blocks.iter().flat_map(Block::caveats))
    }

    /// The earliest expiry among the token's time caveats.
    pub fn not_after(&self) -> Option<u64> {
        self.caveats()
            .filter_map(|caveat| match caveat {
                Caveat::Time { not_after } => Some(*not_after),
                _ => None,
            })
            .min()
    }

    /// Third-party attestations, in the order they were appended.
    pub fn attestations(&self) -> impl Iterator<Item = &ThirdPartyBlock> {
        self.blocks.iter().filter_map(|block| match block {
            Block::ThirdParty(block) => Some(block),
            Block::Attenuation(_) => None,
        })
    }

    /// Serialize to the JSON wire shape.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Malformed`] if serialization fails.
    pub fn to_json(&self) -> Result<String, TokenError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse the JSON wire shape.
    ///
    /// Parsing does not verify anything beyond structure.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Malformed`] if `json` is not a token.
    pub fn from_json(json: &str) -> Result<Self, TokenError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Compact transport form: URL-safe, unpadded base64 of the JSON.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Malformed`] if serialization fails.
    pub fn encode(&self) -> Result<String, TokenError> {
        Ok(BASE64_URL_SAFE_NO_PAD.encode(serde_json::to_vec(self)?))
    }

    /// Decode the compact transport form produced by [`Self::encode`].
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Malformed`] if `encoded` is not valid base64 or
    /// does not hold a token.
    pub fn decode(encoded: &str) -> Result<Self, TokenError> {
        let bytes = BASE64_URL_SAFE_NO_PAD
            .decode(encoded.trim())
            .map_err(|e| TokenError::Malformed(format!("invalid base64: {e}")))?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}
