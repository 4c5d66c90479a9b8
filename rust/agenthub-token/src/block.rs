//! The signed blocks a capability token is made of.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::caveat::Caveat;

/// Block 0: the root grant made by the issuer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorityBlock {
    pub(crate) issuer_agent_id: String,
    pub(crate) subject_agent_id: String,
    pub(crate) scopes: BTreeSet<String>,
    pub(crate) caveats: Vec<Caveat>,
    #[serde(default)]
    pub(crate) facts: BTreeMap<String, Value>,
    pub(crate) issued_at: u64,
}

impl AuthorityBlock {
    /// The agent that issued the token.
    pub fn issuer_agent_id(&self) -> &str {
        &self.issuer_agent_id
    }

    /// The agent the token was issued to.
    pub fn subject_agent_id(&self) -> &str {
        &self.subject_agent_id
    }

    /// The scopes granted at the root.
    pub fn scopes(&self) -> &BTreeSet<String> {
        &self.scopes
    }

    /// Root caveats, including the implicit expiry.
    pub fn caveats(&self) -> &[Caveat] {
        &self.caveats
    }

    /// Free-form facts recorded at issuance.
    pub fn facts(&self) -> &BTreeMap<String, Value> {
        &self.facts
    }

    /// UNIX second the token was issued at.
    pub fn issued_at(&self) -> u64 {
        self.issued_at
    }
}

/// A narrowing of the scopes granted by the block before it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttenuationBlock {
    pub(crate) block_index: usize,
    pub(crate) attenuator_agent_id: String,
    pub(crate) scopes: BTreeSet<String>,
    pub(crate) caveats: Vec<Caveat>,
    pub(crate) attenuated_at: u64,
}

impl AttenuationBlock {
    /// Position of this block, counting the authority block as 0.
    pub fn block_index(&self) -> usize {
        self.block_index
    }

    /// The agent that narrowed the token.
    pub fn attenuator_agent_id(&self) -> &str {
        &self.attenuator_agent_id
    }

    /// Scopes in effect from this block on.
    pub fn scopes(&self) -> &BTreeSet<String> {
        &self.scopes
    }

    /// Caveats added by this block.
    pub fn caveats(&self) -> &[Caveat] {
        &self.caveats
    }

    /// UNIX second the block was appended at.
    pub fn attenuated_at(&self) -> u64 {
        self.attenuated_at
    }
}

/// An externally attested fact, e.g. the outcome of a compliance check.
///
/// Third-party blocks sit inside the signature chain but never contribute
/// scopes or caveats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThirdPartyBlock {
    pub(crate) block_index: usize,
    pub(crate) verifier_id: String,
    pub(crate) verification_data: BTreeMap<String, Value>,
    pub(crate) verified_at: u64,
    #[serde(default)]
    pub(crate) scopes: BTreeSet<String>,
    #[serde(default)]
    pub(crate) caveats: Vec<Caveat>,
}

impl ThirdPartyBlock {
    /// Position of this block, counting the authority block as 0.
    pub fn block_index(&self) -> usize {
        self.block_index
    }

    /// The party that attested the fact.
    pub fn verifier_id(&self) -> &str {
        &self.verifier_id
    }

    /// The attested data.
    pub fn verification_data(&self) -> &BTreeMap<String, Value> {
        &self.verification_data
    }

    /// UNIX second the attestation was appended at.
    pub fn verified_at(&self) -> u64 {
        self.verified_at
    }
}

/// Any block appended after the authority block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    /// See [`AttenuationBlock`]
    Attenuation(AttenuationBlock),
    /// See [`ThirdPartyBlock`]
    ThirdParty(ThirdPartyBlock),
}

impl Block {
    /// Position of this block, counting the authority block as 0.
    pub fn block_index(&self) -> usize {
        match self {
            Block::Attenuation(block) => block.block_index,
            Block::ThirdParty(block) => block.block_index,
        }
    }

    /// Scopes this block narrows to, or `None` for third-party blocks.
    pub fn scopes(&self) -> Option<&BTreeSet<String>> {
        match self {
            Block::Attenuation(block) => Some(&block.scopes),
            Block::ThirdParty(_) => None,
        }
    }

    /// Caveats this block contributes; always empty for third-party blocks.
    pub fn caveats(&self) -> &[Caveat] {
        match self {
            Block::Attenuation(block) => &block.caveats,
            Block::ThirdParty(_) => &[],
        }
    }

    /// Returns `true` for third-party attestations.
    pub fn is_third_party(&self) -> bool {
        matches!(self, Block::ThirdParty(_))
    }
}
