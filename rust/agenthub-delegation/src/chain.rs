//! Stored delegation chains and their attenuation check.

use std::fmt;

use agenthub_token::scope;
use serde::{Deserialize, Serialize};

/// One delegation in a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationHop {
    /// Token that carried this delegation
    pub token_id: String,
    /// Scopes delegated at this hop
    pub delegated_scopes: Vec<String>,
}

impl DelegationHop {
    /// A hop delegating `scopes` through `token_id`.
    pub fn new<I, S>(token_id: impl Into<String>, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            token_id: token_id.into(),
            delegated_scopes: scopes.into_iter().map(Into::into).collect(),
        }
    }
}

/// An ordered list of hops as returned by a chain store. Hop 0 is the root
/// delegation.
///
/// Serialized as `{"chain": [hop, ...]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationChain {
    /// Hops from the root delegation outwards
    pub chain: Vec<DelegationHop>,
}

impl DelegationChain {
    /// Wrap an ordered list of hops.
    pub fn new(chain: Vec<DelegationHop>) -> Self {
        Self { chain }
    }

    /// The hops, root first.
    pub fn hops(&self) -> &[DelegationHop] {
        &self.chain
    }

    /// Number of hops.
    pub fn len(&self) -> usize {
        self.chain.len()
    }

    /// Returns `true` if the chain has no hops.
    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    /// See [`verify_scope_attenuation`].
    pub fn verify_attenuation(&self) -> Option<ScopeViolation> {
        verify_scope_attenuation(&self.chain)
    }
}

impl From<Vec<DelegationHop>> for DelegationChain {
    fn from(chain: Vec<DelegationHop>) -> Self {
        Self::new(chain)
    }
}

/// The first hop that delegated more than its parent held.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeViolation {
    /// Position of the offending hop
    pub hop_index: usize,
    /// Token of the hop before it
    pub parent_token_id: String,
    /// Token of the offending hop
    pub child_token_id: String,
    /// Scopes the child gained, sorted
    pub excess_scopes: Vec<String>,
}

impl fmt::Display for ScopeViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hop {} ({}) delegates {} beyond parent {}",
            self.hop_index,
            self.child_token_id,
            self.excess_scopes.join(", "),
            self.parent_token_id
        )
    }
}

/// Find the first hop whose scopes are not a subset of its parent's.
///
/// A parent holding `"*"` admits any child. Chains with fewer than two hops
/// always pass.
pub fn verify_scope_attenuation(chain: &[DelegationHop]) -> Option<ScopeViolation> {
    chain.windows(2).enumerate().find_map(|(i, pair)| {
        let [parent, child] = pair else {
            return None;
        };
        let excess = scope::excess(&child.delegated_scopes, &parent.delegated_scopes);
        (!excess.is_empty()).then(|| ScopeViolation {
            hop_index: i + 1,
            parent_token_id: parent.token_id.clone(),
            child_token_id: child.token_id.clone(),
            excess_scopes: excess,
        })
    })
}
