//! Error types for capability token operations.

use crate::caveat::CaveatType;

/// Errors produced while issuing, attenuating or verifying capability tokens.
///
/// Cryptographic failures ([`TokenError::InvalidSignature`],
/// [`TokenError::Malformed`]) mean the token must not be trusted at all.
/// Policy failures ([`TokenError::ScopeEscalation`],
/// [`TokenError::MissingScope`], [`TokenError::MaxBlocksExceeded`],
/// [`TokenError::CaveatViolation`]) carry enough detail for the caller to
/// retry with a narrower request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    /// A signature did not match the content it covers.
    ///
    /// The payload names the failing position, e.g. `"authority"` or
    /// `"block 2"`.
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    /// The token's time caveat has passed.
    #[error("Token expired at {not_after}")]
    Expired {
        /// The UNIX time after which the token is no longer valid
        not_after: u64,
    },

    /// An attenuation asked for scopes its parent never held.
    #[error("Scope escalation: {excess:?} not granted by parent")]
    ScopeEscalation {
        /// The offending scopes, sorted
        excess: Vec<String>,
    },

    /// A contextual caveat rejected the request.
    #[error("Caveat violation ({caveat_type}): {reason}")]
    CaveatViolation {
        /// Which kind of caveat failed
        caveat_type: CaveatType,
        /// Why it failed
        reason: String,
    },

    /// The effective scopes do not cover the required scope.
    #[error("Missing required scope: {required}")]
    MissingScope {
        /// The scope that was required
        required: String,
    },

    /// Appending another block would exceed the block cap.
    #[error("Token already carries the maximum of {max} blocks")]
    MaxBlocksExceeded {
        /// The largest number of appended blocks a token may hold
        max: usize,
    },

    /// A caveat carried a tag this implementation does not know.
    #[error("Unknown caveat type: {0}")]
    UnknownCaveatType(String),

    /// The root signing secret is absent or empty.
    #[error("Signing secret is not configured")]
    MissingSigningSecret,

    /// Some other configuration value could not be used.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The token could not be decoded or is structurally unsound.
    #[error("Malformed token: {0}")]
    Malformed(String),
}

impl TokenError {
    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            TokenError::InvalidSignature(_) => "token.invalid_signature",
            TokenError::Expired { .. } => "token.expired",
            TokenError::ScopeEscalation { .. } => "token.scope_escalation",
            TokenError::CaveatViolation { .. } => "token.caveat_violation",
            TokenError::MissingScope { .. } => "token.missing_scope",
            TokenError::MaxBlocksExceeded { .. } => "token.max_blocks_exceeded",
            TokenError::UnknownCaveatType(_) => "token.unknown_caveat_type",
            TokenError::MissingSigningSecret => "config.missing_signing_secret",
            TokenError::InvalidConfiguration(_) => "config.invalid",
            TokenError::Malformed(_) => "token.malformed",
        }
    }

    /// Returns `true` for errors that reflect a broken deployment rather
    /// than a bad token.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            TokenError::MissingSigningSecret | TokenError::InvalidConfiguration(_)
        )
    }
}

impl From<serde_json::Error> for TokenError {
    fn from(err: serde_json::Error) -> Self {
        TokenError::Malformed(err.to_string())
    }
}
