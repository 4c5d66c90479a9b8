//! Process-wide signing configuration.
//!
//! The root secret is read once when the process starts and handed to the
//! [`TokenEngine`](crate::TokenEngine) by reference. Rotating it requires a
//! restart; nothing in this crate re-reads the environment afterwards.

use std::fmt;

use crate::TokenError;

/// Environment variable holding the shared root signing secret.
pub const SIGNING_SECRET_ENV: &str = "AGENTHUB_SIGNING_SECRET";

/// Environment variable overriding the default token lifetime, in seconds.
pub const TOKEN_TTL_ENV: &str = "AGENTHUB_TOKEN_TTL_SECONDS";

/// Default token lifetime: 1 hour.
pub const DEFAULT_TTL_SECONDS: u64 = 3600;

/// The shared symmetric secret every token is ultimately signed with.
///
/// Any holder of this secret can mint tokens naming any issuer.
#[derive(Clone, PartialEq, Eq)]
pub struct RootSecret(Vec<u8>);

impl RootSecret {
    /// Wrap raw secret bytes, rejecting an empty secret.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::MissingSigningSecret`] if `secret` is empty.
    pub fn new(secret: impl Into<Vec<u8>>) -> Result<Self, TokenError> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(TokenError::MissingSigningSecret);
        }
        Ok(Self(secret))
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for RootSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RootSecret(<redacted>)")
    }
}

/// Configuration for the token engine.
#[derive(Debug, Clone)]
pub struct SigningConfig {
    root_secret: RootSecret,
    default_ttl_seconds: u64,
}

impl SigningConfig {
    /// Create a configuration from an explicit secret with the default TTL.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::MissingSigningSecret`] if `secret` is empty.
    pub fn new(secret: impl Into<Vec<u8>>) -> Result<Self, TokenError> {
        Ok(Self {
            root_secret: RootSecret::new(secret)?,
            default_ttl_seconds: DEFAULT_TTL_SECONDS,
        })
    }

    /// Load the configuration from the process environment.
    ///
    /// Intended to be called once at startup. A missing or empty
    /// [`SIGNING_SECRET_ENV`] is fatal; there is no insecure fallback.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::MissingSigningSecret`] when the secret is absent
    /// and [`TokenError::InvalidConfiguration`] when [`TOKEN_TTL_ENV`] is set
    /// but is not a positive integer.
    pub fn from_env() -> Result<Self, TokenError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from `lookup`, which maps a variable name to
    /// its value. [`Self::from_env`] reads the process environment through
    /// this.
    ///
    /// # Errors
    ///
    /// See [`Self::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, TokenError> {
        let secret = lookup(SIGNING_SECRET_ENV).unwrap_or_default();
        let config = Self::new(secret)?;

        match lookup(TOKEN_TTL_ENV) {
            Some(raw) => {
                let ttl = raw.trim().parse::<u64>().map_err(|e| {
                    TokenError::InvalidConfiguration(format!("{TOKEN_TTL_ENV}: {e}"))
                })?;
                config.with_default_ttl(ttl)
            }
            None => Ok(config),
        }
    }

    /// Override the lifetime applied when a request does not name one.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::InvalidConfiguration`] for a zero TTL.
    pub fn with_default_ttl(mut self, ttl_seconds: u64) -> Result<Self, TokenError> {
        if ttl_seconds == 0 {
            return Err(TokenError::InvalidConfiguration(
                "default TTL must be greater than zero".to_string(),
            ));
        }
        self.default_ttl_seconds = ttl_seconds;
        Ok(self)
    }

    /// The root signing secret.
    pub fn root_secret(&self) -> &RootSecret {
        &self.root_secret
    }

    /// Lifetime applied to tokens issued without an explicit TTL.
    pub fn default_ttl_seconds(&self) -> u64 {
        self.default_ttl_seconds
    }
}
