//! HMAC-SHA256 signing with chained key derivation.
//!
//! The authority block, together with the token's id and version, is signed
//! with the root secret. Every later block is signed with a key derived from
//! the signature before it:
//!
//! ```text
//! sig[0] = HMAC(root, canonical({token_id, version, authority}))
//! sig[i] = HMAC(HMAC(root, sig[i-1]), canonical(block[i-1]))
//! ```
//!
//! Moving a block to another position, or grafting it from another token,
//! changes the key it must have been signed with, so the chain stops
//! verifying.

use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;

use crate::{TokenError, canonical::canonicalize, config::SigningConfig};

type HmacSha256 = Hmac<Sha256>;

/// Key material for a single block signature.
#[derive(Clone)]
pub struct SigningKey(Vec<u8>);

impl SigningKey {
    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SigningKey(<redacted>)")
    }
}

/// Signs and verifies token blocks under a shared root secret.
#[derive(Debug, Clone)]
pub struct Signer {
    root: SigningKey,
}

impl Signer {
    /// Create a signer from the process configuration.
    pub fn new(config: &SigningConfig) -> Self {
        Self {
            root: SigningKey(config.root_secret().as_bytes().to_vec()),
        }
    }

    /// The key that signs the authority block.
    pub fn root_key(&self) -> &SigningKey {
        &self.root
    }

    /// Derive the key for the block following `parent_signature`.
    pub fn derive_child_key(&self, parent_signature: &str) -> SigningKey {
        SigningKey(hmac(self.root.as_bytes(), parent_signature.as_bytes()))
    }

    /// Sign the canonical form of `value` with `key`.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Malformed`] if `value` cannot be canonicalized.
    pub fn sign_value<T: Serialize + ?Sized>(
        &self,
        value: &T,
        key: &SigningKey,
    ) -> Result<String, TokenError> {
        Ok(sign(&canonicalize(value)?, key))
    }

    /// Check that `signature` covers the canonical form of `value`.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Malformed`] if `value` cannot be canonicalized.
    pub fn verify_value<T: Serialize + ?Sized>(
        &self,
        value: &T,
        key: &SigningKey,
        signature: &str,
    ) -> Result<bool, TokenError> {
        Ok(verify(&canonicalize(value)?, key, signature))
    }
}

/// HMAC-SHA256 of `bytes`, hex encoded.
pub fn sign(bytes: &[u8], key: &SigningKey) -> String {
    hex::encode(hmac(key.as_bytes(), bytes))
}

/// Constant-time check of a hex signature over `bytes`.
///
/// A signature that is not valid lower- or upper-case hex never verifies.
pub fn verify(bytes: &[u8], key: &SigningKey, signature: &str) -> bool {
    let Ok(expected) = hex::decode(signature) else {
        return false;
    };
    let mut mac = new_mac(key.as_bytes());
    mac.update(bytes);
    mac.verify_slice(&expected).is_ok()
}

fn new_mac(key: &[u8]) -> HmacSha256 {
    HmacSha256::new_from_slice(key).expect("HMAC-SHA256 accepts keys of any size")
}

fn hmac(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = new_mac(key);
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}
