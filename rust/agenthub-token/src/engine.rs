//! Issuing, attenuating and verifying capability tokens.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};
use ulid::Ulid;

use crate::{
    TokenError,
    block::{AttenuationBlock, AuthorityBlock, Block, ThirdPartyBlock},
    caveat::{Caveat, CaveatContext},
    config::SigningConfig,
    scope,
    signer::Signer,
    time,
    token::{CapabilityToken, MAX_BLOCKS, TOKEN_VERSION},
};

/// Parameters for [`TokenEngine::issue`].
#[derive(Debug, Clone)]
pub struct TokenRequest {
    issuer: String,
    subject: String,
    scopes: BTreeSet<String>,
    caveats: Vec<Caveat>,
    ttl_seconds: Option<u64>,
    facts: BTreeMap<String, Value>,
}

impl TokenRequest {
    /// Grant `scopes` from `issuer` to `subject`.
    pub fn new<I, S>(issuer: impl Into<String>, subject: impl Into<String>, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            issuer: issuer.into(),
            subject: subject.into(),
            scopes: scopes.into_iter().map(Into::into).collect(),
            caveats: Vec::new(),
            ttl_seconds: None,
            facts: BTreeMap::new(),
        }
    }

    /// Attach a caveat to the authority block.
    pub fn caveat(mut self, caveat: Caveat) -> Self {
        self.caveats.push(caveat);
        self
    }

    /// Lifetime in seconds; defaults to the configured TTL.
    pub fn ttl(mut self, ttl_seconds: u64) -> Self {
        self.ttl_seconds = Some(ttl_seconds);
        self
    }

    /// Record a fact in the authority block.
    pub fn fact(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.facts.insert(key.into(), value.into());
        self
    }
}

/// Parameters for [`TokenEngine::attenuate`].
#[derive(Debug, Clone)]
pub struct AttenuationRequest {
    attenuator: String,
    scopes: Option<BTreeSet<String>>,
    caveats: Vec<Caveat>,
}

impl AttenuationRequest {
    /// An attenuation performed by `attenuator`.
    ///
    /// Without [`Self::scopes`] the parent's scopes carry forward unchanged.
    pub fn by(attenuator: impl Into<String>) -> Self {
        Self {
            attenuator: attenuator.into(),
            scopes: None,
            caveats: Vec::new(),
        }
    }

    /// Replace the working scope set.
    pub fn scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = Some(scopes.into_iter().map(Into::into).collect());
        self
    }

    /// Add a caveat to the new block.
    pub fn caveat(mut self, caveat: Caveat) -> Self {
        self.caveats.push(caveat);
        self
    }
}

/// Request facts a token is verified against.
#[derive(Debug, Clone, Default)]
pub struct VerificationContext {
    required_scope: Option<String>,
    source_ip: Option<String>,
    resource: Option<String>,
}

impl VerificationContext {
    /// Nothing beyond the token itself.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail unless the effective scopes grant `scope`.
    pub fn require_scope(mut self, scope: impl Into<String>) -> Self {
        self.required_scope = Some(scope.into());
        self
    }

    /// Address the request came from, checked against IP caveats.
    pub fn source_ip(mut self, ip: impl Into<String>) -> Self {
        self.source_ip = Some(ip.into());
        self
    }

    /// Resource the request targets, checked against resource caveats.
    pub fn resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }
}

/// Result of a successful verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifiedToken {
    /// Id of the verified token
    pub token_id: String,
    /// Issuing agent
    pub issuer: String,
    /// Subject agent
    pub subject: String,
    /// Scopes the token currently grants
    pub effective_scopes: BTreeSet<String>,
    /// Number of blocks, counting the authority block
    pub block_count: usize,
    /// Number of caveats that were evaluated
    pub caveat_count: usize,
}

/// Issues and judges capability tokens under one root secret.
#[derive(Debug, Clone)]
pub struct TokenEngine {
    signer: Signer,
    default_ttl_seconds: u64,
}

impl TokenEngine {
    /// Create an engine from the process configuration.
    pub fn new(config: &SigningConfig) -> Self {
        Self {
            signer: Signer::new(config),
            default_ttl_seconds: config.default_ttl_seconds(),
        }
    }

    /// Issue a new single-block token.
    ///
    /// An implicit [`Caveat::Time`] bounding the token to `now + ttl` is
    /// appended after the caveats in `request`.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Malformed`] if a fact cannot be canonicalized.
    pub fn issue(&self, request: TokenRequest) -> Result<CapabilityToken, TokenError> {
        self.issue_at(request, time::now())
    }

    /// [`Self::issue`] with an explicit clock reading.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Malformed`] if a fact cannot be canonicalized.
    pub fn issue_at(&self, request: TokenRequest, now: u64) -> Result<CapabilityToken, TokenError> {
        let ttl = request.ttl_seconds.unwrap_or(self.default_ttl_seconds);
        let mut caveats = request.caveats;
        caveats.push(Caveat::time(now.saturating_add(ttl)));

        let authority = AuthorityBlock {
            issuer_agent_id: request.issuer,
            subject_agent_id: request.subject,
            scopes: request.scopes,
            caveats,
            facts: request.facts,
            issued_at: now,
        };
        let token_id = Ulid::new().to_string();
        let signature = self.signer.sign_value(
            &AuthorityEnvelope {
                token_id: &token_id,
                version: TOKEN_VERSION,
                authority: &authority,
            },
            self.signer.root_key(),
        )?;

        let token = CapabilityToken {
            token_id,
            version: TOKEN_VERSION,
            authority,
            blocks: Vec::new(),
            signatures: vec![signature],
        };

        debug!(
            token_id = %token.token_id,
            issuer = %token.issuer(),
            subject = %token.subject(),
            ttl,
            "Issued capability token"
        );
        Ok(token)
    }

    /// Derive a token whose authority is a subset of `token`'s.
    ///
    /// # Errors
    ///
    /// - [`TokenError::ScopeEscalation`] if the requested scopes exceed the
    ///   parent's and the parent lacks the wildcard
    /// - [`TokenError::MaxBlocksExceeded`] if `token` is already full
    pub fn attenuate(
        &self,
        token: &CapabilityToken,
        request: AttenuationRequest,
    ) -> Result<CapabilityToken, TokenError> {
        let parent = token.effective_scopes();
        let scopes = request.scopes.unwrap_or_else(|| parent.clone());

        let excess = scope::excess(&scopes, parent);
        if !excess.is_empty() {
            warn!(
                token_id = %token.token_id,
                attenuator = %request.attenuator,
                ?excess,
                "Rejected scope escalation"
            );
            return Err(TokenError::ScopeEscalation { excess });
        }

        let block = Block::Attenuation(AttenuationBlock {
            block_index: token.blocks.len() + 1,
            attenuator_agent_id: request.attenuator,
            scopes,
            caveats: request.caveats,
            attenuated_at: time::now(),
        });
        self.append(token, block)
    }

    /// Attest an external fact inside `token`'s signature chain.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::MaxBlocksExceeded`] if `token` is already full.
    pub fn add_third_party_block(
        &self,
        token: &CapabilityToken,
        verifier_id: impl Into<String>,
        verification_data: BTreeMap<String, Value>,
    ) -> Result<CapabilityToken, TokenError> {
        let block = Block::ThirdParty(ThirdPartyBlock {
            block_index: token.blocks.len() + 1,
            verifier_id: verifier_id.into(),
            verification_data,
            verified_at: time::now(),
            scopes: BTreeSet::new(),
            caveats: Vec::new(),
        });
        self.append(token, block)
    }

    /// Verify `token` against the current time.
    ///
    /// # Errors
    ///
    /// See [`Self::verify_at`].
    pub fn verify(
        &self,
        token: &CapabilityToken,
        context: &VerificationContext,
    ) -> Result<VerifiedToken, TokenError> {
        self.verify_at(token, context, time::now())
    }

    /// Verify `token` as of `now`.
    ///
    /// Checks, in order: the signature chain, the structural invariants
    /// (block cap, block positions, scope narrowing), every caveat, and
    /// finally the required scope.
    ///
    /// # Errors
    ///
    /// - [`TokenError::Malformed`] for an unsupported version or misnumbered
    ///   blocks
    /// - [`TokenError::InvalidSignature`] if any signature fails to chain
    /// - [`TokenError::MaxBlocksExceeded`] or [`TokenError::ScopeEscalation`]
    ///   if a correctly signed token breaks a structural invariant
    /// - [`TokenError::Expired`] or [`TokenError::CaveatViolation`] if a
    ///   caveat rejects the request
    /// - [`TokenError::MissingScope`] if the required scope is not granted
    pub fn verify_at(
        &self,
        token: &CapabilityToken,
        context: &VerificationContext,
        now: u64,
    ) -> Result<VerifiedToken, TokenError> {
        self.judge(token, context, now).inspect_err(|err| {
            warn!(
                token_id = %token.token_id,
                code = err.code(),
                "Capability token rejected: {err}"
            );
        })
    }

    fn judge(
        &self,
        token: &CapabilityToken,
        context: &VerificationContext,
        now: u64,
    ) -> Result<VerifiedToken, TokenError> {
        if token.version != TOKEN_VERSION {
            return Err(TokenError::Malformed(format!(
                "unsupported version {}",
                token.version
            )));
        }
        self.check_signatures(token)?;
        check_structure(token)?;

        let request = CaveatContext {
            now,
            source_ip: context.source_ip.as_deref(),
            resource: context.resource.as_deref(),
            subject: token.subject(),
        };
        let mut caveat_count = 0;
        for caveat in token.caveats() {
            caveat.check(&request)?;
            caveat_count += 1;
        }

        let effective_scopes = token.effective_scopes();
        if let Some(required) = &context.required_scope {
            if !scope::grants(effective_scopes, required) {
                return Err(TokenError::MissingScope {
                    required: required.clone(),
                });
            }
        }

        Ok(VerifiedToken {
            token_id: token.token_id.clone(),
            issuer: token.issuer().to_string(),
            subject: token.subject().to_string(),
            effective_scopes: effective_scopes.clone(),
            block_count: token.blocks.len() + 1,
            caveat_count,
        })
    }

    fn check_signatures(&self, token: &CapabilityToken) -> Result<(), TokenError> {
        if token.signatures.len() != token.blocks.len() + 1 {
            return Err(TokenError::InvalidSignature("signature count".to_string()));
        }

        if !self.signer.verify_value(
            &AuthorityEnvelope::of(token),
            self.signer.root_key(),
            &token.signatures[0],
        )? {
            return Err(TokenError::InvalidSignature("authority".to_string()));
        }

        for (i, block) in token.blocks.iter().enumerate() {
            let key = self.signer.derive_child_key(&token.signatures[i]);
            if !self
                .signer
                .verify_value(block, &key, &token.signatures[i + 1])?
            {
                return Err(TokenError::InvalidSignature(format!("block {}", i + 1)));
            }
        }
        Ok(())
    }

    fn append(&self, token: &CapabilityToken, block: Block) -> Result<CapabilityToken, TokenError> {
        if token.blocks.len() >= MAX_BLOCKS - 1 {
            return Err(TokenError::MaxBlocksExceeded {
                max: MAX_BLOCKS - 1,
            });
        }
        if token.signatures.len() != token.blocks.len() + 1 {
            return Err(TokenError::Malformed(
                "signature count does not match block count".to_string(),
            ));
        }
        let parent_signature = token
            .signatures
            .last()
            .ok_or_else(|| TokenError::Malformed("token has no signatures".to_string()))?;

        let key = self.signer.derive_child_key(parent_signature);
        let signature = self.signer.sign_value(&block, &key)?;

        let mut blocks = token.blocks.clone();
        blocks.push(block);
        let mut signatures = token.signatures.clone();
        signatures.push(signature);

        debug!(
            token_id = %token.token_id,
            block_count = blocks.len() + 1,
            "Appended block to capability token"
        );
        Ok(CapabilityToken {
            token_id: token.token_id.clone(),
            version: token.version,
            authority: token.authority.clone(),
            blocks,
            signatures,
        })
    }
}

/// The content covered by signature 0: the authority block plus the
/// token's id and version.
#[derive(Serialize)]
struct AuthorityEnvelope<'a> {
    token_id: &'a str,
    version: u32,
    authority: &'a AuthorityBlock,
}

impl<'a> AuthorityEnvelope<'a> {
    fn of(token: &'a CapabilityToken) -> Self {
        Self {
            token_id: &token.token_id,
            version: token.version,
            authority: &token.authority,
        }
    }
}

fn check_structure(token: &CapabilityToken) -> Result<(), TokenError> {
    if token.blocks.len() > MAX_BLOCKS - 1 {
        return Err(TokenError::MaxBlocksExceeded {
            max: MAX_BLOCKS - 1,
        });
    }

    let mut parent = &token.authority.scopes;
    for (i, block) in token.blocks.iter().enumerate() {
        if block.block_index() != i + 1 {
            return Err(TokenError::Malformed(format!(
                "block {} claims index {}",
                i + 1,
                block.block_index()
            )));
        }
        if let Some(scopes) = block.scopes() {
            let excess = scope::excess(scopes, parent);
            if !excess.is_empty() {
                return Err(TokenError::ScopeEscalation { excess });
            }
            parent = scopes;
        }
    }
    Ok(())
}
