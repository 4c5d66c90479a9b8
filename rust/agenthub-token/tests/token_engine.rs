//! Integration tests for issuing, attenuating and verifying capability
//! tokens.

use std::collections::{BTreeMap, BTreeSet};

use agenthub_token::{
    AttenuationRequest, CapabilityToken, Caveat, CaveatType, MAX_BLOCKS, SigningConfig,
    TokenEngine, TokenError, TokenRequest, VerificationContext,
};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use testresult::TestResult;

fn engine() -> TokenEngine {
    TokenEngine::new(&SigningConfig::new("integration-secret").expect("valid secret"))
}

fn scopes(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|s| s.to_string()).collect()
}

/// Rewrite `token` through its JSON form.
fn edit(token: &CapabilityToken, f: impl FnOnce(&mut Value)) -> CapabilityToken {
    let mut value = serde_json::to_value(token).expect("token serializes");
    f(&mut value);
    serde_json::from_value(value).expect("edited token still parses")
}

/// Replace the first hex digit of a signature with a different one.
fn flip(signature: &mut Value) {
    let text = signature.as_str().expect("signature is a string").to_string();
    let first = if text.starts_with('0') { "1" } else { "0" };
    *signature = Value::String(format!("{first}{}", &text[1..]));
}

/// A token with two attenuation blocks: {read, write, delete} → {read, write} → {read}.
fn three_block_token(engine: &TokenEngine) -> Result<CapabilityToken, TokenError> {
    let token = engine.issue(TokenRequest::new(
        "agent-a",
        "agent-b",
        ["read", "write", "delete"],
    ))?;
    let token = engine.attenuate(
        &token,
        AttenuationRequest::by("agent-b").scopes(["read", "write"]),
    )?;
    engine.attenuate(&token, AttenuationRequest::by("agent-c").scopes(["read"]))
}

// =============================================================================
// Issuance and verification
// =============================================================================

#[test]
fn it_verifies_a_freshly_issued_token() -> TestResult {
    let engine = engine();
    let token = engine.issue(TokenRequest::new("agent-a", "agent-b", ["read", "write"]).ttl(60))?;

    let verified = engine.verify(&token, &VerificationContext::new())?;

    assert_eq!(verified.token_id, token.token_id());
    assert_eq!(verified.issuer, "agent-a");
    assert_eq!(verified.subject, "agent-b");
    assert_eq!(verified.effective_scopes, scopes(&["read", "write"]));
    assert_eq!(verified.block_count, 1);
    assert_eq!(verified.caveat_count, 1);
    Ok(())
}

#[test]
fn it_assigns_unique_token_ids() -> TestResult {
    let engine = engine();
    let first = engine.issue(TokenRequest::new("agent-a", "agent-b", ["read"]))?;
    let second = engine.issue(TokenRequest::new("agent-a", "agent-b", ["read"]))?;
    assert_ne!(first.token_id(), second.token_id());
    Ok(())
}

#[test]
fn it_rejects_tokens_signed_under_another_secret() -> TestResult {
    let token = engine().issue(TokenRequest::new("agent-a", "agent-b", ["read"]))?;
    let other = TokenEngine::new(&SigningConfig::new("some-other-secret")?);

    assert_eq!(
        other.verify(&token, &VerificationContext::new()),
        Err(TokenError::InvalidSignature("authority".to_string()))
    );
    Ok(())
}

#[test]
fn it_expires_after_the_ttl() -> TestResult {
    let engine = engine();
    let issued_at = 1_700_000_000;
    let token = engine.issue_at(
        TokenRequest::new("agent-a", "agent-b", ["read"]).ttl(1),
        issued_at,
    )?;

    assert!(
        engine
            .verify_at(&token, &VerificationContext::new(), issued_at + 1)
            .is_ok()
    );
    assert_eq!(
        engine.verify_at(&token, &VerificationContext::new(), issued_at + 2),
        Err(TokenError::Expired {
            not_after: issued_at + 1
        })
    );
    Ok(())
}

#[test]
fn it_requires_the_requested_scope() -> TestResult {
    let engine = engine();
    let token = engine.issue(TokenRequest::new("agent-a", "agent-b", ["read"]))?;

    assert!(
        engine
            .verify(&token, &VerificationContext::new().require_scope("read"))
            .is_ok()
    );
    assert_eq!(
        engine.verify(&token, &VerificationContext::new().require_scope("write")),
        Err(TokenError::MissingScope {
            required: "write".to_string()
        })
    );
    Ok(())
}

#[test]
fn it_grants_any_scope_through_the_wildcard() -> TestResult {
    let engine = engine();
    let token = engine.issue(TokenRequest::new("agent-a", "agent-b", ["*"]))?;
    engine.verify(&token, &VerificationContext::new().require_scope("runtime.execute"))?;
    Ok(())
}

// =============================================================================
// Caveats
// =============================================================================

#[test]
fn it_enforces_ip_caveats_only_when_an_ip_is_given() -> TestResult {
    let engine = engine();
    let token = engine.issue(
        TokenRequest::new("agent-a", "agent-b", ["read"]).caveat(Caveat::ip(["10.0.0.1"])),
    )?;

    engine.verify(&token, &VerificationContext::new())?;
    engine.verify(&token, &VerificationContext::new().source_ip("10.0.0.1"))?;

    let err = engine
        .verify(&token, &VerificationContext::new().source_ip("192.168.1.9"))
        .unwrap_err();
    assert!(matches!(
        err,
        TokenError::CaveatViolation {
            caveat_type: CaveatType::Ip,
            ..
        }
    ));
    Ok(())
}

#[test]
fn it_enforces_resource_caveats_added_by_attenuation() -> TestResult {
    let engine = engine();
    let token = engine.issue(TokenRequest::new("agent-a", "agent-b", ["read"]))?;
    let token = engine.attenuate(
        &token,
        AttenuationRequest::by("agent-b").caveat(Caveat::resource(["manifests/agent-b"])),
    )?;

    engine.verify(
        &token,
        &VerificationContext::new().resource("manifests/agent-b"),
    )?;
    let err = engine
        .verify(
            &token,
            &VerificationContext::new().resource("manifests/agent-z"),
        )
        .unwrap_err();
    assert_eq!(err.code(), "token.caveat_violation");
    Ok(())
}

#[test]
fn it_enforces_agent_caveats_against_the_subject() -> TestResult {
    let engine = engine();
    let allowed = engine.issue(
        TokenRequest::new("agent-a", "agent-b", ["read"]).caveat(Caveat::agent(["agent-b"])),
    )?;
    let denied = engine.issue(
        TokenRequest::new("agent-a", "agent-b", ["read"]).caveat(Caveat::agent(["agent-c"])),
    )?;

    engine.verify(&allowed, &VerificationContext::new())?;
    assert!(matches!(
        engine.verify(&denied, &VerificationContext::new()),
        Err(TokenError::CaveatViolation {
            caveat_type: CaveatType::Agent,
            ..
        })
    ));
    Ok(())
}

#[test]
fn it_honours_a_shorter_expiry_added_downstream() -> TestResult {
    let engine = engine();
    let issued_at = 1_700_000_000;
    let token = engine.issue_at(
        TokenRequest::new("agent-a", "agent-b", ["read"]).ttl(3600),
        issued_at,
    )?;
    let token = engine.attenuate(
        &token,
        AttenuationRequest::by("agent-b").caveat(Caveat::time(issued_at + 10)),
    )?;

    assert_eq!(token.not_after(), Some(issued_at + 10));
    assert_eq!(
        engine.verify_at(&token, &VerificationContext::new(), issued_at + 11),
        Err(TokenError::Expired {
            not_after: issued_at + 10
        })
    );
    Ok(())
}

// =============================================================================
// Attenuation
// =============================================================================

#[test]
fn it_narrows_scopes() -> TestResult {
    let engine = engine();
    let token = three_block_token(&engine)?;

    let verified = engine.verify(&token, &VerificationContext::new())?;
    assert_eq!(verified.effective_scopes, scopes(&["read"]));
    assert_eq!(verified.block_count, 3);
    Ok(())
}

#[test]
fn it_rejects_scope_escalation() -> TestResult {
    let engine = engine();
    let token = engine.issue(TokenRequest::new("agent-a", "agent-b", ["read"]))?;

    let err = engine
        .attenuate(
            &token,
            AttenuationRequest::by("agent-b").scopes(["read", "admin"]),
        )
        .unwrap_err();

    assert_eq!(
        err,
        TokenError::ScopeEscalation {
            excess: vec!["admin".to_string()]
        }
    );
    Ok(())
}

#[test]
fn it_checks_escalation_against_the_latest_block() -> TestResult {
    let engine = engine();
    let token = three_block_token(&engine)?;

    let err = engine
        .attenuate(&token, AttenuationRequest::by("agent-d").scopes(["write"]))
        .unwrap_err();
    assert_eq!(
        err,
        TokenError::ScopeEscalation {
            excess: vec!["write".to_string()]
        }
    );
    Ok(())
}

#[test]
fn it_lets_a_wildcard_parent_grant_anything() -> TestResult {
    let engine = engine();
    let token = engine.issue(TokenRequest::new("agent-a", "agent-b", ["*"]))?;
    let token = engine.attenuate(
        &token,
        AttenuationRequest::by("agent-b").scopes(["read", "admin"]),
    )?;

    assert_eq!(token.effective_scopes(), &scopes(&["admin", "read"]));
    engine.verify(&token, &VerificationContext::new().require_scope("admin"))?;
    Ok(())
}

#[test]
fn it_leaves_the_parent_token_untouched() -> TestResult {
    let engine = engine();
    let parent = engine.issue(TokenRequest::new("agent-a", "agent-b", ["read", "write"]))?;
    let snapshot = parent.clone();

    let child = engine.attenuate(&parent, AttenuationRequest::by("agent-b").scopes(["read"]))?;

    assert_eq!(parent, snapshot);
    assert_eq!(parent.blocks().len(), 0);
    assert_eq!(child.blocks().len(), 1);
    engine.verify(&parent, &VerificationContext::new().require_scope("write"))?;
    Ok(())
}

#[test]
fn it_caps_the_number_of_blocks() -> TestResult {
    let engine = engine();
    let mut token = engine.issue(TokenRequest::new("agent-a", "agent-b", ["read"]))?;

    for _ in 0..MAX_BLOCKS - 1 {
        token = engine.attenuate(&token, AttenuationRequest::by("agent-b"))?;
    }
    assert_eq!(token.blocks().len(), 9);
    engine.verify(&token, &VerificationContext::new())?;

    assert_eq!(
        engine.attenuate(&token, AttenuationRequest::by("agent-b")),
        Err(TokenError::MaxBlocksExceeded { max: 9 })
    );
    assert_eq!(
        engine.add_third_party_block(&token, "auditor", BTreeMap::new()),
        Err(TokenError::MaxBlocksExceeded { max: 9 })
    );
    Ok(())
}

// =============================================================================
// Third-party blocks
// =============================================================================

#[test]
fn it_attests_facts_without_changing_scopes() -> TestResult {
    let engine = engine();
    let token = engine.issue(TokenRequest::new("agent-a", "agent-b", ["read", "write"]))?;
    let token = engine.attenuate(&token, AttenuationRequest::by("agent-b").scopes(["read"]))?;

    let mut data = BTreeMap::new();
    data.insert("check".to_string(), json!("soc2"));
    data.insert("passed".to_string(), json!(true));
    let attested = engine.add_third_party_block(&token, "compliance-bot", data.clone())?;

    let verified = engine.verify(&attested, &VerificationContext::new())?;
    assert_eq!(verified.effective_scopes, scopes(&["read"]));
    assert_eq!(verified.block_count, 3);

    let attestations: Vec<_> = attested.attestations().collect();
    assert_eq!(attestations.len(), 1);
    assert_eq!(attestations[0].verifier_id(), "compliance-bot");
    assert_eq!(attestations[0].verification_data(), &data);
    Ok(())
}

#[test]
fn it_attenuates_from_the_block_before_an_attestation() -> TestResult {
    let engine = engine();
    let token = engine.issue(TokenRequest::new("agent-a", "agent-b", ["read", "write"]))?;
    let token = engine.attenuate(&token, AttenuationRequest::by("agent-b").scopes(["read"]))?;
    let token = engine.add_third_party_block(&token, "auditor", BTreeMap::new())?;

    let err = engine
        .attenuate(&token, AttenuationRequest::by("agent-c").scopes(["write"]))
        .unwrap_err();
    assert_eq!(
        err,
        TokenError::ScopeEscalation {
            excess: vec!["write".to_string()]
        }
    );
    Ok(())
}

// =============================================================================
// Tampering
// =============================================================================

#[test]
fn it_detects_a_tampered_authority_block() -> TestResult {
    let engine = engine();
    let token = three_block_token(&engine)?;

    let tampered = edit(&token, |value| {
        value["authority"]["scopes"] = json!(["admin", "delete", "read", "write"]);
    });

    assert_eq!(
        engine.verify(&tampered, &VerificationContext::new()),
        Err(TokenError::InvalidSignature("authority".to_string()))
    );
    Ok(())
}

#[test]
fn it_detects_a_tampered_attenuation_block() -> TestResult {
    let engine = engine();
    let token = three_block_token(&engine)?;

    let tampered = edit(&token, |value| {
        value["blocks"][1]["scopes"] = json!(["read", "write"]);
    });

    assert_eq!(
        engine.verify(&tampered, &VerificationContext::new()),
        Err(TokenError::InvalidSignature("block 2".to_string()))
    );
    Ok(())
}

#[test]
fn it_detects_a_stripped_caveat() -> TestResult {
    let engine = engine();
    let token = engine.issue(
        TokenRequest::new("agent-a", "agent-b", ["read"]).caveat(Caveat::ip(["10.0.0.1"])),
    )?;

    let tampered = edit(&token, |value| {
        value["authority"]["caveats"] = json!([]);
    });

    assert!(matches!(
        engine.verify(&tampered, &VerificationContext::new()),
        Err(TokenError::InvalidSignature(_))
    ));
    Ok(())
}

#[test]
fn it_detects_every_flipped_signature() -> TestResult {
    let engine = engine();
    let token = three_block_token(&engine)?;

    for i in 0..token.signatures().len() {
        let tampered = edit(&token, |value| flip(&mut value["signatures"][i]));
        assert!(
            matches!(
                engine.verify(&tampered, &VerificationContext::new()),
                Err(TokenError::InvalidSignature(_))
            ),
            "flipping signature {i} went unnoticed"
        );
    }
    Ok(())
}

#[test]
fn it_detects_a_relabelled_token_id() -> TestResult {
    let engine = engine();
    let token = three_block_token(&engine)?;
    let other = engine.issue(TokenRequest::new("agent-a", "agent-b", ["read"]))?;

    let relabelled = edit(&token, |value| {
        value["token_id"] = json!(other.token_id());
    });

    assert_eq!(
        engine.verify(&relabelled, &VerificationContext::new()),
        Err(TokenError::InvalidSignature("authority".to_string()))
    );
    Ok(())
}

#[test]
fn it_detects_truncation() -> TestResult {
    let engine = engine();
    let token = three_block_token(&engine)?;

    let truncated = edit(&token, |value| {
        value["blocks"].as_array_mut().expect("blocks").pop();
    });

    assert_eq!(
        engine.verify(&truncated, &VerificationContext::new()),
        Err(TokenError::InvalidSignature("signature count".to_string()))
    );
    Ok(())
}

#[test]
fn it_detects_reordered_blocks() -> TestResult {
    let engine = engine();
    let token = engine.issue(TokenRequest::new("agent-a", "agent-b", ["read", "write"]))?;
    let token = engine.attenuate(&token, AttenuationRequest::by("agent-b"))?;
    let token = engine.attenuate(&token, AttenuationRequest::by("agent-c"))?;

    let reordered = edit(&token, |value| {
        value["blocks"].as_array_mut().expect("blocks").swap(0, 1);
        value["signatures"].as_array_mut().expect("signatures").swap(1, 2);
    });

    assert!(matches!(
        engine.verify(&reordered, &VerificationContext::new()),
        Err(TokenError::InvalidSignature(_))
    ));
    Ok(())
}

#[test]
fn it_detects_blocks_grafted_from_another_token() -> TestResult {
    let engine = engine();
    let victim = engine.issue(TokenRequest::new("agent-a", "agent-b", ["read"]))?;
    let donor = engine.issue(TokenRequest::new("agent-a", "agent-x", ["*"]))?;
    let donor = engine.attenuate(&donor, AttenuationRequest::by("agent-x").scopes(["read"]))?;

    let grafted = edit(&victim, |value| {
        let donor = serde_json::to_value(&donor).expect("donor serializes");
        value["blocks"] = donor["blocks"].clone();
        value["signatures"]
            .as_array_mut()
            .expect("signatures")
            .push(donor["signatures"][1].clone());
    });

    assert_eq!(
        engine.verify(&grafted, &VerificationContext::new()),
        Err(TokenError::InvalidSignature("block 1".to_string()))
    );
    Ok(())
}

// =============================================================================
// Wire forms
// =============================================================================

#[test]
fn it_round_trips_through_the_header_form() -> TestResult {
    let engine = engine();
    let token = three_block_token(&engine)?;

    let encoded = token.encode()?;
    assert!(!encoded.contains('='));
    let decoded = CapabilityToken::decode(&encoded)?;

    assert_eq!(decoded, token);
    engine.verify(&decoded, &VerificationContext::new())?;
    Ok(())
}

#[test]
fn it_uses_the_documented_json_shape() -> TestResult {
    let engine = engine();
    let token = engine.issue_at(
        TokenRequest::new("agent-a", "agent-b", ["write", "read"])
            .ttl(60)
            .fact("tenant", "acme"),
        1_000,
    )?;

    let value: Value = serde_json::from_str(&token.to_json()?)?;
    assert_eq!(
        value["authority"],
        json!({
            "issuer_agent_id": "agent-a",
            "subject_agent_id": "agent-b",
            "scopes": ["read", "write"],
            "caveats": [{ "type": "time", "not_after": 1_060 }],
            "facts": { "tenant": "acme" },
            "issued_at": 1_000
        })
    );
    assert_eq!(value["version"], json!(1));
    assert_eq!(value["blocks"], json!([]));
    Ok(())
}

#[test]
fn it_refuses_unknown_caveat_types_on_decode() -> TestResult {
    let engine = engine();
    let token = engine.issue(TokenRequest::new("agent-a", "agent-b", ["read"]))?;

    let mut value = serde_json::to_value(&token)?;
    value["authority"]["caveats"] = json!([{ "type": "geo", "region": "eu" }]);

    let err = CapabilityToken::from_json(&value.to_string()).unwrap_err();
    assert!(matches!(err, TokenError::Malformed(ref message) if message.contains("geo")));
    Ok(())
}

#[test]
fn it_rejects_garbage_in_the_header_form() {
    assert!(matches!(
        CapabilityToken::decode("not base64!"),
        Err(TokenError::Malformed(_))
    ));
}
