//! Journey tests: configuration, decks and external signers.
//!
//! Each journey builds a `TetherContext` the way an embedding service
//! would and walks one path through it:
//!
//! - decks back a proof, partially back one, or are too large to use
//! - a wallet outside the holder's key custody signs the consent grant
//! - a ledger signer type nobody registered fails closed until a verifier
//!   is plugged in
//! - clock skew, proof age and protocol versions follow the config file

use std::sync::Arc;

use tether::{RootConfig, TetherContext};
use tether_adapters::{ChainVerification, ChainVerifier, GrantSignature, SignatureMeta};
use tether_core::{ErrorCode, Signer, Timestamp};
use tether_policy::{
    DeckInstance, DenyReason, EvaluationContext, PolicyError, SourceRef, BASIC_IDENTITY_DECK,
    KYC_LITE_DECK,
};
use tether_proof::{ProofError, ProofOptions};
use tether_vault::KeySigner;

const NOW: u64 = 1_700_000_000;

fn ts(seconds: u64) -> Timestamp {
    Timestamp::from_seconds(seconds)
}

fn perms(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|s| s.to_string()).collect()
}

fn context() -> TetherContext {
    TetherContext::new(RootConfig::default()).unwrap()
}

// ============================================================================
// Decks
// ============================================================================

#[test]
fn journey_deck_backed_proof() {
    let ctx = context();
    let holder = ctx.prover.did().to_string();

    let mut instance = DeckInstance::new(BASIC_IDENTITY_DECK, holder.clone());
    instance
        .bind(
            "age_over_18",
            SourceRef::new("vc", "urn:cred:dmv-1").with_issuer("did:web:dmv.example"),
        )
        .bind("email_verified", SourceRef::new("self_attested", "me@example.com"));
    ctx.instances.save(&instance).unwrap();

    // The holder's wallet reloads the instance later
    let stored = ctx.instances.list_by_owner(&holder).unwrap();
    assert_eq!(stored.len(), 1);
    let instance = &stored[0];

    let request = ctx
        .engine
        .create_request_at(
            "bar.example",
            &perms(&["age_over_18", "email_verified"]),
            Some(300),
            ts(NOW),
        )
        .unwrap();
    let grant = ctx
        .prover
        .create_consent_grant_at(&request, None, ts(NOW))
        .unwrap();
    let options = ProofOptions {
        deck: Some((&ctx.evaluator, instance)),
        ..Default::default()
    };
    let proof = ctx
        .prover
        .generate_proof_at(&request, &grant, options, ts(NOW))
        .unwrap();
    assert!(proof.verified);
    assert_eq!(proof.satisfied_permissions, perms(&["age_over_18", "email_verified"]));

    let result = ctx.engine.verify_at(&request, &proof, Some(&grant), ts(NOW + 5));
    assert!(result.valid, "errors: {:?}", result.errors);
}

#[test]
fn journey_deck_partially_satisfied() {
    let ctx = context();
    let holder = ctx.prover.did().to_string();

    let mut instance = DeckInstance::new(KYC_LITE_DECK, holder);
    instance
        .bind(
            "identity_verified",
            SourceRef::new("vc", "urn:cred:passport")
                .with_issuer("did:web:bank.example")
                .with_issued_at(ts(NOW - 3600).to_rfc3339())
                .with_trust(0.5),
        )
        .bind(
            "address_verified",
            SourceRef::new("attestation", "urn:att:utility-bill")
                .with_issued_at(ts(NOW - 200 * 24 * 3600).to_rfc3339()),
        );

    let required = perms(&["identity_verified", "address_verified"]);
    let outcome = ctx
        .evaluator
        .satisfy_request(&instance, &required, &EvaluationContext::at(ts(NOW)));
    assert!(outcome.satisfied.is_empty());
    assert_eq!(
        outcome.reasons.get("identity_verified"),
        Some(&DenyReason::InsufficientTrust)
    );
    assert_eq!(outcome.reasons.get("address_verified"), Some(&DenyReason::Stale));

    // The holder can still answer, but the proof admits what it lacks
    let request = ctx
        .engine
        .create_request_at("bank.example", &required, Some(300), ts(NOW))
        .unwrap();
    let grant = ctx
        .prover
        .create_consent_grant_at(&request, None, ts(NOW))
        .unwrap();
    let options = ProofOptions {
        deck: Some((&ctx.evaluator, &instance)),
        ..Default::default()
    };
    let proof = ctx
        .prover
        .generate_proof_at(&request, &grant, options, ts(NOW))
        .unwrap();
    assert!(!proof.verified);
    assert!(proof.satisfied_permissions.is_empty());

    let result = ctx.engine.verify_at(&request, &proof, Some(&grant), ts(NOW));
    assert!(!result.valid);
    assert!(!result.checks.permissions_satisfied);
    assert_eq!(ctx.engine.replay_guard().size(), 0);
}

#[test]
fn journey_oversized_deck_instance() {
    let mut config = RootConfig::default();
    config.limits.max_deck_sources = 2;
    let ctx = TetherContext::new(config).unwrap();

    let mut instance = DeckInstance::new(BASIC_IDENTITY_DECK, ctx.prover.did());
    for i in 0..3 {
        instance.bind(format!("p{}", i), SourceRef::new("self_attested", "x"));
    }

    let err = ctx.instances.save(&instance).unwrap_err();
    assert!(matches!(err, PolicyError::TooManySources { count: 3, max: 2 }));
    assert!(ctx.instances.get(&instance.instance_id).unwrap().is_none());

    let request = ctx
        .engine
        .create_request_at("app", &perms(&["p0"]), Some(300), ts(NOW))
        .unwrap();
    let grant = ctx
        .prover
        .create_consent_grant_at(&request, None, ts(NOW))
        .unwrap();
    let options = ProofOptions {
        deck: Some((&ctx.evaluator, &instance)),
        ..Default::default()
    };
    let err = ctx
        .prover
        .generate_proof_at(&request, &grant, options, ts(NOW))
        .unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::TooManyDeckSources));
}

// ============================================================================
// External signers
// ============================================================================

#[test]
fn journey_external_wallet_grant() {
    let ctx = context();
    let wallet = KeySigner::generate();
    let wallet_id = hex::encode(wallet.public_key_ed25519());

    let request = ctx
        .engine
        .create_request_at("app", &perms(&["age_over_18"]), Some(300), ts(NOW))
        .unwrap();
    let (mut grant, consent_hash) = ctx
        .prover
        .prepare_grant_at(&request, "ED25519", &wallet_id, None, ts(NOW))
        .unwrap();
    assert_eq!(grant.signer.signer_type, "ed25519");
    assert!(!grant.is_signed());

    // An unsigned grant cannot back a proof
    assert!(matches!(
        ctx.prover
            .generate_proof_at(&request, &grant, ProofOptions::default(), ts(NOW)),
        Err(ProofError::GrantMismatch(_))
    ));

    let signature = wallet.sign_ed25519(consent_hash.as_bytes()).unwrap();
    grant.attach_external_signature(hex::encode(signature), None);
    let proof = ctx
        .prover
        .generate_proof_at(&request, &grant, ProofOptions::default(), ts(NOW))
        .unwrap();

    // A different wallet's signature over the same hash is rejected
    let impostor = KeySigner::generate();
    let mut forged = grant.clone();
    forged.signature = hex::encode(impostor.sign_ed25519(consent_hash.as_bytes()).unwrap());
    let result = ctx.engine.verify_at(&request, &proof, Some(&forged), ts(NOW));
    assert!(!result.checks.grant_valid);
    assert!(result.error_codes.contains(&ErrorCode::SignatureInvalid));

    let result = ctx.engine.verify_at(&request, &proof, Some(&grant), ts(NOW));
    assert!(result.valid, "errors: {:?}", result.errors);
}

/// Accepts any cardano grant whose metadata names the signing address.
struct CardanoStub;

impl ChainVerifier for CardanoStub {
    fn verify_grant(&self, grant: &GrantSignature<'_>, _: &str) -> ChainVerification {
        match grant.meta {
            Some(SignatureMeta::Cardano { address, .. }) if address == grant.signer_id => {
                ChainVerification::ok()
            }
            _ => ChainVerification::fail(ErrorCode::CardanoSignatureInvalid, "address mismatch"),
        }
    }
}

#[test]
fn journey_unregistered_chain_fails_closed() {
    let ctx = context();
    let run = |now: u64| {
        let request = ctx
            .engine
            .create_request_at("app", &perms(&["age_over_18"]), Some(300), ts(now))
            .unwrap();
        let (mut grant, _) = ctx
            .prover
            .prepare_grant_at(&request, "cardano", "addr1qxy", None, ts(now))
            .unwrap();
        grant.attach_external_signature(
            "84a4",
            Some(SignatureMeta::Cardano {
                address: "addr1qxy".into(),
                key: "a401".into(),
            }),
        );
        let proof = ctx
            .prover
            .generate_proof_at(&request, &grant, ProofOptions::default(), ts(now))
            .unwrap();
        ctx.engine.verify_at(&request, &proof, Some(&grant), ts(now))
    };

    let result = run(NOW);
    assert!(!result.valid);
    assert!(result.error_codes.contains(&ErrorCode::SignatureInvalid));
    assert!(result
        .errors
        .iter()
        .any(|e| e.contains("no chain verifier registered for cardano")));

    ctx.adapters
        .register_chain_verifier("Cardano", Arc::new(CardanoStub))
        .unwrap();
    let result = run(NOW + 10);
    assert!(result.valid, "errors: {:?}", result.errors);

    ctx.reset_registries().unwrap();
    let result = run(NOW + 20);
    assert!(!result.checks.grant_valid);
}

// ============================================================================
// Configuration-driven policy
// ============================================================================

#[test]
fn journey_clock_skew_from_config() {
    let mut config = RootConfig::default();
    config.time.max_clock_skew_seconds = 30;
    let ctx = TetherContext::new(config).unwrap();

    let request = ctx
        .engine
        .create_request_at("app", &perms(&["age_over_18"]), Some(300), ts(NOW))
        .unwrap();
    let grant = ctx
        .prover
        .create_consent_grant_at(&request, None, ts(NOW))
        .unwrap();
    let proof = ctx
        .prover
        .generate_proof_at(&request, &grant, ProofOptions::default(), ts(NOW))
        .unwrap();

    // The verifier's clock runs 31 seconds behind the holder's
    let early = ctx.engine.verify_at(&request, &proof, Some(&grant), ts(NOW - 31));
    assert!(!early.valid);
    assert!(early.error_codes.contains(&ErrorCode::FutureIssuedAt));
    assert!(!early.checks.request_time_valid);
    assert!(!early.checks.proof_time_valid);

    // 30 seconds is within tolerance, and the rejection above left no trace
    let ok = ctx.engine.verify_at(&request, &proof, Some(&grant), ts(NOW - 30));
    assert!(ok.valid, "errors: {:?}", ok.errors);
}

#[test]
fn journey_request_expiry_boundary() {
    let ctx = context();
    let flow = || {
        let request = ctx
            .engine
            .create_request_at("app", &perms(&["age_over_18"]), Some(300), ts(NOW))
            .unwrap();
        let grant = ctx
            .prover
            .create_consent_grant_at(&request, None, ts(NOW))
            .unwrap();
        let proof = ctx
            .prover
            .generate_proof_at(&request, &grant, ProofOptions::default(), ts(NOW))
            .unwrap();
        (request, grant, proof)
    };

    let (request, grant, proof) = flow();
    assert_eq!(proof.expires_at, request.expires_at);
    let result = ctx.engine.verify_at(&request, &proof, Some(&grant), ts(NOW + 300));
    assert!(result.valid, "errors: {:?}", result.errors);

    let (request, grant, proof) = flow();
    let result = ctx.engine.verify_at(&request, &proof, Some(&grant), ts(NOW + 301));
    assert!(!result.valid);
    assert!(!result.checks.not_expired);
    assert!(result.error_codes.contains(&ErrorCode::Expired));
}

#[test]
fn journey_proof_age_limit() {
    let mut config = RootConfig::default();
    config.request.proof_ttl_seconds = 3600;
    let ctx = TetherContext::new(config).unwrap();

    let request = ctx
        .engine
        .create_request_at("app", &perms(&["age_over_18"]), Some(3600), ts(NOW))
        .unwrap();
    let grant = ctx
        .prover
        .create_consent_grant_at(&request, None, ts(NOW))
        .unwrap();
    let proof = ctx
        .prover
        .generate_proof_at(&request, &grant, ProofOptions::default(), ts(NOW))
        .unwrap();

    let result = ctx.engine.verify_at(&request, &proof, Some(&grant), ts(NOW + 601));
    assert!(!result.valid);
    assert!(result.error_codes.contains(&ErrorCode::ProofTooOld));
    assert!(result.checks.not_expired);

    let result = ctx.engine.verify_at(&request, &proof, Some(&grant), ts(NOW + 600));
    assert!(result.valid, "errors: {:?}", result.errors);
}

#[test]
fn journey_protocol_version_upgrade() {
    let mut config = RootConfig::default();
    config.protocol.max_minor = 2;
    config.protocol.current = "1.2".into();
    let upgraded = TetherContext::new(config).unwrap();
    let legacy = context();

    let request = upgraded
        .engine
        .create_request_at("app", &perms(&["age_over_18"]), Some(300), ts(NOW))
        .unwrap();
    assert_eq!(request.protocol_version, "1.2");

    // A holder that only speaks 1.0 and 1.1 refuses to answer
    assert!(matches!(
        legacy.prover.create_consent_grant_at(&request, None, ts(NOW)),
        Err(ProofError::UnsupportedVersion(_))
    ));

    let grant = upgraded
        .prover
        .create_consent_grant_at(&request, None, ts(NOW))
        .unwrap();
    let proof = upgraded
        .prover
        .generate_proof_at(&request, &grant, ProofOptions::default(), ts(NOW))
        .unwrap();

    let result = legacy.engine.verify_at(&request, &proof, Some(&grant), ts(NOW));
    assert!(!result.checks.schema_valid);
    assert!(result
        .error_codes
        .contains(&ErrorCode::UnsupportedProtocolVersion));

    let result = upgraded.engine.verify_at(&request, &proof, Some(&grant), ts(NOW));
    assert!(result.valid, "errors: {:?}", result.errors);
}

#[test]
fn journey_config_file_disables_pairwise_ids() {
    let dir = std::env::temp_dir().join(format!("tether-journey-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("config.toml");
    std::fs::write(&path, "[prover]\npairwise_identifiers = false\n").unwrap();

    let config = RootConfig::load(&path).unwrap();
    let ctx = TetherContext::new(config).unwrap();
    let request = ctx
        .engine
        .create_request_at("app", &perms(&["age_over_18"]), None, ts(NOW))
        .unwrap();
    let grant = ctx
        .prover
        .create_consent_grant_at(&request, None, ts(NOW))
        .unwrap();
    let proof = ctx
        .prover
        .generate_proof_at(&request, &grant, ProofOptions::default(), ts(NOW))
        .unwrap();
    assert_eq!(proof.prover.id, ctx.prover.did());
    assert_eq!(proof.prover.prover_type, "did");

    let _ = std::fs::remove_dir_all(&dir);
}
