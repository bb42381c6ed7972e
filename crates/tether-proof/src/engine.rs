//! Verifier side of the protocol: request creation and proof verification.
//!
//! Every verification entry point returns a [`VerificationResult`]; a
//! rejected proof is never an `Err`. Checks are accumulated so one pass
//! reports every defect. The replay entry is committed last, and only when
//! nothing else failed, so a proof rejected for an unrelated defect stays
//! replayable once the defect is fixed.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Deserialize;
use tether_adapters::{AdapterRegistry, GrantSignature, SignatureMeta};
use tether_core::{
    digests_equal, is_ed25519_signature_hex, pairwise_id, verify_ed25519_hex, ErrorCode, Nonce,
    RequestId, Timestamp,
};
use tether_cred::{extract_claim_permissions, verify_credential_signature, VerifiableCredential};
use tracing::{debug, info, warn};

use crate::config::ProtocolConfig;
use crate::error::{ProofError, ProofResult};
use crate::limits::MAX_JSON_INPUT_BYTES;
use crate::messages::{
    ConsentGrant, ProofRequest, ProofResponse, PROVER_TYPE_PAIRWISE, SIGNER_TYPE_DID,
};
use crate::replay::{replay_key, replay_ttl, ReplayGuard};
use crate::repository::MessageRepository;
use crate::result::VerificationResult;
use crate::schema::{validate_grant, validate_proof, validate_request, SchemaReport};

/// Body accepted by [`ProtocolEngine::verify_json`].
#[derive(Debug, Deserialize)]
struct VerifyEnvelope {
    request: ProofRequest,
    proof: ProofResponse,
    #[serde(default)]
    grant: Option<ConsentGrant>,
    #[serde(default)]
    credential: Option<VerifiableCredential>,
}

/// Replay entry to commit once every other check has passed.
struct PendingReplay {
    key: String,
    ttl_seconds: u64,
}

pub struct ProtocolEngine {
    config: ProtocolConfig,
    adapters: Arc<AdapterRegistry>,
    replay: ReplayGuard,
    repository: Option<MessageRepository>,
}

impl ProtocolEngine {
    pub fn new(config: ProtocolConfig, adapters: Arc<AdapterRegistry>) -> Self {
        Self {
            config,
            adapters,
            replay: ReplayGuard::new(),
            repository: None,
        }
    }

    /// Persist created requests and enable [`verify_stored`](Self::verify_stored).
    pub fn with_repository(mut self, repository: MessageRepository) -> Self {
        self.repository = Some(repository);
        self
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    pub fn adapters(&self) -> &Arc<AdapterRegistry> {
        &self.adapters
    }

    pub fn replay_guard(&self) -> &ReplayGuard {
        &self.replay
    }

    pub fn repository(&self) -> Option<&MessageRepository> {
        self.repository.as_ref()
    }

    // -- request creation ---------------------------------------------------

    pub fn create_request(
        &self,
        audience: &str,
        required_permissions: &[String],
        ttl_seconds: Option<u64>,
    ) -> ProofResult<ProofRequest> {
        self.create_request_at(audience, required_permissions, ttl_seconds, Timestamp::now())
    }

    /// Create a fresh request with a random nonce, valid from `now` for
    /// `ttl_seconds` (or the configured default).
    pub fn create_request_at(
        &self,
        audience: &str,
        required_permissions: &[String],
        ttl_seconds: Option<u64>,
        now: Timestamp,
    ) -> ProofResult<ProofRequest> {
        if audience.trim().is_empty() {
            return Err(ProofError::InvalidRequest("audience is required".into()));
        }
        if required_permissions.is_empty() {
            return Err(ProofError::InvalidRequest(
                "at least one permission is required".into(),
            ));
        }
        self.config
            .limits
            .check_permissions(required_permissions)
            .map_err(|(code, message)| ProofError::LimitExceeded { code, message })?;
        let ttl = ttl_seconds.unwrap_or(self.config.default_ttl_seconds);
        if ttl == 0 {
            return Err(ProofError::InvalidRequest("ttl must be positive".into()));
        }

        let request = ProofRequest {
            request_id: RequestId::generate(),
            audience: audience.to_string(),
            required_permissions: required_permissions.to_vec(),
            nonce: Nonce::generate().to_hex(),
            issued_at: now.to_rfc3339(),
            expires_at: now.plus_seconds(ttl).to_rfc3339(),
            protocol_version: self.config.versions.current.clone(),
            extra: Default::default(),
        };
        if let Some(repo) = &self.repository {
            repo.save_request(&request)?;
        }
        info!(
            request_id = %request.request_id,
            audience,
            permissions = required_permissions.len(),
            ttl,
            "proof request created"
        );
        Ok(request)
    }

    // -- verification -------------------------------------------------------

    pub fn verify(
        &self,
        request: &ProofRequest,
        proof: &ProofResponse,
        grant: Option<&ConsentGrant>,
    ) -> VerificationResult {
        self.verify_at(request, proof, grant, Timestamp::now())
    }

    pub fn verify_at(
        &self,
        request: &ProofRequest,
        proof: &ProofResponse,
        grant: Option<&ConsentGrant>,
        now: Timestamp,
    ) -> VerificationResult {
        let (mut result, pending) = self.base_checks(request, proof, grant, now);
        self.commit_replay(&mut result, pending, now);
        self.finish(request, result)
    }

    pub fn verify_credential_proof(
        &self,
        request: &ProofRequest,
        proof: &ProofResponse,
        grant: Option<&ConsentGrant>,
        credential: &VerifiableCredential,
    ) -> VerificationResult {
        self.verify_credential_proof_at(request, proof, grant, credential, Timestamp::now())
    }

    /// Base verification followed by credential checks. The replay entry is
    /// committed only after the credential checks pass too.
    pub fn verify_credential_proof_at(
        &self,
        request: &ProofRequest,
        proof: &ProofResponse,
        grant: Option<&ConsentGrant>,
        credential: &VerifiableCredential,
        now: Timestamp,
    ) -> VerificationResult {
        let (mut result, pending) = self.base_checks(request, proof, grant, now);
        credential_checks(&mut result, proof, credential, now);
        self.commit_replay(&mut result, pending, now);
        self.finish(request, result)
    }

    pub fn verify_json(&self, input: &[u8]) -> VerificationResult {
        self.verify_json_at(input, Timestamp::now())
    }

    /// Verify a JSON object `{request, proof, grant?, credential?}`.
    ///
    /// Oversized or unparseable input is rejected as `MALFORMED_INPUT`
    /// before any other processing.
    pub fn verify_json_at(&self, input: &[u8], now: Timestamp) -> VerificationResult {
        if input.len() > MAX_JSON_INPUT_BYTES {
            warn!(size = input.len(), "verification input too large");
            return VerificationResult::malformed(format!(
                "input of {} bytes exceeds the limit of {}",
                input.len(),
                MAX_JSON_INPUT_BYTES
            ));
        }
        let envelope: VerifyEnvelope = match serde_json::from_slice(input) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, "verification input is not a valid envelope");
                return VerificationResult::malformed(format!("malformed input: {}", e));
            }
        };
        match &envelope.credential {
            Some(credential) => self.verify_credential_proof_at(
                &envelope.request,
                &envelope.proof,
                envelope.grant.as_ref(),
                credential,
                now,
            ),
            None => self.verify_at(&envelope.request, &envelope.proof, envelope.grant.as_ref(), now),
        }
    }

    pub fn verify_stored(&self, proof: &ProofResponse) -> ProofResult<VerificationResult> {
        self.verify_stored_at(proof, Timestamp::now())
    }

    /// Verify a proof against its stored request and the most recently
    /// stored grant for that request.
    pub fn verify_stored_at(
        &self,
        proof: &ProofResponse,
        now: Timestamp,
    ) -> ProofResult<VerificationResult> {
        let repo = self
            .repository
            .as_ref()
            .ok_or_else(|| ProofError::Storage("no message repository configured".into()))?;
        let Some(request) = repo.get_request(&proof.request_id)? else {
            warn!(request_id = %proof.request_id, "proof references an unknown request");
            return Ok(VerificationResult::malformed(format!(
                "unknown request {}",
                proof.request_id
            )));
        };
        let grant = repo.latest_grant_for_request(&request.request_id)?;
        Ok(self.verify_at(&request, proof, grant.as_ref(), now))
    }

    // -- steps --------------------------------------------------------------

    fn base_checks(
        &self,
        request: &ProofRequest,
        proof: &ProofResponse,
        grant: Option<&ConsentGrant>,
        now: Timestamp,
    ) -> (VerificationResult, Option<PendingReplay>) {
        let mut result = VerificationResult::default();

        // Structural problems stop verification with every other check false
        let mut report = SchemaReport::default();
        validate_request(&mut report, request, &self.config.limits, &self.config.versions);
        validate_proof(&mut report, proof, &self.config.limits, &self.config.versions);
        if let Some(grant) = grant {
            validate_grant(&mut report, grant, &self.config.limits);
        }
        if !report.is_valid() {
            for issue in report.issues {
                result.fail(Some(issue.code), issue.message);
            }
            return (result, None);
        }
        result.checks.schema_valid = true;

        let checks = &mut result.checks;
        let time = &self.config.time;
        let request_time = time.validate_wire_at(&request.issued_at, &request.expires_at, now);
        let proof_time = time.validate_wire_at(&proof.issued_at, &proof.expires_at, now);
        let grant_time = grant.map(|g| time.validate_wire_at(&g.issued_at, &g.expires_at, now));
        checks.request_time_valid = request_time.valid;
        checks.proof_time_valid = proof_time.valid;
        checks.grant_time_valid = grant_time.map_or(true, |t| t.valid);
        for (what, check) in [
            ("request", Some(request_time)),
            ("grant", grant_time),
            ("proof", Some(proof_time)),
        ] {
            if let Some(check) = check.filter(|c| !c.valid) {
                let code = check.error_code.unwrap_or(ErrorCode::InvalidTimeRange);
                result.fail(Some(code), format!("{} time invalid: {}", what, code));
            }
        }

        // Strict expiry without skew tolerance
        let expired = request.expires_at_ts().map_or(true, |expires| expires < now);
        result.checks.not_expired = !expired;
        if expired {
            result.fail(Some(ErrorCode::Expired), "request has expired");
        }

        result.checks.audience_match = proof.audience == request.audience;
        if !result.checks.audience_match {
            result.fail(None, "proof audience does not match request");
        }
        result.checks.nonce_match = digests_equal(&proof.nonce, &request.nonce);
        if !result.checks.nonce_match {
            result.fail(None, "proof nonce does not match request");
        }
        result.checks.request_id_match = proof.request_id == request.request_id;
        if !result.checks.request_id_match {
            result.fail(None, "proof requestId does not match request");
        }

        let missing = uncovered(&request.required_permissions, &proof.satisfied_permissions);
        result.checks.permissions_satisfied = missing.is_empty();
        if !missing.is_empty() {
            result.fail(
                None,
                format!("required permissions not satisfied: {}", missing.join(", ")),
            );
        }

        let request_hash = match request.hash() {
            Ok(hash) => hash,
            Err(e) => {
                result.fail(Some(ErrorCode::MalformedInput), format!("request hash: {}", e));
                return (result, None);
            }
        };
        result.checks.binding_valid = digests_equal(&request_hash, &proof.binding.request_hash);
        if !result.checks.binding_valid {
            result.fail(None, "proof binding does not match request hash");
        }
        debug!(
            request_id = %request.request_id,
            binding_valid = result.checks.binding_valid,
            "binding checked"
        );

        result.checks.grant_valid = match grant {
            Some(grant) => self.grant_checks(&mut result, request, proof, grant),
            None => true,
        };

        if !result.checks.binding_valid {
            return (result, None);
        }
        let key = replay_key(&replay_prover_id(proof, grant, &request.audience), &request_hash);
        if self.replay.has_at(&key, now) {
            result.fail(Some(ErrorCode::ReplayDetected), "proof has already been used");
            return (result, None);
        }
        result.checks.not_replay = true;
        let expires = request.expires_at_ts().unwrap_or(now);
        let pending = PendingReplay {
            key,
            ttl_seconds: replay_ttl(now, expires, self.config.replay_min_ttl_seconds),
        };
        (result, Some(pending))
    }

    /// Grant consistency with request and proof, then its signature.
    fn grant_checks(
        &self,
        result: &mut VerificationResult,
        request: &ProofRequest,
        proof: &ProofResponse,
        grant: &ConsentGrant,
    ) -> bool {
        let mut valid = true;
        if grant.request_id != request.request_id {
            result.fail(None, "grant requestId does not match request");
            valid = false;
        }
        if !digests_equal(&grant.nonce, &request.nonce) {
            result.fail(None, "grant nonce does not match request");
            valid = false;
        }
        if grant.audience != request.audience {
            result.fail(None, "grant audience does not match request");
            valid = false;
        }
        let unconsented = uncovered(&proof.satisfied_permissions, &grant.permissions);
        if !unconsented.is_empty() {
            result.fail(
                None,
                format!("permissions without consent: {}", unconsented.join(", ")),
            );
            valid = false;
        }
        if !prover_matches_signer(proof, grant, &request.audience) {
            result.fail(None, "proof prover does not match grant signer");
            valid = false;
        }
        if let Err((code, message)) = self.verify_grant_signature(grant) {
            warn!(
                grant_id = %grant.grant_id,
                signer_type = %grant.signer.signer_type,
                error_code = %code,
                "grant signature rejected"
            );
            result.fail(Some(code), message);
            valid = false;
        }
        valid
    }

    /// DID signers are verified locally through DID resolution; any other
    /// signer type goes to its registered chain verifier and fails closed
    /// when none is registered.
    fn verify_grant_signature(&self, grant: &ConsentGrant) -> Result<(), (ErrorCode, String)> {
        let signer_type = grant.signer.signer_type.to_ascii_lowercase();
        if signer_type != SIGNER_TYPE_DID {
            let Some(verifier) = self.adapters.chain_verifier(&signer_type) else {
                return Err((
                    ErrorCode::SignatureInvalid,
                    format!("no chain verifier registered for {}", signer_type),
                ));
            };
            let consent_hash = grant
                .consent_hash()
                .map_err(|e| (ErrorCode::MalformedInput, format!("grant hash: {}", e)))?;
            let outcome = verifier.verify_grant(
                &GrantSignature {
                    signer_type: &signer_type,
                    signer_id: &grant.signer.id,
                    signature: &grant.signature,
                    meta: grant.signature_meta.as_ref(),
                },
                &consent_hash,
            );
            if outcome.valid {
                return Ok(());
            }
            let code = outcome.error_code.unwrap_or(ErrorCode::SignatureInvalid);
            let message = outcome
                .message
                .unwrap_or_else(|| format!("{} grant signature invalid", signer_type));
            return Err((code, message));
        }

        if !is_ed25519_signature_hex(&grant.signature) {
            return Err((
                ErrorCode::SignatureInvalid,
                "grant signature is not a 64-byte hex Ed25519 signature".into(),
            ));
        }
        let resolution = self.adapters.resolve_did(&grant.signer.id);
        let Some(document) = resolution.document() else {
            return Err((
                ErrorCode::DidResolutionFailed,
                format!("grant signer: {}", resolution.describe()),
            ));
        };
        let method = match &grant.signature_meta {
            Some(SignatureMeta::Did { verification_method }) => Some(verification_method.as_str()),
            _ => None,
        };
        let Some(key) = document.ed25519_key(method) else {
            return Err((
                ErrorCode::DidResolutionFailed,
                format!("no Ed25519 verification method for {}", grant.signer.id),
            ));
        };
        let signable = grant
            .signable_bytes()
            .map_err(|e| (ErrorCode::MalformedInput, format!("grant payload: {}", e)))?;
        if verify_ed25519_hex(&key, &signable, &grant.signature) {
            Ok(())
        } else {
            Err((ErrorCode::SignatureInvalid, "grant signature invalid".into()))
        }
    }

    fn commit_replay(
        &self,
        result: &mut VerificationResult,
        pending: Option<PendingReplay>,
        now: Timestamp,
    ) {
        let Some(pending) = pending else {
            return;
        };
        if !result.errors.is_empty() {
            return;
        }
        // Losing a concurrent race is a replay like any other
        if !self
            .replay
            .check_and_insert_at(&pending.key, pending.ttl_seconds, now)
        {
            result.checks.not_replay = false;
            result.fail(Some(ErrorCode::ReplayDetected), "proof has already been used");
        }
    }

    fn finish(&self, request: &ProofRequest, result: VerificationResult) -> VerificationResult {
        let result = result.finish();
        if result.valid {
            info!(request_id = %request.request_id, "proof verified");
        } else {
            let codes: Vec<&str> = result.error_codes.iter().map(|c| c.as_str()).collect();
            warn!(
                request_id = %request.request_id,
                errors = result.errors.len(),
                error_codes = ?codes,
                "proof rejected"
            );
        }
        result
    }
}

/// Credential schema, expiry, binding, signature and claim coverage.
fn credential_checks(
    result: &mut VerificationResult,
    proof: &ProofResponse,
    credential: &VerifiableCredential,
    now: Timestamp,
) {
    let schema_valid = !credential.id.as_str().is_empty()
        && !credential.issuer.is_empty()
        && !credential.subject.is_empty()
        && !credential.version.is_empty()
        && !credential.proof.verification_method.is_empty()
        && Timestamp::parse_wire(&credential.issued_at).is_some();
    result.checks.credential_schema_valid = Some(schema_valid);
    if !schema_valid {
        result.fail(Some(ErrorCode::MalformedInput), "credential is malformed");
    }

    let expired = credential.is_expired_at(now);
    result.checks.credential_not_expired = Some(!expired);
    if expired {
        result.fail(Some(ErrorCode::Expired), "credential has expired");
    }

    let id_matches = proof.binding.credential_id.as_ref() == Some(&credential.id);
    let hash_matches = match (&proof.binding.credential_hash, credential.credential_hash()) {
        (Some(bound), Ok(actual)) => digests_equal(bound, &actual),
        _ => false,
    };
    result.checks.credential_binding_valid = Some(id_matches && hash_matches);
    if !id_matches {
        result.fail(None, "proof is not bound to this credential id");
    }
    if !hash_matches {
        result.fail(None, "proof credential hash does not match credential");
    }

    let signature_valid = is_ed25519_signature_hex(&credential.proof.signature)
        && verify_credential_signature(credential);
    result.checks.credential_signature_valid = Some(signature_valid);
    if !signature_valid {
        result.fail(Some(ErrorCode::SignatureInvalid), "credential signature invalid");
    }

    let granted = extract_claim_permissions(&credential.claims);
    let unbacked: Vec<&str> = proof
        .satisfied_permissions
        .iter()
        .filter(|p| !granted.contains(p.as_str()))
        .map(String::as_str)
        .collect();
    result.checks.credential_claims_satisfied = Some(unbacked.is_empty());
    if !unbacked.is_empty() {
        result.fail(
            None,
            format!("credential does not grant: {}", unbacked.join(", ")),
        );
    }
}

/// Entries of `required` absent from `present`, deduplicated, in order.
fn uncovered(required: &[String], present: &[String]) -> Vec<String> {
    let present: BTreeSet<&str> = present.iter().map(String::as_str).collect();
    let mut seen = BTreeSet::new();
    required
        .iter()
        .filter(|p| !present.contains(p.as_str()) && seen.insert(p.as_str()))
        .cloned()
        .collect()
}

/// The replay key is derived from the prover id, so a DID-signed grant pins
/// it: the signer's DID itself, or its pairwise id for this audience.
/// Grants from other signer types carry no DID to tie the prover to.
fn prover_matches_signer(proof: &ProofResponse, grant: &ConsentGrant, audience: &str) -> bool {
    if !grant.signer.signer_type.eq_ignore_ascii_case(SIGNER_TYPE_DID) {
        return true;
    }
    match proof.prover.prover_type.as_str() {
        SIGNER_TYPE_DID => proof.prover.id == grant.signer.id,
        PROVER_TYPE_PAIRWISE => {
            digests_equal(&proof.prover.id, &pairwise_id(&grant.signer.id, audience))
        }
        _ => false,
    }
}

/// Prover identity used in the replay key. Behind a DID-signed grant both
/// presentations of the holder (DID or pairwise id) map to the pairwise id,
/// so switching between them does not yield a fresh key.
fn replay_prover_id(proof: &ProofResponse, grant: Option<&ConsentGrant>, audience: &str) -> String {
    match grant {
        Some(grant) if grant.signer.signer_type.eq_ignore_ascii_case(SIGNER_TYPE_DID) => {
            pairwise_id(&grant.signer.id, audience)
        }
        _ => proof.prover.id.clone(),
    }
}
