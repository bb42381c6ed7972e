//! Holder side of the protocol: consent grants and proof generation.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tether_adapters::SignatureMeta;
use tether_core::{
    digests_equal, pairwise_id, put_json, GrantId, ProofId, RecordKind, RecordStore, Signer,
    Timestamp,
};
use tether_cred::{
    check_presentable, extract_claim_permissions, CredentialStore, VerifiableCredential,
};
use tether_policy::{DeckEvaluator, DeckInstance, EvaluationContext};
use tracing::{debug, info, warn};

use crate::config::ProtocolConfig;
use crate::error::{ProofError, ProofResult};
use crate::messages::{
    ConsentGrant, ProofBinding, ProofRequest, ProofResponse, ProverRef, SignerRef,
    PROVER_TYPE_PAIRWISE, SIGNER_TYPE_DID,
};
use crate::repository::MessageRepository;

/// Evidence backing a proof. With neither set, the grant alone backs every
/// consented permission.
#[derive(Default, Clone, Copy)]
pub struct ProofOptions<'a> {
    /// Credential whose claims must cover every required permission.
    pub credential: Option<&'a VerifiableCredential>,
    /// Deck instance evaluated permission by permission.
    pub deck: Option<(&'a DeckEvaluator, &'a DeckInstance)>,
}

/// Stored pairwise identifier. The root DID is deliberately absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PairwiseRecord {
    pairwise_id: String,
    audience: String,
    created_at: String,
}

pub struct Prover {
    signer: Arc<dyn Signer>,
    did: String,
    repository: Option<MessageRepository>,
    config: ProtocolConfig,
}

impl Prover {
    pub fn new(signer: Arc<dyn Signer>, config: ProtocolConfig) -> Self {
        let did = signer.did();
        Self {
            signer,
            did,
            repository: None,
            config,
        }
    }

    /// Persist grants, proofs and pairwise ids in `store`.
    pub fn with_store(mut self, store: Arc<dyn RecordStore>) -> Self {
        self.repository = Some(MessageRepository::new(store));
        self
    }

    pub fn did(&self) -> &str {
        &self.did
    }

    // -- grants -------------------------------------------------------------

    pub fn create_consent_grant(
        &self,
        request: &ProofRequest,
        permissions: Option<&[String]>,
    ) -> ProofResult<ConsentGrant> {
        self.create_consent_grant_at(request, permissions, Timestamp::now())
    }

    /// Grant consent with this prover's own key. `permissions` defaults to
    /// everything the request asks for and may only narrow it.
    pub fn create_consent_grant_at(
        &self,
        request: &ProofRequest,
        permissions: Option<&[String]>,
        now: Timestamp,
    ) -> ProofResult<ConsentGrant> {
        let mut grant = self.build_grant(request, SIGNER_TYPE_DID, &self.did, permissions, now)?;
        grant.signature_meta = Some(SignatureMeta::Did {
            verification_method: format!("{}#key-1", self.did),
        });
        let signature = self.signer.sign_ed25519(&grant.signable_bytes()?)?;
        grant.signature = hex::encode(signature);

        if let Some(repo) = &self.repository {
            repo.save_grant(&grant)?;
        }
        info!(
            grant_id = %grant.grant_id,
            request_id = %request.request_id,
            permissions = grant.permissions.len(),
            "consent granted"
        );
        Ok(grant)
    }

    pub fn prepare_grant(
        &self,
        request: &ProofRequest,
        signer_type: &str,
        signer_id: &str,
        permissions: Option<&[String]>,
    ) -> ProofResult<(ConsentGrant, String)> {
        self.prepare_grant_at(request, signer_type, signer_id, permissions, Timestamp::now())
    }

    /// Unsigned grant for an external signer, with the consent hash the
    /// external signature must commit to.
    pub fn prepare_grant_at(
        &self,
        request: &ProofRequest,
        signer_type: &str,
        signer_id: &str,
        permissions: Option<&[String]>,
        now: Timestamp,
    ) -> ProofResult<(ConsentGrant, String)> {
        if signer_type.trim().is_empty() || signer_id.trim().is_empty() {
            return Err(ProofError::InvalidRequest(
                "signer type and id are required".into(),
            ));
        }
        let signer_type = signer_type.to_ascii_lowercase();
        let grant = self.build_grant(request, &signer_type, signer_id, permissions, now)?;
        let consent_hash = grant.consent_hash()?;
        debug!(
            grant_id = %grant.grant_id,
            signer_type = %signer_type,
            "grant prepared for external signature"
        );
        Ok((grant, consent_hash))
    }

    fn build_grant(
        &self,
        request: &ProofRequest,
        signer_type: &str,
        signer_id: &str,
        permissions: Option<&[String]>,
        now: Timestamp,
    ) -> ProofResult<ConsentGrant> {
        self.check_request(request, now)?;
        let permissions = match permissions {
            Some(subset) => {
                let requested: BTreeSet<&str> =
                    request.required_permissions.iter().map(String::as_str).collect();
                if let Some(extra) = subset.iter().find(|p| !requested.contains(p.as_str())) {
                    return Err(ProofError::InvalidRequest(format!(
                        "permission {} was not requested",
                        extra
                    )));
                }
                dedup(subset)
            }
            None => dedup(&request.required_permissions),
        };
        Ok(ConsentGrant {
            grant_id: GrantId::generate(),
            request_id: request.request_id.clone(),
            audience: request.audience.clone(),
            nonce: request.nonce.clone(),
            permissions,
            issued_at: now.to_rfc3339(),
            expires_at: request.expires_at.clone(),
            signer: SignerRef {
                signer_type: signer_type.to_string(),
                id: signer_id.to_string(),
                extra: Default::default(),
            },
            signature: String::new(),
            consent: None,
            signature_meta: None,
            extra: Default::default(),
        })
    }

    fn check_request(&self, request: &ProofRequest, now: Timestamp) -> ProofResult<()> {
        self.config
            .versions
            .check(&request.protocol_version)
            .map_err(|_| ProofError::UnsupportedVersion(request.protocol_version.clone()))?;
        self.config
            .limits
            .check_permissions(&request.required_permissions)
            .map_err(|(code, message)| ProofError::LimitExceeded { code, message })?;
        match request.expires_at_ts() {
            Some(expires) if expires > now => Ok(()),
            Some(_) => Err(ProofError::InvalidRequest("request has expired".into())),
            None => Err(ProofError::InvalidRequest(
                "request expiresAt is not a valid timestamp".into(),
            )),
        }
    }

    // -- proofs -------------------------------------------------------------

    pub fn generate_proof(
        &self,
        request: &ProofRequest,
        grant: &ConsentGrant,
        options: ProofOptions<'_>,
    ) -> ProofResult<ProofResponse> {
        self.generate_proof_at(request, grant, options, Timestamp::now())
    }

    /// Build a proof bound to `request` and backed by `grant`.
    ///
    /// A credential that does not cover every required permission is an
    /// error; no partial proof is produced from it. Deck evaluation and
    /// grant-only proofs report partial coverage through `verified`.
    pub fn generate_proof_at(
        &self,
        request: &ProofRequest,
        grant: &ConsentGrant,
        options: ProofOptions<'_>,
        now: Timestamp,
    ) -> ProofResult<ProofResponse> {
        self.check_request(request, now)?;
        check_grant_matches(request, grant)?;

        let required = dedup(&request.required_permissions);
        let available: BTreeSet<String> = match (options.credential, options.deck) {
            (Some(credential), _) => {
                check_presentable(credential, &required, now)?;
                extract_claim_permissions(&credential.claims)
            }
            (None, Some((evaluator, instance))) => {
                evaluator.validate_instance(instance)?;
                let outcome =
                    evaluator.satisfy_request(instance, &required, &EvaluationContext::at(now));
                for line in &outcome.errors {
                    debug!(instance_id = %instance.instance_id, "{}", line);
                }
                outcome.satisfied.into_iter().collect()
            }
            (None, None) => required.iter().cloned().collect(),
        };
        let consented: BTreeSet<&str> = grant.permissions.iter().map(String::as_str).collect();
        let satisfied: Vec<String> = required
            .iter()
            .filter(|p| consented.contains(p.as_str()) && available.contains(*p))
            .cloned()
            .collect();
        let verified = satisfied.len() == required.len();

        let (credential_id, credential_hash) = match options.credential {
            Some(credential) => (Some(credential.id.clone()), Some(credential.credential_hash()?)),
            None => (None, None),
        };
        let binding = ProofBinding {
            request_hash: request.hash()?,
            credential_id,
            credential_hash,
            extra: Default::default(),
        };

        let prover = self.prover_ref(&request.audience, now)?;
        let expires_at = match request.expires_at_ts() {
            Some(request_expiry) => now.plus_seconds(self.config.proof_ttl_seconds).min(request_expiry),
            None => now.plus_seconds(self.config.proof_ttl_seconds),
        };
        let proof = ProofResponse {
            proof_id: ProofId::generate(),
            request_id: request.request_id.clone(),
            audience: request.audience.clone(),
            nonce: request.nonce.clone(),
            satisfied_permissions: satisfied,
            verified,
            binding,
            prover,
            issued_at: now.to_rfc3339(),
            expires_at: expires_at.to_rfc3339(),
            protocol_version: request.protocol_version.clone(),
            extra: Default::default(),
        };

        if let Some(repo) = &self.repository {
            repo.save_grant(grant)?;
            repo.save_proof(&proof)?;
        }
        if verified {
            info!(proof_id = %proof.proof_id, request_id = %request.request_id, "proof generated");
        } else {
            warn!(
                proof_id = %proof.proof_id,
                request_id = %request.request_id,
                satisfied = proof.satisfied_permissions.len(),
                required = required.len(),
                "proof generated with unsatisfied permissions"
            );
        }
        Ok(proof)
    }

    /// Generate a proof from the first stored credential of `subject_id`
    /// that covers every required permission.
    pub fn generate_proof_from_store(
        &self,
        request: &ProofRequest,
        grant: &ConsentGrant,
        credentials: &CredentialStore,
        subject_id: &str,
    ) -> ProofResult<ProofResponse> {
        let now = Timestamp::now();
        let required = dedup(&request.required_permissions);
        let Some(credential) = credentials.find_with_claims_at(subject_id, &required, now)? else {
            return Err(ProofError::MissingClaims(required));
        };
        let options = ProofOptions {
            credential: Some(&credential),
            ..Default::default()
        };
        self.generate_proof_at(request, grant, options, now)
    }

    fn prover_ref(&self, audience: &str, now: Timestamp) -> ProofResult<ProverRef> {
        if !self.config.pairwise_identifiers {
            return Ok(ProverRef {
                prover_type: SIGNER_TYPE_DID.to_string(),
                id: self.did.clone(),
                extra: Default::default(),
            });
        }
        let id = pairwise_id(&self.did, audience);
        if let Some(repo) = &self.repository {
            let store = repo.store().as_ref();
            if !store.exists(RecordKind::PairwiseId, &id)? {
                put_json(
                    store,
                    RecordKind::PairwiseId,
                    &id,
                    &PairwiseRecord {
                        pairwise_id: id.clone(),
                        audience: audience.to_string(),
                        created_at: now.to_rfc3339(),
                    },
                )?;
            }
        }
        Ok(ProverRef {
            prover_type: PROVER_TYPE_PAIRWISE.to_string(),
            id,
            extra: Default::default(),
        })
    }
}

fn check_grant_matches(request: &ProofRequest, grant: &ConsentGrant) -> ProofResult<()> {
    if grant.request_id != request.request_id {
        return Err(ProofError::GrantMismatch("requestId differs".into()));
    }
    if !digests_equal(&grant.nonce, &request.nonce) {
        return Err(ProofError::GrantMismatch("nonce differs".into()));
    }
    if grant.audience != request.audience {
        return Err(ProofError::GrantMismatch("audience differs".into()));
    }
    if !grant.is_signed() {
        return Err(ProofError::GrantMismatch("grant is not signed".into()));
    }
    Ok(())
}

fn dedup(ids: &[String]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    ids.iter()
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tether_adapters::{AdapterRegistry, SourceRef};
    use tether_core::{get_json, DeckId, RequestId};
    use tether_cred::{ClaimValue, Claims, CredentialIssuer, IssueRequest};
    use tether_policy::{DeckRegistry, BASIC_IDENTITY_DECK};
    use tether_vault::{InMemoryRecordStore, KeySigner};

    const NOW: u64 = 1_700_000_000;

    fn ts(s: u64) -> Timestamp {
        Timestamp::from_seconds(s)
    }

    fn request(required: &[&str]) -> ProofRequest {
        ProofRequest {
            request_id: RequestId::new("req-1"),
            audience: "app".into(),
            required_permissions: required.iter().map(|s| s.to_string()).collect(),
            nonce: "ab".repeat(32),
            issued_at: ts(NOW).to_rfc3339(),
            expires_at: ts(NOW + 300).to_rfc3339(),
            protocol_version: "1.0".into(),
            extra: Default::default(),
        }
    }

    fn prover() -> Prover {
        Prover::new(Arc::new(KeySigner::generate()), ProtocolConfig::default())
    }

    fn issue(claims: &[(&str, bool)], ttl: Option<u64>) -> VerifiableCredential {
        let issuer = CredentialIssuer::new(Arc::new(KeySigner::generate()));
        let claims: Claims = claims
            .iter()
            .map(|(k, v)| (k.to_string(), ClaimValue::Bool(*v)))
            .collect();
        issuer
            .issue_credential_at(
                IssueRequest {
                    subject_id: "holder".into(),
                    claims,
                    expires_in_seconds: ttl,
                },
                ts(NOW),
            )
            .unwrap()
    }

    #[test]
    fn test_grant_echoes_request() {
        let prover = prover();
        let req = request(&["age_over_18", "age_over_18", "email_verified"]);
        let grant = prover.create_consent_grant_at(&req, None, ts(NOW)).unwrap();
        assert_eq!(grant.nonce, req.nonce);
        assert_eq!(grant.audience, req.audience);
        assert_eq!(grant.expires_at, req.expires_at);
        assert_eq!(grant.permissions, vec!["age_over_18", "email_verified"]);
        assert_eq!(grant.signer.id, prover.did());
        assert_eq!(grant.signature.len(), 128);
    }

    #[test]
    fn test_grant_may_only_narrow() {
        let prover = prover();
        let req = request(&["age_over_18"]);
        let extra = vec!["admin".to_string()];
        assert!(matches!(
            prover.create_consent_grant_at(&req, Some(&extra), ts(NOW)),
            Err(ProofError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_grant_for_expired_request_refused() {
        let prover = prover();
        let req = request(&["age_over_18"]);
        assert!(prover.create_consent_grant_at(&req, None, ts(NOW + 300)).is_err());
    }

    #[test]
    fn test_unsupported_version_refused() {
        let prover = prover();
        let mut req = request(&["age_over_18"]);
        req.protocol_version = "2.0".into();
        let err = prover.create_consent_grant_at(&req, None, ts(NOW)).unwrap_err();
        assert_eq!(err.code(), Some(tether_core::ErrorCode::UnsupportedProtocolVersion));
    }

    #[test]
    fn test_proof_requires_matching_grant() {
        let prover = prover();
        let req = request(&["age_over_18"]);
        let mut grant = prover.create_consent_grant_at(&req, None, ts(NOW)).unwrap();
        grant.nonce = "cd".repeat(32);
        assert!(matches!(
            prover.generate_proof_at(&req, &grant, ProofOptions::default(), ts(NOW)),
            Err(ProofError::GrantMismatch(_))
        ));
    }

    #[test]
    fn test_unsigned_grant_cannot_back_proof() {
        let prover = prover();
        let req = request(&["age_over_18"]);
        let (grant, _) = prover
            .prepare_grant_at(&req, "xrpl", "rAccount", None, ts(NOW))
            .unwrap();
        assert!(matches!(
            prover.generate_proof_at(&req, &grant, ProofOptions::default(), ts(NOW)),
            Err(ProofError::GrantMismatch(_))
        ));
    }

    #[test]
    fn test_proof_limited_to_consent() {
        let prover = prover();
        let req = request(&["age_over_18", "email_verified"]);
        let subset = vec!["age_over_18".to_string()];
        let grant = prover
            .create_consent_grant_at(&req, Some(&subset), ts(NOW))
            .unwrap();
        let proof = prover
            .generate_proof_at(&req, &grant, ProofOptions::default(), ts(NOW))
            .unwrap();
        assert_eq!(proof.satisfied_permissions, vec!["age_over_18"]);
        assert!(!proof.verified);
    }

    #[test]
    fn test_proof_binding_and_expiry() {
        let prover = prover();
        let req = request(&["age_over_18"]);
        let grant = prover.create_consent_grant_at(&req, None, ts(NOW)).unwrap();
        let proof = prover
            .generate_proof_at(&req, &grant, ProofOptions::default(), ts(NOW + 100))
            .unwrap();
        assert_eq!(proof.binding.request_hash, req.hash().unwrap());
        assert!(proof.binding.credential_id.is_none());
        // Capped at the request's expiry
        assert_eq!(proof.expires_at, req.expires_at);
        assert!(proof.verified);
    }

    #[test]
    fn test_pairwise_prover_id() {
        let store: Arc<dyn RecordStore> = Arc::new(InMemoryRecordStore::new());
        let prover = prover().with_store(Arc::clone(&store));
        let req = request(&["age_over_18"]);
        let grant = prover.create_consent_grant_at(&req, None, ts(NOW)).unwrap();
        let proof = prover
            .generate_proof_at(&req, &grant, ProofOptions::default(), ts(NOW))
            .unwrap();
        assert_eq!(proof.prover.prover_type, PROVER_TYPE_PAIRWISE);
        assert_eq!(proof.prover.id, pairwise_id(prover.did(), "app"));

        let record: serde_json::Value = get_json(store.as_ref(), RecordKind::PairwiseId, &proof.prover.id)
            .unwrap()
            .unwrap();
        assert_eq!(record["audience"], "app");
        assert!(!record.to_string().contains(prover.did()));
    }

    #[test]
    fn test_direct_did_when_pairwise_disabled() {
        let config = ProtocolConfig {
            pairwise_identifiers: false,
            ..Default::default()
        };
        let prover = Prover::new(Arc::new(KeySigner::generate()), config);
        let req = request(&["age_over_18"]);
        let grant = prover.create_consent_grant_at(&req, None, ts(NOW)).unwrap();
        let proof = prover
            .generate_proof_at(&req, &grant, ProofOptions::default(), ts(NOW))
            .unwrap();
        assert_eq!(proof.prover.id, prover.did());
    }

    #[test]
    fn test_credential_missing_claim_fails() {
        let prover = prover();
        let req = request(&["age_over_18", "email_verified"]);
        let grant = prover.create_consent_grant_at(&req, None, ts(NOW)).unwrap();
        let cred = issue(&[("age_over_18", true)], None);
        let options = ProofOptions {
            credential: Some(&cred),
            ..Default::default()
        };
        let err = prover.generate_proof_at(&req, &grant, options, ts(NOW)).unwrap_err();
        assert!(matches!(err, ProofError::MissingClaims(ref m) if m == &["email_verified"]));
    }

    #[test]
    fn test_credential_false_claim_counts_as_missing() {
        let prover = prover();
        let req = request(&["age_over_18"]);
        let grant = prover.create_consent_grant_at(&req, None, ts(NOW)).unwrap();
        let cred = issue(&[("age_over_18", false)], None);
        let options = ProofOptions {
            credential: Some(&cred),
            ..Default::default()
        };
        assert!(matches!(
            prover.generate_proof_at(&req, &grant, options, ts(NOW)),
            Err(ProofError::MissingClaims(_))
        ));
    }

    #[test]
    fn test_expired_credential_fails() {
        let prover = prover();
        let req = request(&["age_over_18"]);
        let grant = prover.create_consent_grant_at(&req, None, ts(NOW)).unwrap();
        let cred = issue(&[("age_over_18", true)], Some(10));
        let options = ProofOptions {
            credential: Some(&cred),
            ..Default::default()
        };
        assert!(matches!(
            prover.generate_proof_at(&req, &grant, options, ts(NOW + 11)),
            Err(ProofError::CredentialInvalid(_))
        ));
    }

    #[test]
    fn test_credential_binding() {
        let prover = prover();
        let req = request(&["age_over_18"]);
        let grant = prover.create_consent_grant_at(&req, None, ts(NOW)).unwrap();
        let cred = issue(&[("age_over_18", true), ("email_verified", true)], None);
        let options = ProofOptions {
            credential: Some(&cred),
            ..Default::default()
        };
        let proof = prover.generate_proof_at(&req, &grant, options, ts(NOW)).unwrap();
        assert_eq!(proof.binding.credential_id.as_ref(), Some(&cred.id));
        assert_eq!(proof.binding.credential_hash, Some(cred.credential_hash().unwrap()));
        // Only what was asked for is disclosed
        assert_eq!(proof.satisfied_permissions, vec!["age_over_18"]);
    }

    #[test]
    fn test_proof_from_deck() {
        let adapters = Arc::new(AdapterRegistry::with_defaults().unwrap());
        let decks = Arc::new(DeckRegistry::with_defaults().unwrap());
        let evaluator = DeckEvaluator::new(decks, adapters);
        let mut instance = DeckInstance::new(DeckId::new(BASIC_IDENTITY_DECK), "did:key:holder");
        instance.bind(
            "age_over_18",
            SourceRef::new("vc", "urn:cred:1").with_issuer("did:key:issuer"),
        );

        let prover = prover();
        let req = request(&["age_over_18", "email_verified"]);
        let grant = prover.create_consent_grant_at(&req, None, ts(NOW)).unwrap();
        let options = ProofOptions {
            deck: Some((&evaluator, &instance)),
            ..Default::default()
        };
        let proof = prover.generate_proof_at(&req, &grant, options, ts(NOW)).unwrap();
        assert_eq!(proof.satisfied_permissions, vec!["age_over_18"]);
        assert!(!proof.verified);
    }

    #[test]
    fn test_proof_from_store() {
        let store: Arc<dyn RecordStore> = Arc::new(InMemoryRecordStore::new());
        let credentials = CredentialStore::new(Arc::clone(&store));
        let issuer = CredentialIssuer::new(Arc::new(KeySigner::generate()));
        let mut claims = Claims::new();
        claims.insert("age_over_18".into(), ClaimValue::Bool(true));
        let cred = issuer
            .issue_credential(IssueRequest {
                subject_id: "holder".into(),
                claims,
                expires_in_seconds: None,
            })
            .unwrap();
        credentials.save(&cred).unwrap();

        let prover = prover();
        let now = Timestamp::now();
        let mut req = request(&["age_over_18"]);
        req.issued_at = now.to_rfc3339();
        req.expires_at = now.plus_seconds(300).to_rfc3339();
        let grant = prover.create_consent_grant(&req, None).unwrap();

        let proof = prover
            .generate_proof_from_store(&req, &grant, &credentials, "holder")
            .unwrap();
        assert_eq!(proof.binding.credential_id, Some(cred.id));

        assert!(matches!(
            prover.generate_proof_from_store(&req, &grant, &credentials, "someone-else"),
            Err(ProofError::MissingClaims(_))
        ));
    }
}
