//! Credential issuance and signature verification.
//!
//! Signing is delegated to a `Signer`; the issuer never touches raw key
//! material. The issuer DID is the signer's did:key, so verification needs
//! nothing beyond the credential itself.

use std::sync::Arc;

use tether_core::{pubkey_from_did_key, verify_ed25519_hex, CredentialId, Signer, Timestamp};
use tracing::{debug, info};

use crate::claims::missing_claims;
use crate::error::{CredError, CredErrorDetail, CredResult};
use crate::types::{Claims, CredentialProof, VerifiableCredential, CREDENTIAL_VERSION};

/// Longest accepted claim name.
pub const MAX_CLAIM_NAME_LENGTH: usize = 128;

/// Input to [`CredentialIssuer::issue_credential`].
#[derive(Debug, Clone)]
pub struct IssueRequest {
    pub subject_id: String,
    pub claims: Claims,
    pub expires_in_seconds: Option<u64>,
}

pub struct CredentialIssuer {
    signer: Arc<dyn Signer>,
    did: String,
}

impl CredentialIssuer {
    pub fn new(signer: Arc<dyn Signer>) -> Self {
        let did = signer.did();
        Self { signer, did }
    }

    pub fn did(&self) -> &str {
        &self.did
    }

    pub fn issue_credential(&self, request: IssueRequest) -> CredResult<VerifiableCredential> {
        self.issue_credential_at(request, Timestamp::now())
    }

    /// Issue with an explicit issuance instant.
    pub fn issue_credential_at(
        &self,
        request: IssueRequest,
        now: Timestamp,
    ) -> CredResult<VerifiableCredential> {
        validate_request(&request)?;

        let mut credential = VerifiableCredential {
            id: CredentialId::generate(),
            issuer: self.did.clone(),
            subject: request.subject_id,
            issued_at: now.to_rfc3339(),
            expires_at: request
                .expires_in_seconds
                .map(|secs| now.plus_seconds(secs).to_rfc3339()),
            claims: request.claims,
            proof: CredentialProof {
                signature: String::new(),
                verification_method: format!("{}#key-1", self.did),
                extra: Default::default(),
            },
            version: CREDENTIAL_VERSION.to_string(),
            extra: Default::default(),
        };

        let signable = credential.signable_bytes().map_err(|_| {
            CredErrorDetail::new(CredError::EncodingFailed, "credential payload not encodable")
        })?;
        let signature = self
            .signer
            .sign_ed25519(&signable)
            .map_err(|_| CredErrorDetail::new(CredError::SigningFailed, "signer failed"))?;
        credential.proof.signature = hex::encode(signature);

        info!(
            credential_id = %credential.id,
            subject = %credential.subject,
            claims = credential.claims.len(),
            "issued credential"
        );
        Ok(credential)
    }
}

fn validate_request(request: &IssueRequest) -> CredResult<()> {
    if request.subject_id.trim().is_empty() {
        return Err(CredErrorDetail::new(
            CredError::SchemaViolation("empty subject".into()),
            "subject id is required",
        ));
    }
    if request.claims.is_empty() {
        return Err(CredErrorDetail::new(
            CredError::SchemaViolation("no claims".into()),
            "a credential needs at least one claim",
        ));
    }
    for name in request.claims.keys() {
        if name.is_empty() || name.len() > MAX_CLAIM_NAME_LENGTH {
            return Err(CredErrorDetail::new(
                CredError::SchemaViolation("claim name length".into()),
                format!("claim names must be 1..={} bytes", MAX_CLAIM_NAME_LENGTH),
            ));
        }
    }
    Ok(())
}

/// Recompute the signable payload and check the issuer's signature.
///
/// The verification method must be a did:key URL of the issuer itself; a
/// credential signed by any other key is rejected.
pub fn verify_credential_signature(credential: &VerifiableCredential) -> bool {
    let method_did = credential
        .proof
        .verification_method
        .split('#')
        .next()
        .unwrap_or_default();
    if method_did != credential.issuer {
        debug!(credential_id = %credential.id, "verification method is not the issuer's key");
        return false;
    }
    let Some(pubkey) = pubkey_from_did_key(method_did) else {
        debug!(credential_id = %credential.id, "issuer is not a did:key");
        return false;
    };
    let Ok(signable) = credential.signable_bytes() else {
        return false;
    };
    verify_ed25519_hex(&pubkey, &signable, &credential.proof.signature)
}

/// Whether a holder may present `credential` for `required` at `now`.
///
/// Checks run in order: claim coverage, expiry, signature. The first
/// failure is returned with the credential id attached.
pub fn check_presentable(
    credential: &VerifiableCredential,
    required: &[String],
    now: Timestamp,
) -> CredResult<()> {
    let missing = missing_claims(&credential.claims, required);
    let failure = if !missing.is_empty() {
        CredErrorDetail::from(CredError::MissingClaims(missing))
    } else if credential.is_expired_at(now) {
        CredErrorDetail::new(CredError::CredentialExpired, "credential has expired")
    } else if !verify_credential_signature(credential) {
        CredErrorDetail::new(CredError::InvalidSignature, "credential signature invalid")
    } else {
        return Ok(());
    };
    Err(failure.with_credential_id(credential.id.as_str()))
}
