//! Structural validation of wire messages.
//!
//! Every problem is collected; nothing short-circuits. Each issue carries
//! the most specific error code available, `MALFORMED_INPUT` otherwise.

use tether_core::{is_hash_hex, ErrorCode, Nonce, Timestamp};

use crate::limits::Limits;
use crate::messages::{ConsentGrant, ProofRequest, ProofResponse};
use crate::version::VersionPolicy;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaIssue {
    pub code: ErrorCode,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct SchemaReport {
    pub issues: Vec<SchemaIssue>,
}

impl SchemaReport {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }

    fn push(&mut self, code: ErrorCode, message: impl Into<String>) {
        self.issues.push(SchemaIssue {
            code,
            message: message.into(),
        });
    }

    fn require(&mut self, what: &str, field: &str, value: &str) {
        if value.trim().is_empty() {
            self.push(ErrorCode::MalformedInput, format!("{}: {} is required", what, field));
        }
    }

    fn timestamp(&mut self, what: &str, field: &str, value: &str) {
        if Timestamp::parse_wire(value).is_none() {
            self.push(
                ErrorCode::InvalidTimestampFormat,
                format!("{}: {} is not a valid timestamp", what, field),
            );
        }
    }

    fn permissions(&mut self, what: &str, permissions: &[String], limits: &Limits) {
        if let Err((code, message)) = limits.check_permissions(permissions) {
            self.push(code, format!("{}: {}", what, message));
        }
    }

    fn version(&mut self, what: &str, value: &str, versions: &VersionPolicy) {
        if let Err(code) = versions.check(value) {
            self.push(code, format!("{}: unsupported protocol version {:?}", what, value));
        }
    }

    fn nonce(&mut self, what: &str, value: &str) {
        if !Nonce::is_acceptable_hex(value) {
            self.push(
                ErrorCode::MalformedInput,
                format!("{}: nonce must be hex with at least 16 bytes", what),
            );
        }
    }
}

pub fn validate_request(
    report: &mut SchemaReport,
    request: &ProofRequest,
    limits: &Limits,
    versions: &VersionPolicy,
) {
    const WHAT: &str = "request";
    report.require(WHAT, "requestId", request.request_id.as_str());
    report.require(WHAT, "audience", &request.audience);
    if request.required_permissions.is_empty() {
        report.push(ErrorCode::MalformedInput, "request: requiredPermissions is empty");
    }
    report.permissions(WHAT, &request.required_permissions, limits);
    report.nonce(WHAT, &request.nonce);
    report.timestamp(WHAT, "issuedAt", &request.issued_at);
    report.timestamp(WHAT, "expiresAt", &request.expires_at);
    report.version(WHAT, &request.protocol_version, versions);
}

pub fn validate_proof(
    report: &mut SchemaReport,
    proof: &ProofResponse,
    limits: &Limits,
    versions: &VersionPolicy,
) {
    const WHAT: &str = "proof";
    report.require(WHAT, "proofId", proof.proof_id.as_str());
    report.require(WHAT, "requestId", proof.request_id.as_str());
    report.require(WHAT, "audience", &proof.audience);
    report.require(WHAT, "nonce", &proof.nonce);
    report.permissions(WHAT, &proof.satisfied_permissions, limits);
    if !is_hash_hex(&proof.binding.request_hash) {
        report.push(
            ErrorCode::MalformedInput,
            "proof: binding.requestHash must be 64 lowercase hex chars",
        );
    }
    if let Some(hash) = &proof.binding.credential_hash {
        if !is_hash_hex(hash) {
            report.push(
                ErrorCode::MalformedInput,
                "proof: binding.credentialHash must be 64 lowercase hex chars",
            );
        }
    }
    report.require(WHAT, "prover.type", &proof.prover.prover_type);
    report.require(WHAT, "prover.id", &proof.prover.id);
    report.timestamp(WHAT, "issuedAt", &proof.issued_at);
    report.timestamp(WHAT, "expiresAt", &proof.expires_at);
    report.version(WHAT, &proof.protocol_version, versions);
}

pub fn validate_grant(report: &mut SchemaReport, grant: &ConsentGrant, limits: &Limits) {
    const WHAT: &str = "grant";
    report.require(WHAT, "grantId", grant.grant_id.as_str());
    report.require(WHAT, "requestId", grant.request_id.as_str());
    report.require(WHAT, "audience", &grant.audience);
    report.require(WHAT, "nonce", &grant.nonce);
    report.permissions(WHAT, &grant.permissions, limits);
    report.require(WHAT, "signer.type", &grant.signer.signer_type);
    report.require(WHAT, "signer.id", &grant.signer.id);
    report.require(WHAT, "signature", &grant.signature);
    report.timestamp(WHAT, "issuedAt", &grant.issued_at);
    report.timestamp(WHAT, "expiresAt", &grant.expires_at);
    if let Some(meta) = &grant.signature_meta {
        if !meta
            .signer_type()
            .eq_ignore_ascii_case(&grant.signer.signer_type)
        {
            report.push(
                ErrorCode::MalformedInput,
                format!(
                    "grant: signatureMeta is for {} but signer type is {}",
                    meta.signer_type(),
                    grant.signer.signer_type
                ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{ProofBinding, ProverRef, SignerRef};
    use serde_json::Map;
    use tether_adapters::SignatureMeta;
    use tether_core::{GrantId, ProofId, RequestId};

    fn request() -> ProofRequest {
        ProofRequest {
            request_id: RequestId::new("req-1"),
            audience: "app".into(),
            required_permissions: vec!["age_over_18".into()],
            nonce: "ab".repeat(32),
            issued_at: "2023-11-14T22:13:20Z".into(),
            expires_at: "2023-11-14T22:18:20Z".into(),
            protocol_version: "1.0".into(),
            extra: Map::new(),
        }
    }

    fn proof() -> ProofResponse {
        ProofResponse {
            proof_id: ProofId::new("p-1"),
            request_id: RequestId::new("req-1"),
            audience: "app".into(),
            nonce: "ab".repeat(32),
            satisfied_permissions: vec!["age_over_18".into()],
            verified: true,
            binding: ProofBinding {
                request_hash: "a".repeat(64),
                credential_id: None,
                credential_hash: None,
                extra: Map::new(),
            },
            prover: ProverRef {
                prover_type: "did".into(),
                id: "did:key:z6Mk".into(),
                extra: Map::new(),
            },
            issued_at: "2023-11-14T22:13:20Z".into(),
            expires_at: "2023-11-14T22:18:20Z".into(),
            protocol_version: "1.0".into(),
            extra: Map::new(),
        }
    }

    fn grant() -> ConsentGrant {
        ConsentGrant {
            grant_id: GrantId::new("g-1"),
            request_id: RequestId::new("req-1"),
            audience: "app".into(),
            nonce: "ab".repeat(32),
            permissions: vec!["age_over_18".into()],
            issued_at: "2023-11-14T22:13:20Z".into(),
            expires_at: "2023-11-14T22:18:20Z".into(),
            signer: SignerRef {
                signer_type: "did".into(),
                id: "did:key:z6Mk".into(),
                extra: Map::new(),
            },
            signature: "00".repeat(64),
            consent: None,
            signature_meta: None,
            extra: Map::new(),
        }
    }

    fn codes(report: &SchemaReport) -> Vec<ErrorCode> {
        report.issues.iter().map(|i| i.code).collect()
    }

    #[test]
    fn test_valid_messages() {
        let mut report = SchemaReport::default();
        validate_request(&mut report, &request(), &Limits::default(), &VersionPolicy::default());
        validate_proof(&mut report, &proof(), &Limits::default(), &VersionPolicy::default());
        validate_grant(&mut report, &grant(), &Limits::default());
        assert!(report.is_valid(), "{:?}", report.issues);
    }

    #[test]
    fn test_request_issues_accumulate() {
        let mut bad = request();
        bad.audience = String::new();
        bad.nonce = "abc".into();
        bad.issued_at = "yesterday".into();
        bad.protocol_version = "2.0".into();
        let mut report = SchemaReport::default();
        validate_request(&mut report, &bad, &Limits::default(), &VersionPolicy::default());
        assert_eq!(
            codes(&report),
            vec![
                ErrorCode::MalformedInput,
                ErrorCode::MalformedInput,
                ErrorCode::InvalidTimestampFormat,
                ErrorCode::UnsupportedProtocolVersion,
            ]
        );
    }

    #[test]
    fn test_request_limits() {
        let mut bad = request();
        bad.required_permissions = (0..65).map(|i| format!("p{}", i)).collect();
        let mut report = SchemaReport::default();
        validate_request(&mut report, &bad, &Limits::default(), &VersionPolicy::default());
        assert_eq!(codes(&report), vec![ErrorCode::TooManyPermissions]);

        bad.required_permissions = vec!["x".repeat(129)];
        let mut report = SchemaReport::default();
        validate_request(&mut report, &bad, &Limits::default(), &VersionPolicy::default());
        assert_eq!(codes(&report), vec![ErrorCode::PermissionIdTooLong]);
    }

    #[test]
    fn test_proof_hash_shape() {
        let mut bad = proof();
        bad.binding.request_hash = "A".repeat(64);
        let mut report = SchemaReport::default();
        validate_proof(&mut report, &bad, &Limits::default(), &VersionPolicy::default());
        assert_eq!(codes(&report), vec![ErrorCode::MalformedInput]);
    }

    #[test]
    fn test_grant_meta_must_match_signer_type() {
        let mut bad = grant();
        bad.signature_meta = Some(SignatureMeta::Cardano {
            address: "addr1".into(),
            key: "ed25519_pk1".into(),
        });
        let mut report = SchemaReport::default();
        validate_grant(&mut report, &bad, &Limits::default());
        assert_eq!(codes(&report), vec![ErrorCode::MalformedInput]);
        assert!(report.issues[0].message.contains("cardano"));
    }

    #[test]
    fn test_unsigned_grant_rejected() {
        let mut bad = grant();
        bad.signature = String::new();
        let mut report = SchemaReport::default();
        validate_grant(&mut report, &bad, &Limits::default());
        assert!(!report.is_valid());
    }
}
