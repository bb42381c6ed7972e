//! Wire messages: request, consent grant and proof response.
//!
//! Field names are camelCase and timestamps stay in their wire string form,
//! so hashing a parsed message reproduces the received bytes' canonical
//! form. Unknown fields land in `extra` and are hashed with everything else.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tether_adapters::SignatureMeta;
use tether_core::{
    canonical_json, hash_canonical, sha256_hex, CoreError, CoreResult, CredentialId, GrantId,
    ProofId, RequestId, Timestamp,
};

// ---------------------------------------------------------------------------
// ProofRequest
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofRequest {
    pub request_id: RequestId,
    pub audience: String,
    pub required_permissions: Vec<String>,
    /// Hex-encoded random nonce.
    pub nonce: String,
    pub issued_at: String,
    pub expires_at: String,
    pub protocol_version: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ProofRequest {
    /// Binding hash: SHA-256 of the canonical request, unknown fields included.
    pub fn hash(&self) -> CoreResult<String> {
        hash_canonical(self)
    }

    pub fn issued_at_ts(&self) -> Option<Timestamp> {
        Timestamp::parse_wire(&self.issued_at)
    }

    pub fn expires_at_ts(&self) -> Option<Timestamp> {
        Timestamp::parse_wire(&self.expires_at)
    }
}

// ---------------------------------------------------------------------------
// ConsentGrant
// ---------------------------------------------------------------------------

/// Who signed a grant. `signer_type` selects the verification path: `did`
/// is verified locally through DID resolution, anything else goes to the
/// chain verifier registered under that type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerRef {
    #[serde(rename = "type")]
    pub signer_type: String,
    pub id: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

pub const SIGNER_TYPE_DID: &str = "did";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentGrant {
    pub grant_id: GrantId,
    pub request_id: RequestId,
    pub audience: String,
    pub nonce: String,
    pub permissions: Vec<String>,
    pub issued_at: String,
    pub expires_at: String,
    pub signer: SignerRef,
    #[serde(default)]
    pub signature: String,
    /// Free-form consent text or structure shown to the holder.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consent: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature_meta: Option<SignatureMeta>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ConsentGrant {
    /// Canonical bytes covered by the signature: every field except
    /// `signature` and `signatureMeta`.
    pub fn signable_bytes(&self) -> CoreResult<Vec<u8>> {
        let mut value = serde_json::to_value(self)?;
        let Value::Object(map) = &mut value else {
            return Err(CoreError::Serialization("grant is not an object".into()));
        };
        map.remove("signature");
        map.remove("signatureMeta");
        Ok(canonical_json(&value).into_bytes())
    }

    /// Hash an external wallet commits to.
    pub fn consent_hash(&self) -> CoreResult<String> {
        Ok(sha256_hex(&self.signable_bytes()?))
    }

    /// Attach a signature produced outside the prover (wallet, ledger).
    pub fn attach_external_signature(
        &mut self,
        signature: impl Into<String>,
        meta: Option<SignatureMeta>,
    ) {
        self.signature = signature.into();
        self.signature_meta = meta;
    }

    pub fn is_signed(&self) -> bool {
        !self.signature.is_empty()
    }
}

// ---------------------------------------------------------------------------
// ProofResponse
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofBinding {
    pub request_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_id: Option<CredentialId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_hash: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProverRef {
    #[serde(rename = "type")]
    pub prover_type: String,
    pub id: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

pub const PROVER_TYPE_PAIRWISE: &str = "pairwise";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofResponse {
    pub proof_id: ProofId,
    pub request_id: RequestId,
    pub audience: String,
    pub nonce: String,
    pub satisfied_permissions: Vec<String>,
    /// True when `satisfied_permissions` covers every required permission.
    pub verified: bool,
    pub binding: ProofBinding,
    pub prover: ProverRef,
    pub issued_at: String,
    pub expires_at: String,
    pub protocol_version: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ProofResponse {
    pub fn hash(&self) -> CoreResult<String> {
        hash_canonical(self)
    }
}
