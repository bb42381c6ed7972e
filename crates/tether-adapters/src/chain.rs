use serde::{Deserialize, Serialize};
use serde_json::Value;
use tether_core::{verify_ed25519_hex, ErrorCode};

// ---------------------------------------------------------------------------
// SignatureMeta: per-signer-type metadata carried by an external grant
// ---------------------------------------------------------------------------

/// Signer-specific signature metadata, tagged by signer type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SignatureMeta {
    #[serde(rename_all = "camelCase")]
    Did { verification_method: String },
    #[serde(rename_all = "camelCase")]
    Xrpl { tx_hash: String, account: String },
    #[serde(rename_all = "camelCase")]
    Cardano { address: String, key: String },
}

impl SignatureMeta {
    /// Signer type this metadata belongs to.
    pub fn signer_type(&self) -> &'static str {
        match self {
            SignatureMeta::Did { .. } => "did",
            SignatureMeta::Xrpl { .. } => "xrpl",
            SignatureMeta::Cardano { .. } => "cardano",
        }
    }
}

/// The parts of a consent grant a chain verifier needs.
#[derive(Debug, Clone, Copy)]
pub struct GrantSignature<'a> {
    pub signer_type: &'a str,
    pub signer_id: &'a str,
    pub signature: &'a str,
    pub meta: Option<&'a SignatureMeta>,
}

/// Outcome of a chain verifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainVerification {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

impl ChainVerification {
    pub fn ok() -> Self {
        Self {
            valid: true,
            error_code: None,
            message: None,
            meta: None,
        }
    }

    pub fn fail(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            valid: false,
            error_code: Some(code),
            message: Some(message.into()),
            meta: None,
        }
    }

    pub fn with_meta(mut self, meta: Value) -> Self {
        self.meta = Some(meta);
        self
    }
}

/// Verifies a grant signed outside the prover's own key custody (a ledger
/// transaction, a wallet signature).
///
/// `expected_consent_hash` is the hash of the canonical grant without its
/// signature fields; the external signature must commit to it.
pub trait ChainVerifier: Send + Sync {
    fn verify_grant(&self, grant: &GrantSignature<'_>, expected_consent_hash: &str) -> ChainVerification;
}

// ---------------------------------------------------------------------------
// Ed25519WalletVerifier: a raw Ed25519 key signing the consent hash
// ---------------------------------------------------------------------------

/// Default verifier for the `ed25519` signer type: the signer id is the hex
/// public key and the signature is over the ASCII consent hash.
#[derive(Debug, Default, Clone, Copy)]
pub struct Ed25519WalletVerifier;

impl ChainVerifier for Ed25519WalletVerifier {
    fn verify_grant(&self, grant: &GrantSignature<'_>, expected_consent_hash: &str) -> ChainVerification {
        let key: Option<[u8; 32]> = hex::decode(grant.signer_id)
            .ok()
            .and_then(|bytes| bytes.try_into().ok());
        let Some(key) = key else {
            return ChainVerification::fail(
                ErrorCode::SignatureInvalid,
                "ed25519 signer id is not a 32-byte hex key",
            );
        };
        if verify_ed25519_hex(&key, expected_consent_hash.as_bytes(), grant.signature) {
            ChainVerification::ok()
        } else {
            ChainVerification::fail(
                ErrorCode::SignatureInvalid,
                "ed25519 signature does not cover the consent hash",
            )
        }
    }
}
