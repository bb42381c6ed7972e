use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tether_core::{canonical_json, hash_canonical, CoreError, CoreResult, CredentialId, Timestamp};

/// Current credential format version.
pub const CREDENTIAL_VERSION: &str = "1.0";

// ---------------------------------------------------------------------------
// ClaimValue: boolean, number or string
// ---------------------------------------------------------------------------

/// A claim value. Numbers keep their exact JSON representation so the
/// signed payload is byte-stable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClaimValue {
    Bool(bool),
    Number(serde_json::Number),
    String(String),
}

impl ClaimValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ClaimValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ClaimValue::String(v) => Some(v),
            _ => None,
        }
    }

    /// Every value except boolean `false` grants the claim's permission.
    pub fn grants(&self) -> bool {
        !matches!(self, ClaimValue::Bool(false))
    }
}

impl From<bool> for ClaimValue {
    fn from(v: bool) -> Self {
        ClaimValue::Bool(v)
    }
}

impl From<i64> for ClaimValue {
    fn from(v: i64) -> Self {
        ClaimValue::Number(v.into())
    }
}

impl From<&str> for ClaimValue {
    fn from(v: &str) -> Self {
        ClaimValue::String(v.to_string())
    }
}

impl From<String> for ClaimValue {
    fn from(v: String) -> Self {
        ClaimValue::String(v)
    }
}

pub type Claims = BTreeMap<String, ClaimValue>;

// ---------------------------------------------------------------------------
// VerifiableCredential
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialProof {
    /// Hex Ed25519 signature over the canonical signable payload.
    pub signature: String,
    /// DID URL of the issuer key, `<issuer did>#key-1`.
    pub verification_method: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiableCredential {
    pub id: CredentialId,
    pub issuer: String,
    pub subject: String,
    pub issued_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
    pub claims: Claims,
    pub proof: CredentialProof,
    pub version: String,
    /// Unknown fields. Signed and hashed like the rest of the credential.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl VerifiableCredential {
    /// Canonical bytes the issuer signs: every field except `proof`,
    /// unknown fields included, with `expiresAt` present as `null` when
    /// absent.
    pub fn signable_bytes(&self) -> CoreResult<Vec<u8>> {
        let mut value = serde_json::to_value(self)?;
        let Value::Object(map) = &mut value else {
            return Err(CoreError::Serialization("credential is not an object".into()));
        };
        map.remove("proof");
        map.entry("expiresAt").or_insert(Value::Null);
        Ok(canonical_json(&value).into_bytes())
    }

    /// Hash of the whole credential, proof included. Proofs bind to this.
    pub fn credential_hash(&self) -> CoreResult<String> {
        hash_canonical(self)
    }

    /// Expired if `expiresAt` is before `now`. An unparseable expiry counts
    /// as expired.
    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        match self.expires_at.as_deref() {
            None => false,
            Some(raw) => match Timestamp::parse_wire(raw) {
                Some(expires) => expires < now,
                None => true,
            },
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Timestamp::now())
    }

    pub fn claim(&self, name: &str) -> Option<&ClaimValue> {
        self.claims.get(name)
    }

    pub fn to_value(&self) -> CoreResult<Value> {
        Ok(serde_json::to_value(self)?)
    }
}
