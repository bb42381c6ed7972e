use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tether_core::pubkey_from_did_key;

pub const ED25519_VERIFICATION_KEY_2018: &str = "Ed25519VerificationKey2018";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationMethod {
    pub id: String,
    #[serde(rename = "type")]
    pub method_type: String,
    pub controller: String,
    pub public_key_base58: String,
}

/// Minimal DID Document: the subject and its verification methods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DidDocument {
    pub id: String,
    #[serde(default)]
    pub verification_method: Vec<VerificationMethod>,
}

impl DidDocument {
    /// Document with a single Ed25519 verification method `<did>#key-1`.
    pub fn with_ed25519_key(did: &str, public_key: &[u8; 32]) -> Self {
        Self {
            id: did.to_string(),
            verification_method: vec![VerificationMethod {
                id: format!("{}#key-1", did),
                method_type: ED25519_VERIFICATION_KEY_2018.to_string(),
                controller: did.to_string(),
                public_key_base58: bs58::encode(public_key).into_string(),
            }],
        }
    }

    /// First Ed25519 key in the document, or the one whose id matches
    /// `method_id` when given.
    pub fn ed25519_key(&self, method_id: Option<&str>) -> Option<[u8; 32]> {
        self.verification_method
            .iter()
            .filter(|vm| vm.method_type == ED25519_VERIFICATION_KEY_2018)
            .find(|vm| method_id.map_or(true, |id| vm.id == id))
            .and_then(|vm| bs58::decode(&vm.public_key_base58).into_vec().ok())
            .and_then(|bytes| bytes.try_into().ok())
    }
}

/// Outcome of a DID resolution. Unsupported methods and malformed DIDs are
/// distinct from "not found" so callers can tell "unknown" from "denied".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DidResolution {
    Resolved(DidDocument),
    NotFound,
    MethodNotSupported(String),
    InvalidDid(String),
}

impl DidResolution {
    pub fn document(&self) -> Option<&DidDocument> {
        match self {
            DidResolution::Resolved(doc) => Some(doc),
            _ => None,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            DidResolution::Resolved(doc) => format!("resolved {}", doc.id),
            DidResolution::NotFound => "DID not found".to_string(),
            DidResolution::MethodNotSupported(m) => format!("DID method not supported: {}", m),
            DidResolution::InvalidDid(d) => format!("invalid DID: {}", d),
        }
    }
}

pub trait DidResolver: Send + Sync {
    fn resolve(&self, did: &str) -> DidResolution;
}

/// Split `did:<method>:<specific-id>` into its method and specific id.
pub fn parse_did(did: &str) -> Option<(&str, &str)> {
    let rest = did.strip_prefix("did:")?;
    let (method, specific) = rest.split_once(':')?;
    let method_ok = !method.is_empty()
        && method
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit());
    if !method_ok || specific.is_empty() {
        return None;
    }
    Some((method, specific))
}

// ---------------------------------------------------------------------------
// DidKeyResolver: self-certifying did:key (Ed25519)
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Clone, Copy)]
pub struct DidKeyResolver;

impl DidResolver for DidKeyResolver {
    fn resolve(&self, did: &str) -> DidResolution {
        let did = did.split('#').next().unwrap_or(did);
        match pubkey_from_did_key(did) {
            Some(key) => DidResolution::Resolved(DidDocument::with_ed25519_key(did, &key)),
            None => DidResolution::InvalidDid(did.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// StaticDidResolver: documents registered ahead of time
// ---------------------------------------------------------------------------

/// Resolver over a fixed set of documents, for methods whose documents are
/// provisioned out of band (and for tests).
#[derive(Default)]
pub struct StaticDidResolver {
    documents: RwLock<HashMap<String, DidDocument>>,
}

impl StaticDidResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, document: DidDocument) {
        if let Ok(mut docs) = self.documents.write() {
            docs.insert(document.id.clone(), document);
        }
    }
}

impl DidResolver for StaticDidResolver {
    fn resolve(&self, did: &str) -> DidResolution {
        let did = did.split('#').next().unwrap_or(did);
        match self.documents.read() {
            Ok(docs) => docs
                .get(did)
                .cloned()
                .map_or(DidResolution::NotFound, DidResolution::Resolved),
            Err(_) => DidResolution::NotFound,
        }
    }
}
