use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::crypto::did_key_from_pubkey;
use crate::error::{CoreError, CoreResult};
use crate::types::RecordKind;

// ---------------------------------------------------------------------------
// Signer: Ed25519 signing capability
// ---------------------------------------------------------------------------

pub trait Signer: Send + Sync {
    fn sign_ed25519(&self, message: &[u8]) -> CoreResult<[u8; 64]>;
    fn public_key_ed25519(&self) -> [u8; 32];

    /// did:key identifier for this signer's public key.
    fn did(&self) -> String {
        did_key_from_pubkey(&self.public_key_ed25519())
    }
}

// ---------------------------------------------------------------------------
// RecordStore: the persistence boundary
//
// Records are opaque bytes addressed by (kind, id). Saving an existing id
// replaces the value in place; `list` returns values in first-insertion
// order, which credential lookup relies on for its tie-break.
// ---------------------------------------------------------------------------

pub trait RecordStore: Send + Sync {
    fn get(&self, kind: RecordKind, id: &str) -> CoreResult<Option<Vec<u8>>>;
    fn save(&self, kind: RecordKind, id: &str, value: &[u8]) -> CoreResult<()>;
    fn delete(&self, kind: RecordKind, id: &str) -> CoreResult<bool>;
    fn list(&self, kind: RecordKind) -> CoreResult<Vec<(String, Vec<u8>)>>;

    /// Atomic compare-and-swap. Returns true if the swap succeeded
    /// (current value matched `expected`; `None` means absent).
    fn compare_and_swap(
        &self,
        kind: RecordKind,
        id: &str,
        expected: Option<&[u8]>,
        new_value: &[u8],
    ) -> CoreResult<bool>;

    fn exists(&self, kind: RecordKind, id: &str) -> CoreResult<bool> {
        Ok(self.get(kind, id)?.is_some())
    }
}

/// Serialize `value` as JSON and save it under (kind, id).
pub fn put_json<T: Serialize + ?Sized>(
    store: &dyn RecordStore,
    kind: RecordKind,
    id: &str,
    value: &T,
) -> CoreResult<()> {
    let bytes = serde_json::to_vec(value)?;
    store.save(kind, id, &bytes)
}

/// Load and deserialize a JSON record.
pub fn get_json<T: DeserializeOwned>(
    store: &dyn RecordStore,
    kind: RecordKind,
    id: &str,
) -> CoreResult<Option<T>> {
    match store.get(kind, id)? {
        Some(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| CoreError::Serialization(format!("{} {}: {}", kind, id, e))),
        None => Ok(None),
    }
}

/// Load every record of `kind`, in insertion order.
pub fn list_json<T: DeserializeOwned>(
    store: &dyn RecordStore,
    kind: RecordKind,
) -> CoreResult<Vec<T>> {
    store
        .list(kind)?
        .into_iter()
        .map(|(id, bytes)| {
            serde_json::from_slice(&bytes)
                .map_err(|e| CoreError::Serialization(format!("{} {}: {}", kind, id, e)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    // Verify the trait objects are object-safe
    fn _assert_signer_object_safe(_: &dyn Signer) {}
    fn _assert_store_object_safe(_: &dyn RecordStore) {}

    struct FixedSigner;

    impl Signer for FixedSigner {
        fn sign_ed25519(&self, _message: &[u8]) -> CoreResult<[u8; 64]> {
            Ok([0u8; 64])
        }
        fn public_key_ed25519(&self) -> [u8; 32] {
            [0x07; 32]
        }
    }

    #[test]
    fn test_signer_did_default() {
        let did = FixedSigner.did();
        assert_eq!(did, did_key_from_pubkey(&[0x07; 32]));
        assert_eq!(crate::crypto::pubkey_from_did_key(&did), Some([0x07; 32]));
    }
}
