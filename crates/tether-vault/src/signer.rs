use ed25519_dalek::{Signer as DalekSigner, SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};
use tether_core::{CoreResult, RecordKind, RecordStore};
use zeroize::{Zeroize, Zeroizing};

use crate::error::{VaultError, VaultResult};

/// Id of the singleton key record for a given kind.
pub const DEFAULT_KEY_ID: &str = "default";

/// Persisted form of a key pair.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeyPairRecord {
    public_key: String,
    secret_key: String,
}

impl Drop for KeyPairRecord {
    fn drop(&mut self) {
        self.secret_key.zeroize();
    }
}

/// Ed25519 signer that implements the `tether_core::Signer` trait.
pub struct KeySigner {
    signing_key: Zeroizing<[u8; 32]>,
    verifying_key: [u8; 32],
}

impl KeySigner {
    /// Fresh key pair from the OS RNG.
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut rand::rngs::OsRng);
        Self::from_bytes(signing_key.to_bytes())
    }

    /// Create a signer from raw secret key bytes.
    pub fn from_bytes(key_bytes: [u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(&key_bytes);
        let verifying_key = signing_key.verifying_key();

        Self {
            signing_key: Zeroizing::new(key_bytes),
            verifying_key: verifying_key.to_bytes(),
        }
    }

    /// Load the key pair stored under (kind, id), generating and persisting
    /// one if absent. Concurrent callers converge on a single key: creation
    /// goes through compare-and-swap and a loser reloads the winner's key.
    pub fn load_or_create(store: &dyn RecordStore, kind: RecordKind, id: &str) -> VaultResult<Self> {
        if let Some(existing) = Self::load(store, kind, id)? {
            return Ok(existing);
        }

        let candidate = Self::generate();
        let record = candidate.to_record();
        let bytes = Zeroizing::new(
            serde_json::to_vec(&record).map_err(|e| VaultError::Serialization(e.to_string()))?,
        );
        if store.compare_and_swap(kind, id, None, &bytes)? {
            tracing::info!(kind = %kind, id, did = %candidate.did(), "generated key pair");
            return Ok(candidate);
        }

        Self::load(store, kind, id)?
            .ok_or_else(|| VaultError::NotFound(format!("{} {}", kind, id)))
    }

    /// Load a persisted key pair, if one exists.
    pub fn load(store: &dyn RecordStore, kind: RecordKind, id: &str) -> VaultResult<Option<Self>> {
        let Some(bytes) = store.get(kind, id)? else {
            return Ok(None);
        };
        let bytes = Zeroizing::new(bytes);
        let record: KeyPairRecord =
            serde_json::from_slice(&bytes).map_err(|e| VaultError::Serialization(e.to_string()))?;

        let secret = Zeroizing::new(
            hex::decode(&record.secret_key)
                .map_err(|e| VaultError::KeyMaterial(format!("secret key hex: {}", e)))?,
        );
        let key_bytes: [u8; 32] = secret
            .as_slice()
            .try_into()
            .map_err(|_| VaultError::KeyMaterial("secret key must be 32 bytes".into()))?;
        let signer = Self::from_bytes(key_bytes);

        if hex::encode(signer.verifying_key) != record.public_key {
            return Err(VaultError::KeyMaterial(format!(
                "{} {}: public key does not match secret key",
                kind, id
            )));
        }
        tracing::debug!(kind = %kind, id, "loaded key pair");
        Ok(Some(signer))
    }

    fn to_record(&self) -> KeyPairRecord {
        KeyPairRecord {
            public_key: hex::encode(self.verifying_key),
            secret_key: hex::encode(*self.signing_key),
        }
    }

    /// did:key identifier for this signer.
    pub fn did(&self) -> String {
        tether_core::did_key_from_pubkey(&self.verifying_key)
    }

    /// Verify a signature against this signer's public key.
    pub fn verify(&self, message: &[u8], signature: &[u8; 64]) -> bool {
        let vk = VerifyingKey::from_bytes(&self.verifying_key);
        match vk {
            Ok(vk) => {
                let sig = ed25519_dalek::Signature::from_bytes(signature);
                vk.verify_strict(message, &sig).is_ok()
            }
            Err(_) => false,
        }
    }
}

impl tether_core::Signer for KeySigner {
    fn sign_ed25519(&self, message: &[u8]) -> CoreResult<[u8; 64]> {
        let signing_key = SigningKey::from_bytes(&self.signing_key);
        let signature = signing_key.sign(message);
        Ok(signature.to_bytes())
    }

    fn public_key_ed25519(&self) -> [u8; 32] {
        self.verifying_key
    }
}

impl std::fmt::Debug for KeySigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeySigner")
            .field("did", &self.did())
            .finish_non_exhaustive()
    }
}
