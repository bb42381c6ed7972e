use ed25519_dalek::{Signature, VerifyingKey};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Multicodec prefix for an Ed25519 public key (varint 0xed).
const ED25519_MULTICODEC: [u8; 2] = [0xed, 0x01];

/// did:key method prefix with the base58btc multibase marker.
const DID_KEY_PREFIX: &str = "did:key:z";

/// Derive a did:key identifier from an Ed25519 public key.
///
/// Formula: "did:key:z" + Base58btc(0xed01 || pubkey)
///
/// Self-certifying: resolving the DID needs no registry lookup.
pub fn did_key_from_pubkey(pubkey: &[u8; 32]) -> String {
    let mut bytes = Vec::with_capacity(34);
    bytes.extend_from_slice(&ED25519_MULTICODEC);
    bytes.extend_from_slice(pubkey);
    format!("{}{}", DID_KEY_PREFIX, bs58::encode(bytes).into_string())
}

/// Recover the Ed25519 public key embedded in a did:key identifier.
///
/// A trailing DID URL fragment (`#key-1`) is ignored.
pub fn pubkey_from_did_key(did: &str) -> Option<[u8; 32]> {
    let did = did.split('#').next().unwrap_or(did);
    let encoded = did.strip_prefix(DID_KEY_PREFIX)?;
    let decoded = bs58::decode(encoded).into_vec().ok()?;
    if decoded.len() != 34 || decoded[..2] != ED25519_MULTICODEC {
        return None;
    }
    let mut key = [0u8; 32];
    key.copy_from_slice(&decoded[2..]);
    Some(key)
}

/// Verify a hex-encoded Ed25519 signature over `message`.
pub fn verify_ed25519_hex(pubkey: &[u8; 32], message: &[u8], signature_hex: &str) -> bool {
    let Ok(sig_bytes) = hex::decode(signature_hex) else {
        return false;
    };
    let Ok(sig_bytes): Result<[u8; 64], _> = sig_bytes.try_into() else {
        return false;
    };
    match VerifyingKey::from_bytes(pubkey) {
        Ok(vk) => vk
            .verify_strict(message, &Signature::from_bytes(&sig_bytes))
            .is_ok(),
        Err(_) => false,
    }
}

/// True if `value` is 128 hex chars (a 64-byte Ed25519 signature).
pub fn is_ed25519_signature_hex(value: &str) -> bool {
    value.len() == 128 && value.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Derive a per-audience identifier for a root identity.
///
/// Formula: hex(SHA-256("pairwise:" || root_id || "|" || audience))
///
/// Two audiences see unrelated identifiers for the same holder.
pub fn pairwise_id(root_id: &str, audience: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"pairwise:");
    hasher.update(root_id.as_bytes());
    hasher.update(b"|");
    hasher.update(audience.as_bytes());
    hex::encode(hasher.finalize())
}

/// Constant-time equality for hashes and other public digests.
pub fn digests_equal(a: &str, b: &str) -> bool {
    a.len() == b.len() && bool::from(a.as_bytes().ct_eq(b.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};

    #[test]
    fn test_did_key_deterministic() {
        let pubkey = [0x42u8; 32];
        assert_eq!(did_key_from_pubkey(&pubkey), did_key_from_pubkey(&pubkey));
    }

    #[test]
    fn test_did_key_different_keys() {
        assert_ne!(
            did_key_from_pubkey(&[0x01u8; 32]),
            did_key_from_pubkey(&[0x02u8; 32])
        );
    }

    #[test]
    fn test_did_key_known_prefix() {
        // Every Ed25519 did:key starts with z6Mk after the method prefix
        let did = did_key_from_pubkey(&[0x99u8; 32]);
        assert!(did.starts_with("did:key:z6Mk"), "{}", did);
    }

    #[test]
    fn test_did_key_roundtrip() {
        let pubkey = [0x55u8; 32];
        let did = did_key_from_pubkey(&pubkey);
        assert_eq!(pubkey_from_did_key(&did), Some(pubkey));
        assert_eq!(pubkey_from_did_key(&format!("{}#key-1", did)), Some(pubkey));
    }

    #[test]
    fn test_pubkey_from_did_key_rejects_other_methods() {
        assert!(pubkey_from_did_key("did:web:example.com").is_none());
        assert!(pubkey_from_did_key("did:key:z0OIl").is_none());
        assert!(pubkey_from_did_key("did:key:zabc").is_none());
    }

    #[test]
    fn test_verify_ed25519_hex() {
        let sk = SigningKey::from_bytes(&[0x42u8; 32]);
        let pk = sk.verifying_key().to_bytes();
        let sig = hex::encode(sk.sign(b"payload").to_bytes());
        assert!(is_ed25519_signature_hex(&sig));
        assert!(verify_ed25519_hex(&pk, b"payload", &sig));
        assert!(!verify_ed25519_hex(&pk, b"tampered", &sig));
        assert!(!verify_ed25519_hex(&pk, b"payload", "abcd"));
        assert!(!verify_ed25519_hex(&pk, b"payload", &"zz".repeat(64)));
    }

    #[test]
    fn test_pairwise_id_per_audience() {
        let a = pairwise_id("did:key:z6Mkroot", "shop.example");
        let b = pairwise_id("did:key:z6Mkroot", "bank.example");
        assert_ne!(a, b);
        assert_eq!(a, pairwise_id("did:key:z6Mkroot", "shop.example"));
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_digests_equal() {
        assert!(digests_equal("abc", "abc"));
        assert!(!digests_equal("abc", "abd"));
        assert!(!digests_equal("abc", "abcd"));
    }
}
