use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroize;

// ---------------------------------------------------------------------------
// Timestamp: canonical time representation (seconds + nanoseconds)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    pub seconds_since_epoch: u64,
    pub nanoseconds: u32,
}

impl Timestamp {
    pub fn now() -> Self {
        let now = chrono::Utc::now();
        Self {
            seconds_since_epoch: now.timestamp().max(0) as u64,
            nanoseconds: now.timestamp_subsec_nanos(),
        }
    }

    pub fn from_seconds(seconds: u64) -> Self {
        Self {
            seconds_since_epoch: seconds,
            nanoseconds: 0,
        }
    }

    pub fn plus_seconds(&self, seconds: u64) -> Self {
        Self::from_seconds(self.seconds_since_epoch.saturating_add(seconds))
    }

    pub fn minus_seconds(&self, seconds: u64) -> Self {
        Self::from_seconds(self.seconds_since_epoch.saturating_sub(seconds))
    }

    /// Whole seconds from `self` until `later`, zero if `later` is not after `self`.
    pub fn seconds_until(&self, later: &Timestamp) -> u64 {
        later
            .seconds_since_epoch
            .saturating_sub(self.seconds_since_epoch)
    }

    /// RFC 3339 with second precision and a `Z` suffix. This is the wire form
    /// used in every protocol message, so it must stay byte-stable.
    pub fn to_rfc3339(&self) -> String {
        let dt = chrono::DateTime::from_timestamp(self.seconds_since_epoch as i64, 0);
        dt.map(|d| d.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
            .unwrap_or_else(|| "invalid".to_string())
    }

    /// Normalize a wire timestamp to epoch seconds.
    ///
    /// Accepts RFC 3339 (any offset) or a bare integer count of seconds.
    /// Returns `None` for anything else, including pre-epoch instants.
    pub fn parse_wire(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return None;
        }
        if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(trimmed) {
            let secs = dt.timestamp();
            if secs < 0 {
                return None;
            }
            return Some(Self {
                seconds_since_epoch: secs as u64,
                nanoseconds: dt.timestamp_subsec_nanos(),
            });
        }
        if trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return trimmed.parse::<u64>().ok().map(Self::from_seconds);
        }
        None
    }

    pub fn is_expired(&self) -> bool {
        *self < Self::now()
    }
}

impl From<chrono::DateTime<chrono::Utc>> for Timestamp {
    fn from(dt: chrono::DateTime<chrono::Utc>) -> Self {
        Self {
            seconds_since_epoch: dt.timestamp().max(0) as u64,
            nanoseconds: dt.timestamp_subsec_nanos(),
        }
    }
}

// ---------------------------------------------------------------------------
// Nonce: 32-byte cryptographic nonce
// ---------------------------------------------------------------------------

/// Minimum nonce entropy accepted on the wire, in bytes.
pub const MIN_NONCE_BYTES: usize = 16;

#[derive(Clone)]
pub struct Nonce(pub [u8; 32]);

impl Nonce {
    pub fn generate() -> Self {
        use rand::RngCore;
        let mut bytes = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// True if `value` is lowercase-or-uppercase hex carrying at least
    /// `MIN_NONCE_BYTES` bytes.
    pub fn is_acceptable_hex(value: &str) -> bool {
        value.len() >= MIN_NONCE_BYTES * 2
            && value.len() % 2 == 0
            && value.bytes().all(|b| b.is_ascii_hexdigit())
    }
}

impl fmt::Debug for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Nonce({})", hex::encode(&self.0[..8]))
    }
}

impl Drop for Nonce {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

// ---------------------------------------------------------------------------
// Typed identifiers: prevent stringly-typed confusion
// ---------------------------------------------------------------------------

macro_rules! define_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Fresh random (UUID v4) identifier.
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

define_id!(RequestId, "Identifier of a proof request.");
define_id!(GrantId, "Identifier of a consent grant.");
define_id!(ProofId, "Identifier of a proof response.");
define_id!(CredentialId, "Identifier of a verifiable credential.");
define_id!(DeckId, "Identifier of a deck definition.");
define_id!(InstanceId, "Identifier of a deck instance.");

// ---------------------------------------------------------------------------
// RecordKind: record types addressed in the persisted store
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecordKind {
    ProofRequest,
    ConsentGrant,
    Proof,
    Credential,
    IssuerKey,
    RootKeyPair,
    PairwiseId,
    DeckInstance,
}

impl RecordKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RecordKind::ProofRequest => "proofRequest",
            RecordKind::ConsentGrant => "consentGrant",
            RecordKind::Proof => "proof",
            RecordKind::Credential => "credential",
            RecordKind::IssuerKey => "issuerKey",
            RecordKind::RootKeyPair => "rootKeyPair",
            RecordKind::PairwiseId => "pairwiseId",
            RecordKind::DeckInstance => "deckInstance",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
