//! Tether Adapters
//!
//! The pluggable capability layer. An [`AdapterRegistry`] holds three
//! independently keyed tables:
//!
//! - chain verifiers, which check an externally signed consent grant
//! - DID resolvers, keyed by DID method
//! - evidence handlers, keyed by evidence source type
//!
//! Keys are case-insensitive. An absent key means "capability unsupported"
//! and callers fail closed on it; it is never an implicit pass.

pub mod chain;
pub mod did;
pub mod error;
pub mod evidence;
pub mod key;
pub mod registry;

pub use chain::{ChainVerification, ChainVerifier, Ed25519WalletVerifier, GrantSignature, SignatureMeta};
pub use did::{DidDocument, DidKeyResolver, DidResolution, DidResolver, StaticDidResolver, VerificationMethod};
pub use error::*;
pub use evidence::{
    AttestationHandler, EvidenceCheck, EvidenceHandler, SelfAttestedHandler, SourceMetadata,
    SourceRef, VcHandler,
};
pub use key::CapabilityKey;
pub use registry::AdapterRegistry;
