//! Tether Vault
//!
//! Record storage and key custody: an in-memory [`RecordStore`] with atomic
//! compare-and-swap, and [`KeySigner`], an Ed25519 signer whose key pair can
//! be persisted as a `rootKeyPair` or `issuerKey` record.
//!
//! [`RecordStore`]: tether_core::RecordStore

pub mod error;
pub mod in_memory_backend;
pub mod signer;

pub use error::*;
pub use in_memory_backend::InMemoryRecordStore;
pub use signer::{KeySigner, DEFAULT_KEY_ID};
