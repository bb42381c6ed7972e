//! Tether Core
//!
//! Primitives shared by every tether crate: timestamps, nonces, typed
//! identifiers, the structured error-code enum, canonical JSON hashing,
//! did:key encoding, and the `Signer` / `RecordStore` capability traits.

pub mod canonical;
pub mod crypto;
pub mod error;
pub mod traits;
pub mod types;

pub use canonical::*;
pub use crypto::*;
pub use error::*;
pub use traits::*;
pub use types::*;
