//! Tether Credentials
//!
//! Issues, verifies and stores Verifiable Credentials: signed claim sets
//! bound to a subject. Claim names double as permission ids; any claim
//! whose value is not `false` grants the permission of the same name.
//!
//! All signing is delegated to a `Signer`. Issuer identities are did:key,
//! so a credential verifies on its own.

pub mod claims;
pub mod error;
pub mod issuer;
pub mod store;
pub mod types;

pub use claims::{extract_claim_permissions, missing_claims};
pub use error::{CredError, CredErrorDetail, CredResult};
pub use issuer::{
    check_presentable, verify_credential_signature, CredentialIssuer, IssueRequest,
    MAX_CLAIM_NAME_LENGTH,
};
pub use store::CredentialStore;
pub use types::{ClaimValue, Claims, CredentialProof, VerifiableCredential, CREDENTIAL_VERSION};
