use tether_core::ErrorCode;
use thiserror::Error;

/// Error type for the tether-proof crate.
///
/// A rejected proof is a `VerificationResult`, not a `ProofError`. These
/// variants cover refusals on the proving side and infrastructure faults.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProofError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("grant does not match request: {0}")]
    GrantMismatch(String),

    #[error("credential is missing claims: {}", .0.join(", "))]
    MissingClaims(Vec<String>),

    #[error("credential invalid: {0}")]
    CredentialInvalid(String),

    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(String),

    #[error("{code}: {message}")]
    LimitExceeded { code: ErrorCode, message: String },

    #[error("signing failed")]
    Signing,

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("policy error: {0}")]
    Policy(String),
}

impl ProofError {
    /// Structured code for refusals that have one.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            ProofError::UnsupportedVersion(_) => Some(ErrorCode::UnsupportedProtocolVersion),
            ProofError::LimitExceeded { code, .. } => Some(*code),
            ProofError::InvalidRequest(_) | ProofError::GrantMismatch(_) => {
                Some(ErrorCode::MalformedInput)
            }
            _ => None,
        }
    }
}

impl From<tether_core::CoreError> for ProofError {
    fn from(e: tether_core::CoreError) -> Self {
        match e {
            tether_core::CoreError::Serialization(msg) => ProofError::Serialization(msg),
            // Signer failures stay opaque
            tether_core::CoreError::Crypto(_) => ProofError::Signing,
            other => ProofError::Storage(other.to_string()),
        }
    }
}

impl From<tether_cred::CredErrorDetail> for ProofError {
    fn from(e: tether_cred::CredErrorDetail) -> Self {
        use tether_cred::CredError;
        match e.kind {
            CredError::MissingClaims(missing) => ProofError::MissingClaims(missing),
            CredError::StorageError | CredError::DecodingFailed => ProofError::Storage(e.message),
            _ => ProofError::CredentialInvalid(e.message),
        }
    }
}

impl From<tether_policy::PolicyError> for ProofError {
    fn from(e: tether_policy::PolicyError) -> Self {
        match e {
            tether_policy::PolicyError::TooManySources { .. } => ProofError::LimitExceeded {
                code: ErrorCode::TooManyDeckSources,
                message: e.to_string(),
            },
            tether_policy::PolicyError::Storage(msg) => ProofError::Storage(msg),
            other => ProofError::Policy(other.to_string()),
        }
    }
}

pub type ProofResult<T> = Result<T, ProofError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = ProofError::MissingClaims(vec!["email_verified".into(), "kyc".into()]);
        assert_eq!(e.to_string(), "credential is missing claims: email_verified, kyc");
    }

    #[test]
    fn test_signing_error_is_opaque() {
        let e: ProofError = tether_core::CoreError::Crypto("key bytes 0xdead".into()).into();
        assert_eq!(e.to_string(), "signing failed");
    }

    #[test]
    fn test_deck_source_limit_maps_to_code() {
        let e: ProofError = tether_policy::PolicyError::TooManySources { count: 129, max: 128 }.into();
        assert_eq!(e.code(), Some(ErrorCode::TooManyDeckSources));
    }

    #[test]
    fn test_missing_claims_from_cred_error() {
        let detail = tether_cred::CredErrorDetail::from(tether_cred::CredError::MissingClaims(vec![
            "email_verified".into(),
        ]));
        let e: ProofError = detail.into();
        assert!(matches!(e, ProofError::MissingClaims(ref m) if m == &["email_verified"]));
        assert_eq!(e.code(), None);
    }
}
