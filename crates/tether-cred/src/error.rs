use std::fmt;
use thiserror::Error;

/// Error type for credential issuance, verification and storage.
/// Display strings never contain key material or claim values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredError {
    #[error("schema violation: {0}")]
    SchemaViolation(String),

    #[error("signing failed")]
    SigningFailed,

    #[error("encoding failed")]
    EncodingFailed,

    #[error("decoding failed")]
    DecodingFailed,

    #[error("credential expired")]
    CredentialExpired,

    #[error("invalid credential signature")]
    InvalidSignature,

    #[error("missing claims: {}", .0.join(", "))]
    MissingClaims(Vec<String>),

    #[error("storage error")]
    StorageError,
}

/// Structured error with a CredError variant and a safe (non-secret-leaking) message.
#[derive(Debug, Clone)]
pub struct CredErrorDetail {
    pub kind: CredError,
    pub message: String,
    pub credential_id: Option<String>,
}

impl fmt::Display for CredErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(ref id) = self.credential_id {
            write!(f, " (credential: {})", id)?;
        }
        Ok(())
    }
}

impl std::error::Error for CredErrorDetail {}

impl CredErrorDetail {
    pub fn new(kind: CredError, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            credential_id: None,
        }
    }

    pub fn with_credential_id(mut self, id: impl Into<String>) -> Self {
        self.credential_id = Some(id.into());
        self
    }
}

impl From<CredError> for CredErrorDetail {
    fn from(kind: CredError) -> Self {
        let message = kind.to_string();
        Self {
            kind,
            message,
            credential_id: None,
        }
    }
}

impl From<tether_core::CoreError> for CredErrorDetail {
    fn from(err: tether_core::CoreError) -> Self {
        match err {
            tether_core::CoreError::Serialization(_) => Self {
                kind: CredError::DecodingFailed,
                message: "credential record could not be decoded".to_string(),
                credential_id: None,
            },
            tether_core::CoreError::Crypto(_) => Self {
                kind: CredError::SigningFailed,
                message: "signer rejected the payload".to_string(),
                credential_id: None,
            },
            // Storage details can carry record contents; keep them out
            _ => Self {
                kind: CredError::StorageError,
                message: "record store operation failed".to_string(),
                credential_id: None,
            },
        }
    }
}

pub type CredResult<T> = Result<T, CredErrorDetail>;
