use thiserror::Error;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("storage error: {0}")]
    Storage(String),

    #[error("key material error: {0}")]
    KeyMaterial(String),

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<VaultError> for tether_core::CoreError {
    fn from(e: VaultError) -> Self {
        match e {
            VaultError::Serialization(msg) => tether_core::CoreError::Serialization(msg),
            other => tether_core::CoreError::Storage(other.to_string()),
        }
    }
}

impl From<tether_core::CoreError> for VaultError {
    fn from(e: tether_core::CoreError) -> Self {
        match e {
            tether_core::CoreError::Serialization(msg) => VaultError::Serialization(msg),
            tether_core::CoreError::Storage(msg) => VaultError::Storage(msg),
            other => VaultError::Internal(other.to_string()),
        }
    }
}

pub type VaultResult<T> = Result<T, VaultError>;
