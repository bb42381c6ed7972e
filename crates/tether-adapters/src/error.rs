use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("invalid capability key: {0:?}")]
    InvalidKey(String),

    #[error("registry lock poisoned: {0}")]
    LockPoisoned(String),
}

impl From<AdapterError> for tether_core::CoreError {
    fn from(e: AdapterError) -> Self {
        tether_core::CoreError::Internal(e.to_string())
    }
}

pub type AdapterResult<T> = Result<T, AdapterError>;
