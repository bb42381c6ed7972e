use thiserror::Error;

/// Errors from deck registration and instance persistence.
///
/// A permission that cannot be satisfied is not an error; it is an
/// `Evaluation` with `ok: false`.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("invalid deck: {0}")]
    InvalidDeck(String),

    #[error("deck already registered: {0}")]
    DuplicateDeck(String),

    #[error("too many deck sources: {count} (max {max})")]
    TooManySources { count: usize, max: usize },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("registry lock poisoned: {0}")]
    LockPoisoned(String),
}

impl From<tether_core::CoreError> for PolicyError {
    fn from(e: tether_core::CoreError) -> Self {
        PolicyError::Storage(e.to_string())
    }
}

pub type PolicyResult<T> = Result<T, PolicyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_error_display() {
        let err = PolicyError::TooManySources { count: 129, max: 128 };
        assert_eq!(err.to_string(), "too many deck sources: 129 (max 128)");
    }

    #[test]
    fn test_from_core_error() {
        let err: PolicyError = tether_core::CoreError::Storage("disk".into()).into();
        assert!(matches!(err, PolicyError::Storage(_)));
    }
}
