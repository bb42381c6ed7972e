use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("crypto error: {0}")]
    Crypto(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Serialization(e.to_string())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

// ---------------------------------------------------------------------------
// ErrorCode: machine-dispatchable verification failure codes
// ---------------------------------------------------------------------------

/// Structured error codes surfaced by every verification entry point.
///
/// Exhaustive: adding a code forces review of every match site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidTimeRange,
    Expired,
    FutureIssuedAt,
    ProofTooOld,
    ReplayDetected,
    SignatureInvalid,
    XrplTxNotFound,
    XrplMemoMismatch,
    XrplAccountMismatch,
    CardanoSignatureInvalid,
    TooManyPermissions,
    PermissionIdTooLong,
    TooManyDeckSources,
    InvalidTimestampFormat,
    MalformedInput,
    UnsupportedProtocolVersion,
    DidResolutionFailed,
}

impl ErrorCode {
    pub const ALL: [ErrorCode; 17] = [
        ErrorCode::InvalidTimeRange,
        ErrorCode::Expired,
        ErrorCode::FutureIssuedAt,
        ErrorCode::ProofTooOld,
        ErrorCode::ReplayDetected,
        ErrorCode::SignatureInvalid,
        ErrorCode::XrplTxNotFound,
        ErrorCode::XrplMemoMismatch,
        ErrorCode::XrplAccountMismatch,
        ErrorCode::CardanoSignatureInvalid,
        ErrorCode::TooManyPermissions,
        ErrorCode::PermissionIdTooLong,
        ErrorCode::TooManyDeckSources,
        ErrorCode::InvalidTimestampFormat,
        ErrorCode::MalformedInput,
        ErrorCode::UnsupportedProtocolVersion,
        ErrorCode::DidResolutionFailed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::InvalidTimeRange => "INVALID_TIME_RANGE",
            ErrorCode::Expired => "EXPIRED",
            ErrorCode::FutureIssuedAt => "FUTURE_ISSUED_AT",
            ErrorCode::ProofTooOld => "PROOF_TOO_OLD",
            ErrorCode::ReplayDetected => "REPLAY_DETECTED",
            ErrorCode::SignatureInvalid => "SIGNATURE_INVALID",
            ErrorCode::XrplTxNotFound => "XRPL_TX_NOT_FOUND",
            ErrorCode::XrplMemoMismatch => "XRPL_MEMO_MISMATCH",
            ErrorCode::XrplAccountMismatch => "XRPL_ACCOUNT_MISMATCH",
            ErrorCode::CardanoSignatureInvalid => "CARDANO_SIGNATURE_INVALID",
            ErrorCode::TooManyPermissions => "TOO_MANY_PERMISSIONS",
            ErrorCode::PermissionIdTooLong => "PERMISSION_ID_TOO_LONG",
            ErrorCode::TooManyDeckSources => "TOO_MANY_DECK_SOURCES",
            ErrorCode::InvalidTimestampFormat => "INVALID_TIMESTAMP_FORMAT",
            ErrorCode::MalformedInput => "MALFORMED_INPUT",
            ErrorCode::UnsupportedProtocolVersion => "UNSUPPORTED_PROTOCOL_VERSION",
            ErrorCode::DidResolutionFailed => "DID_RESOLUTION_FAILED",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_serde_matches_display() {
        for code in ErrorCode::ALL {
            let json = serde_json::to_string(&code).unwrap();
            assert_eq!(json, format!("\"{}\"", code));
            let back: ErrorCode = serde_json::from_str(&json).unwrap();
            assert_eq!(back, code);
        }
    }

    #[test]
    fn test_error_code_strings() {
        assert_eq!(ErrorCode::ReplayDetected.to_string(), "REPLAY_DETECTED");
        assert_eq!(
            ErrorCode::UnsupportedProtocolVersion.as_str(),
            "UNSUPPORTED_PROTOCOL_VERSION"
        );
    }

    #[test]
    fn test_core_error_display() {
        let e = CoreError::Storage("lock poisoned".into());
        assert_eq!(e.to_string(), "storage error: lock poisoned");
    }

    #[test]
    fn test_core_error_from_serde() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let core: CoreError = err.into();
        assert!(matches!(core, CoreError::Serialization(_)));
    }
}
