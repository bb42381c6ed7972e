use serde::{Deserialize, Serialize};
use tether_core::ErrorCode;

/// Named outcome of every verification step.
///
/// Credential checks are `None` for plain proof verification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationChecks {
    pub schema_valid: bool,
    pub request_time_valid: bool,
    pub grant_time_valid: bool,
    pub proof_time_valid: bool,
    pub not_expired: bool,
    pub audience_match: bool,
    pub nonce_match: bool,
    pub request_id_match: bool,
    pub permissions_satisfied: bool,
    pub binding_valid: bool,
    pub grant_valid: bool,
    pub not_replay: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_schema_valid: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_not_expired: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_binding_valid: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_signature_valid: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_claims_satisfied: Option<bool>,
}

impl VerificationChecks {
    /// True if every evaluated check passed.
    pub fn all_passed(&self) -> bool {
        let base = [
            self.schema_valid,
            self.request_time_valid,
            self.grant_time_valid,
            self.proof_time_valid,
            self.not_expired,
            self.audience_match,
            self.nonce_match,
            self.request_id_match,
            self.permissions_satisfied,
            self.binding_valid,
            self.grant_valid,
            self.not_replay,
        ];
        let credential = [
            self.credential_schema_valid,
            self.credential_not_expired,
            self.credential_binding_valid,
            self.credential_signature_valid,
            self.credential_claims_satisfied,
        ];
        base.iter().all(|c| *c) && credential.iter().all(|c| c.unwrap_or(true))
    }
}

/// Uniform result of every verification entry point.
///
/// `valid` is true exactly when `errors` is empty. A rejected proof is a
/// result, never an `Err`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    pub valid: bool,
    pub errors: Vec<String>,
    pub error_codes: Vec<ErrorCode>,
    pub checks: VerificationChecks,
}

impl VerificationResult {
    /// Record a failure. Codes are deduplicated; messages are not.
    pub fn fail(&mut self, code: Option<ErrorCode>, message: impl Into<String>) {
        self.errors.push(message.into());
        if let Some(code) = code {
            if !self.error_codes.contains(&code) {
                self.error_codes.push(code);
            }
        }
        self.valid = false;
    }

    /// Recompute `valid` from the error list.
    pub fn finish(mut self) -> Self {
        self.valid = self.errors.is_empty();
        self
    }

    /// Rejection for input that never reached structural validation.
    pub fn malformed(message: impl Into<String>) -> Self {
        let mut result = Self::default();
        result.fail(Some(ErrorCode::MalformedInput), message);
        result
    }

    pub fn has_code(&self, code: ErrorCode) -> bool {
        self.error_codes.contains(&code)
    }
}
