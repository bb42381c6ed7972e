use serde::{Deserialize, Serialize};
use tether_core::ErrorCode;

pub const MAX_PERMISSIONS: usize = 64;
pub const MAX_PERMISSION_ID_LENGTH: usize = 128;
pub const MAX_DECK_SOURCES: usize = tether_policy::MAX_DECK_SOURCES;

/// Raw JSON accepted by the byte-level verification entry point.
pub const MAX_JSON_INPUT_BYTES: usize = 64 * 1024;

/// Input size limits, enforced before any deep processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limits {
    pub max_permissions: usize,
    pub max_permission_id_length: usize,
    pub max_deck_sources: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_permissions: MAX_PERMISSIONS,
            max_permission_id_length: MAX_PERMISSION_ID_LENGTH,
            max_deck_sources: MAX_DECK_SOURCES,
        }
    }
}

impl Limits {
    /// Check a permission list: count first, then each id.
    pub fn check_permissions(&self, permissions: &[String]) -> Result<(), (ErrorCode, String)> {
        if permissions.len() > self.max_permissions {
            return Err((
                ErrorCode::TooManyPermissions,
                format!(
                    "{} permissions exceeds the limit of {}",
                    permissions.len(),
                    self.max_permissions
                ),
            ));
        }
        for id in permissions {
            if id.is_empty() {
                return Err((ErrorCode::MalformedInput, "empty permission id".to_string()));
            }
            if id.len() > self.max_permission_id_length {
                return Err((
                    ErrorCode::PermissionIdTooLong,
                    format!(
                        "permission id of {} bytes exceeds the limit of {}",
                        id.len(),
                        self.max_permission_id_length
                    ),
                ));
            }
        }
        Ok(())
    }
}
