use std::fmt;

use crate::error::{AdapterError, AdapterResult};

/// Validated, lowercased registry key.
///
/// Surrounding whitespace is trimmed. Accepts ASCII letters, digits, `_` and `-`, up to 64 characters.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CapabilityKey(String);

impl CapabilityKey {
    pub const MAX_LEN: usize = 64;

    pub fn parse(raw: &str) -> AdapterResult<Self> {
        let raw = raw.trim();
        let valid = !raw.is_empty()
            && raw.len() <= Self::MAX_LEN
            && raw
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
        if !valid {
            return Err(AdapterError::InvalidKey(raw.to_string()));
        }
        Ok(Self(raw.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CapabilityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
