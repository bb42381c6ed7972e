use std::fmt;

use serde::{Deserialize, Serialize};
use tether_core::ErrorCode;

/// A "major.minor" protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProtocolVersion {
    pub major: u32,
    pub minor: u32,
}

impl ProtocolVersion {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Strict parse: two dot-separated runs of ASCII digits, nothing else.
    pub fn parse(raw: &str) -> Option<Self> {
        let (major, minor) = raw.split_once('.')?;
        let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
        if !digits(major) || !digits(minor) {
            return None;
        }
        Some(Self {
            major: major.parse().ok()?,
            minor: minor.parse().ok()?,
        })
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Accepted version range: exact major, minor within `[min_minor, max_minor]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionPolicy {
    pub major: u32,
    pub min_minor: u32,
    pub max_minor: u32,
    /// Version stamped on new requests.
    pub current: String,
}

impl Default for VersionPolicy {
    fn default() -> Self {
        Self {
            major: 1,
            min_minor: 0,
            max_minor: 1,
            current: "1.0".to_string(),
        }
    }
}

impl VersionPolicy {
    pub fn is_supported(&self, version: ProtocolVersion) -> bool {
        version.major == self.major
            && version.minor >= self.min_minor
            && version.minor <= self.max_minor
    }

    /// Parse and range-check a wire version string.
    pub fn check(&self, raw: &str) -> Result<ProtocolVersion, ErrorCode> {
        ProtocolVersion::parse(raw)
            .filter(|v| self.is_supported(*v))
            .ok_or(ErrorCode::UnsupportedProtocolVersion)
    }

    /// Highest mutually supported version among those offered by a peer.
    pub fn negotiate(&self, offered: &[String]) -> Result<ProtocolVersion, ErrorCode> {
        offered
            .iter()
            .filter_map(|raw| self.check(raw).ok())
            .max()
            .ok_or(ErrorCode::UnsupportedProtocolVersion)
    }
}
