use serde::{Deserialize, Serialize};

use crate::error::{ProofError, ProofResult};
use crate::limits::Limits;
use crate::replay::DEFAULT_MIN_REPLAY_TTL_SECONDS;
use crate::time::TimePolicy;
use crate::version::VersionPolicy;

pub const DEFAULT_REQUEST_TTL_SECONDS: u64 = 300;
pub const DEFAULT_PROOF_TTL_SECONDS: u64 = 300;

/// Runtime knobs of the protocol engine and prover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolConfig {
    pub time: TimePolicy,
    pub replay_min_ttl_seconds: u64,
    pub versions: VersionPolicy,
    pub limits: Limits,
    /// Lifetime of requests created without an explicit TTL.
    pub default_ttl_seconds: u64,
    /// Upper bound on a proof's lifetime; never past the request's expiry.
    pub proof_ttl_seconds: u64,
    /// Identify the prover by a per-audience pairwise id instead of its DID.
    pub pairwise_identifiers: bool,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            time: TimePolicy::default(),
            replay_min_ttl_seconds: DEFAULT_MIN_REPLAY_TTL_SECONDS,
            versions: VersionPolicy::default(),
            limits: Limits::default(),
            default_ttl_seconds: DEFAULT_REQUEST_TTL_SECONDS,
            proof_ttl_seconds: DEFAULT_PROOF_TTL_SECONDS,
            pairwise_identifiers: true,
        }
    }
}

impl ProtocolConfig {
    pub fn validate(&self) -> ProofResult<()> {
        let invalid = |msg: &str| Err(ProofError::InvalidRequest(format!("config: {}", msg)));
        if self.time.max_clock_skew_seconds == 0 {
            return invalid("max_clock_skew_seconds must be positive");
        }
        if self.time.max_proof_age_seconds == 0 {
            return invalid("max_proof_age_seconds must be positive");
        }
        if self.replay_min_ttl_seconds == 0 {
            return invalid("replay min_ttl_seconds must be positive");
        }
        if self.default_ttl_seconds == 0 || self.proof_ttl_seconds == 0 {
            return invalid("request and proof TTLs must be positive");
        }
        if self.versions.min_minor > self.versions.max_minor {
            return invalid("min_minor exceeds max_minor");
        }
        if self.versions.check(&self.versions.current).is_err() {
            return invalid("current protocol version is outside the accepted range");
        }
        let limits = &self.limits;
        if limits.max_permissions == 0
            || limits.max_permission_id_length == 0
            || limits.max_deck_sources == 0
        {
            return invalid("limits must be positive");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ProtocolConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.time.max_clock_skew_seconds, 120);
        assert_eq!(config.replay_min_ttl_seconds, 300);
        assert!(config.pairwise_identifiers);
    }

    #[test]
    fn test_rejects_inverted_minor_range() {
        let mut config = ProtocolConfig::default();
        config.versions.min_minor = 2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_current_outside_range() {
        let mut config = ProtocolConfig::default();
        config.versions.current = "2.0".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_limits() {
        let mut config = ProtocolConfig::default();
        config.limits.max_permissions = 0;
        assert!(config.validate().is_err());

        let mut config = ProtocolConfig::default();
        config.time.max_proof_age_seconds = 0;
        assert!(config.validate().is_err());
    }
}
