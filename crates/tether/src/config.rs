use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use tether_proof::{Limits, ProtocolConfig, TimePolicy, VersionPolicy};

use crate::error::{RootError, RootResult};

/// Clock skew and proof age policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeConfig {
    #[serde(default = "default_max_clock_skew")]
    pub max_clock_skew_seconds: u64,

    #[serde(default = "default_max_proof_age")]
    pub max_proof_age_seconds: u64,
}

fn default_max_clock_skew() -> u64 {
    tether_proof::DEFAULT_MAX_CLOCK_SKEW_SECONDS
}

fn default_max_proof_age() -> u64 {
    tether_proof::DEFAULT_MAX_PROOF_AGE_SECONDS
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            max_clock_skew_seconds: default_max_clock_skew(),
            max_proof_age_seconds: default_max_proof_age(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReplayConfig {
    /// Floor on how long an accepted proof stays in the replay cache.
    #[serde(default = "default_min_ttl")]
    pub min_ttl_seconds: u64,
}

fn default_min_ttl() -> u64 {
    tether_proof::DEFAULT_MIN_REPLAY_TTL_SECONDS
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            min_ttl_seconds: default_min_ttl(),
        }
    }
}

/// Accepted protocol versions: `major.min_minor` through `major.max_minor`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProtocolSection {
    #[serde(default = "default_major")]
    pub major: u32,

    #[serde(default)]
    pub min_minor: u32,

    #[serde(default = "default_max_minor")]
    pub max_minor: u32,

    /// Version stamped on newly created requests.
    #[serde(default = "default_current")]
    pub current: String,
}

fn default_major() -> u32 {
    1
}

fn default_max_minor() -> u32 {
    1
}

fn default_current() -> String {
    "1.0".to_string()
}

impl Default for ProtocolSection {
    fn default() -> Self {
        Self {
            major: default_major(),
            min_minor: 0,
            max_minor: default_max_minor(),
            current: default_current(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LimitsConfig {
    #[serde(default = "default_max_permissions")]
    pub max_permissions: usize,

    #[serde(default = "default_max_permission_id_length")]
    pub max_permission_id_length: usize,

    #[serde(default = "default_max_deck_sources")]
    pub max_deck_sources: usize,
}

fn default_max_permissions() -> usize {
    tether_proof::MAX_PERMISSIONS
}

fn default_max_permission_id_length() -> usize {
    tether_proof::MAX_PERMISSION_ID_LENGTH
}

fn default_max_deck_sources() -> usize {
    tether_policy::MAX_DECK_SOURCES
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_permissions: default_max_permissions(),
            max_permission_id_length: default_max_permission_id_length(),
            max_deck_sources: default_max_deck_sources(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RequestConfig {
    #[serde(default = "default_request_ttl")]
    pub default_ttl_seconds: u64,

    #[serde(default = "default_proof_ttl")]
    pub proof_ttl_seconds: u64,
}

fn default_request_ttl() -> u64 {
    tether_proof::DEFAULT_REQUEST_TTL_SECONDS
}

fn default_proof_ttl() -> u64 {
    tether_proof::DEFAULT_PROOF_TTL_SECONDS
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            default_ttl_seconds: default_request_ttl(),
            proof_ttl_seconds: default_proof_ttl(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProverConfig {
    /// Present a per-audience pairwise id instead of the holder's DID.
    #[serde(default = "default_pairwise")]
    pub pairwise_identifiers: bool,
}

fn default_pairwise() -> bool {
    true
}

impl Default for ProverConfig {
    fn default() -> Self {
        Self {
            pairwise_identifiers: default_pairwise(),
        }
    }
}

/// Top-level configuration, loaded from TOML (typically
/// `~/.tether/config.toml`). Every section and field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RootConfig {
    #[serde(default)]
    pub time: TimeConfig,

    #[serde(default)]
    pub replay: ReplayConfig,

    #[serde(default)]
    pub protocol: ProtocolSection,

    #[serde(default)]
    pub limits: LimitsConfig,

    #[serde(default)]
    pub request: RequestConfig,

    #[serde(default)]
    pub prover: ProverConfig,
}

/// Returns `$HOME/<suffix>` if HOME is available, otherwise `./<suffix>`.
fn dirs_or_default(suffix: &str) -> PathBuf {
    std::env::var("HOME")
        .map(|h| PathBuf::from(h).join(suffix))
        .unwrap_or_else(|_| PathBuf::from(suffix))
}

impl RootConfig {
    /// Load configuration from a TOML file. If the file does not exist,
    /// returns a default configuration.
    pub fn load(path: &Path) -> RootResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path).map_err(RootError::Io)?;
        let config: RootConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> RootResult<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| RootError::Config(format!("TOML serialize error: {}", e)))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(RootError::Io)?;
        }
        std::fs::write(path, contents).map_err(RootError::Io)?;
        Ok(())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> RootResult<()> {
        self.to_protocol_config()
            .validate()
            .map_err(|e| RootError::Config(e.to_string()))
    }

    /// Engine and prover settings derived from this file.
    pub fn to_protocol_config(&self) -> ProtocolConfig {
        ProtocolConfig {
            time: TimePolicy {
                max_clock_skew_seconds: self.time.max_clock_skew_seconds,
                max_proof_age_seconds: self.time.max_proof_age_seconds,
            },
            replay_min_ttl_seconds: self.replay.min_ttl_seconds,
            versions: VersionPolicy {
                major: self.protocol.major,
                min_minor: self.protocol.min_minor,
                max_minor: self.protocol.max_minor,
                current: self.protocol.current.clone(),
            },
            limits: Limits {
                max_permissions: self.limits.max_permissions,
                max_permission_id_length: self.limits.max_permission_id_length,
                max_deck_sources: self.limits.max_deck_sources,
            },
            default_ttl_seconds: self.request.default_ttl_seconds,
            proof_ttl_seconds: self.request.proof_ttl_seconds,
            pairwise_identifiers: self.prover.pairwise_identifiers,
        }
    }

    /// Return the path to the default config file location.
    pub fn default_config_path() -> PathBuf {
        dirs_or_default(".tether/config.toml")
    }
}
