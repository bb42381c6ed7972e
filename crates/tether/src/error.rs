use thiserror::Error;

/// Error type for the tether root crate, aggregating errors from every
/// workspace crate.
#[derive(Debug, Error)]
pub enum RootError {
    #[error("core error: {0}")]
    Core(#[from] tether_core::CoreError),

    #[error("vault error: {0}")]
    Vault(#[from] tether_vault::VaultError),

    #[error("adapter error: {0}")]
    Adapter(#[from] tether_adapters::AdapterError),

    #[error("policy error: {0}")]
    Policy(#[from] tether_policy::PolicyError),

    #[error("credential error: {0}")]
    Credential(#[from] tether_cred::CredErrorDetail),

    #[error("proof error: {0}")]
    Proof(#[from] tether_proof::ProofError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for RootError {
    fn from(e: serde_json::Error) -> Self {
        RootError::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for RootError {
    fn from(e: toml::de::Error) -> Self {
        RootError::Config(format!("TOML parse error: {}", e))
    }
}

pub type RootResult<T> = Result<T, RootError>;
