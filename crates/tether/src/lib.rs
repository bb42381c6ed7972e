//! Tether
//!
//! Configuration, error aggregation and wiring for the consent-and-proof
//! stack. [`TetherContext`] builds every subsystem over one record store:
//! the adapter and deck registries, the verifier's protocol engine, the
//! holder's prover, the credential issuer and stores, and the deck
//! evaluator.
//!
//! Registries are explicit objects owned by the context, never globals;
//! [`TetherContext::reset_registries`] restores the defaults.

pub mod config;
pub mod error;

pub use config::{
    LimitsConfig, ProtocolSection, ProverConfig, ReplayConfig, RequestConfig, RootConfig,
    TimeConfig,
};
pub use error::{RootError, RootResult};

use std::sync::Arc;

use tether_adapters::AdapterRegistry;
use tether_core::{RecordKind, RecordStore};
use tether_cred::{CredentialIssuer, CredentialStore};
use tether_policy::{DeckEvaluator, DeckInstanceStore, DeckRegistry};
use tether_proof::{MessageRepository, ProtocolEngine, Prover};
use tether_vault::{InMemoryRecordStore, KeySigner, DEFAULT_KEY_ID};
use tracing::info;

/// Initialise the global tracing subscriber. `RUST_LOG` overrides the
/// default filter unless `verbose` is set. Later calls are no-ops.
pub fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("tether=debug,tether_proof=debug,tether_policy=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tether=info"))
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// Every subsystem, wired over a shared record store.
pub struct TetherContext {
    pub config: RootConfig,
    pub store: Arc<dyn RecordStore>,
    pub adapters: Arc<AdapterRegistry>,
    pub decks: Arc<DeckRegistry>,
    pub engine: ProtocolEngine,
    pub prover: Prover,
    pub issuer: CredentialIssuer,
    pub credentials: CredentialStore,
    pub evaluator: DeckEvaluator,
    pub instances: DeckInstanceStore,
}

impl TetherContext {
    /// Context over a fresh in-memory store.
    pub fn new(config: RootConfig) -> RootResult<Self> {
        Self::with_store(config, Arc::new(InMemoryRecordStore::new()))
    }

    /// Context over `store`. The holder and issuer keys are loaded from the
    /// store's `default` records, or generated and persisted on first use.
    pub fn with_store(config: RootConfig, store: Arc<dyn RecordStore>) -> RootResult<Self> {
        config.validate()?;
        let protocol = config.to_protocol_config();
        let max_sources = protocol.limits.max_deck_sources;

        let adapters = Arc::new(AdapterRegistry::with_defaults()?);
        let decks = Arc::new(DeckRegistry::with_defaults()?);

        let holder_key = KeySigner::load_or_create(store.as_ref(), RecordKind::RootKeyPair, DEFAULT_KEY_ID)?;
        let issuer_key = KeySigner::load_or_create(store.as_ref(), RecordKind::IssuerKey, DEFAULT_KEY_ID)?;

        let engine = ProtocolEngine::new(protocol.clone(), Arc::clone(&adapters))
            .with_repository(MessageRepository::new(Arc::clone(&store)));
        let prover = Prover::new(Arc::new(holder_key), protocol).with_store(Arc::clone(&store));
        let issuer = CredentialIssuer::new(Arc::new(issuer_key));
        let credentials = CredentialStore::new(Arc::clone(&store));
        let evaluator = DeckEvaluator::new(Arc::clone(&decks), Arc::clone(&adapters))
            .with_max_sources(max_sources);
        let instances = DeckInstanceStore::new(Arc::clone(&store)).with_max_sources(max_sources);

        info!(
            holder_did = %prover.did(),
            issuer_did = %issuer.did(),
            "tether context initialized"
        );

        Ok(Self {
            config,
            store,
            adapters,
            decks,
            engine,
            prover,
            issuer,
            credentials,
            evaluator,
            instances,
        })
    }

    /// Restore default registrations and forget accepted proofs.
    pub fn reset_registries(&self) -> RootResult<()> {
        self.adapters.reset()?;
        self.decks.reset()?;
        self.engine.replay_guard().clear();
        info!("registries reset to defaults");
        Ok(())
    }
}
