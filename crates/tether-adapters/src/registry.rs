use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use tracing::{debug, warn};

use crate::chain::{ChainVerifier, Ed25519WalletVerifier};
use crate::did::{parse_did, DidKeyResolver, DidResolution, DidResolver};
use crate::error::{AdapterError, AdapterResult};
use crate::evidence::{AttestationHandler, EvidenceHandler, SelfAttestedHandler, VcHandler};
use crate::key::CapabilityKey;

/// One keyed table of capability implementations.
struct CapabilityTable<T: ?Sized> {
    name: &'static str,
    entries: RwLock<BTreeMap<CapabilityKey, Arc<T>>>,
}

impl<T: ?Sized> CapabilityTable<T> {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    fn register(&self, key: &str, implementation: Arc<T>) -> AdapterResult<()> {
        let key = CapabilityKey::parse(key)?;
        let mut entries = self
            .entries
            .write()
            .map_err(|e| AdapterError::LockPoisoned(e.to_string()))?;
        if entries.insert(key.clone(), implementation).is_some() {
            debug!(table = self.name, key = %key, "replaced capability");
        } else {
            debug!(table = self.name, key = %key, "registered capability");
        }
        Ok(())
    }

    fn get(&self, key: &str) -> Option<Arc<T>> {
        let key = CapabilityKey::parse(key).ok()?;
        match self.entries.read() {
            Ok(entries) => entries.get(&key).cloned(),
            Err(_) => {
                warn!(table = self.name, key = %key, "registry lock poisoned, treating as absent");
                None
            }
        }
    }

    fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    fn list(&self) -> Vec<String> {
        self.entries
            .read()
            .map(|entries| entries.keys().map(|k| k.as_str().to_string()).collect())
            .unwrap_or_default()
    }

    fn remove(&self, key: &str) -> bool {
        let Ok(key) = CapabilityKey::parse(key) else {
            return false;
        };
        self.entries
            .write()
            .map(|mut entries| entries.remove(&key).is_some())
            .unwrap_or(false)
    }

    fn clear(&self) -> AdapterResult<()> {
        self.entries
            .write()
            .map_err(|e| AdapterError::LockPoisoned(e.to_string()))?
            .clear();
        Ok(())
    }
}

/// Registry of chain verifiers, DID resolvers and evidence handlers.
///
/// Constructed once and shared by reference with the components that
/// dispatch through it. Lookups are case-insensitive; registration replaces
/// any previous implementation under the same key.
pub struct AdapterRegistry {
    chain_verifiers: CapabilityTable<dyn ChainVerifier>,
    did_resolvers: CapabilityTable<dyn DidResolver>,
    evidence_handlers: CapabilityTable<dyn EvidenceHandler>,
}

impl AdapterRegistry {
    /// Registry with no capabilities installed.
    pub fn empty() -> Self {
        Self {
            chain_verifiers: CapabilityTable::new("chain_verifiers"),
            did_resolvers: CapabilityTable::new("did_resolvers"),
            evidence_handlers: CapabilityTable::new("evidence_handlers"),
        }
    }

    /// Registry with the default capabilities installed.
    pub fn with_defaults() -> AdapterResult<Self> {
        let registry = Self::empty();
        registry.install_defaults()?;
        Ok(registry)
    }

    fn install_defaults(&self) -> AdapterResult<()> {
        self.chain_verifiers
            .register("ed25519", Arc::new(Ed25519WalletVerifier))?;
        self.did_resolvers.register("key", Arc::new(DidKeyResolver))?;
        self.evidence_handlers.register("vc", Arc::new(VcHandler))?;
        self.evidence_handlers
            .register("attestation", Arc::new(AttestationHandler))?;
        self.evidence_handlers
            .register("self_attested", Arc::new(SelfAttestedHandler))?;
        Ok(())
    }

    /// Drop every registration, then reinstall the defaults.
    pub fn reset(&self) -> AdapterResult<()> {
        self.clear()?;
        self.install_defaults()
    }

    /// Drop every registration, defaults included.
    pub fn clear(&self) -> AdapterResult<()> {
        self.chain_verifiers.clear()?;
        self.did_resolvers.clear()?;
        self.evidence_handlers.clear()
    }

    // -- chain verifiers ----------------------------------------------------

    pub fn register_chain_verifier(
        &self,
        signer_type: &str,
        verifier: Arc<dyn ChainVerifier>,
    ) -> AdapterResult<()> {
        self.chain_verifiers.register(signer_type, verifier)
    }

    pub fn chain_verifier(&self, signer_type: &str) -> Option<Arc<dyn ChainVerifier>> {
        self.chain_verifiers.get(signer_type)
    }

    pub fn has_chain_verifier(&self, signer_type: &str) -> bool {
        self.chain_verifiers.has(signer_type)
    }

    pub fn list_chain_verifiers(&self) -> Vec<String> {
        self.chain_verifiers.list()
    }

    pub fn unregister_chain_verifier(&self, signer_type: &str) -> bool {
        self.chain_verifiers.remove(signer_type)
    }

    // -- DID resolvers ------------------------------------------------------

    pub fn register_did_resolver(
        &self,
        method: &str,
        resolver: Arc<dyn DidResolver>,
    ) -> AdapterResult<()> {
        self.did_resolvers.register(method, resolver)
    }

    pub fn did_resolver(&self, method: &str) -> Option<Arc<dyn DidResolver>> {
        self.did_resolvers.get(method)
    }

    pub fn has_did_resolver(&self, method: &str) -> bool {
        self.did_resolvers.has(method)
    }

    pub fn list_did_resolvers(&self) -> Vec<String> {
        self.did_resolvers.list()
    }

    /// Resolve a DID through the resolver registered for its method.
    pub fn resolve_did(&self, did: &str) -> DidResolution {
        let Some((method, _)) = parse_did(did) else {
            return DidResolution::InvalidDid(did.to_string());
        };
        match self.did_resolvers.get(method) {
            Some(resolver) => resolver.resolve(did),
            None => DidResolution::MethodNotSupported(method.to_string()),
        }
    }

    // -- evidence handlers --------------------------------------------------

    pub fn register_evidence_handler(
        &self,
        source_type: &str,
        handler: Arc<dyn EvidenceHandler>,
    ) -> AdapterResult<()> {
        self.evidence_handlers.register(source_type, handler)
    }

    pub fn evidence_handler(&self, source_type: &str) -> Option<Arc<dyn EvidenceHandler>> {
        self.evidence_handlers.get(source_type)
    }

    pub fn has_evidence_handler(&self, source_type: &str) -> bool {
        self.evidence_handlers.has(source_type)
    }

    pub fn list_evidence_handlers(&self) -> Vec<String> {
        self.evidence_handlers.list()
    }
}
