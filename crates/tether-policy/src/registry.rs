use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, RwLock};

use tether_core::DeckId;
use tracing::debug;

use crate::deck::{normalize_evidence_type, DeckDefinition, IssuerPolicy, PermissionDefinition};
use crate::error::{PolicyError, PolicyResult};

pub const BASIC_IDENTITY_DECK: &str = "basic-identity";
pub const KYC_LITE_DECK: &str = "kyc-lite";

/// Registry of deck definitions.
///
/// Definitions are immutable once registered: registering an id twice is an
/// error. `reset` restores the defaults for test isolation.
pub struct DeckRegistry {
    decks: RwLock<BTreeMap<DeckId, Arc<DeckDefinition>>>,
}

impl DeckRegistry {
    pub fn empty() -> Self {
        Self {
            decks: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn with_defaults() -> PolicyResult<Self> {
        let registry = Self::empty();
        for deck in default_decks() {
            registry.register(deck)?;
        }
        Ok(registry)
    }

    pub fn register(&self, deck: DeckDefinition) -> PolicyResult<()> {
        validate_deck(&deck)?;
        let mut decks = self
            .decks
            .write()
            .map_err(|e| PolicyError::LockPoisoned(e.to_string()))?;
        if decks.contains_key(&deck.id) {
            return Err(PolicyError::DuplicateDeck(deck.id.to_string()));
        }
        debug!(deck_id = %deck.id, permissions = deck.permissions.len(), "registered deck");
        decks.insert(deck.id.clone(), Arc::new(deck));
        Ok(())
    }

    pub fn get(&self, deck_id: &DeckId) -> Option<Arc<DeckDefinition>> {
        self.decks.read().ok()?.get(deck_id).cloned()
    }

    pub fn has(&self, deck_id: &DeckId) -> bool {
        self.get(deck_id).is_some()
    }

    pub fn list(&self) -> Vec<DeckId> {
        self.decks
            .read()
            .map(|decks| decks.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn clear(&self) -> PolicyResult<()> {
        self.decks
            .write()
            .map_err(|e| PolicyError::LockPoisoned(e.to_string()))?
            .clear();
        Ok(())
    }

    pub fn reset(&self) -> PolicyResult<()> {
        self.clear()?;
        for deck in default_decks() {
            self.register(deck)?;
        }
        Ok(())
    }
}

fn validate_deck(deck: &DeckDefinition) -> PolicyResult<()> {
    if deck.id.as_str().trim().is_empty() {
        return Err(PolicyError::InvalidDeck("empty deck id".into()));
    }
    let mut seen = HashSet::new();
    for permission in &deck.permissions {
        if permission.id.trim().is_empty() {
            return Err(PolicyError::InvalidDeck(format!(
                "{}: empty permission id",
                deck.id
            )));
        }
        if !seen.insert(permission.id.as_str()) {
            return Err(PolicyError::InvalidDeck(format!(
                "{}: duplicate permission {}",
                deck.id, permission.id
            )));
        }
        if normalize_evidence_type(&permission.evidence_type).is_empty() {
            return Err(PolicyError::InvalidDeck(format!(
                "{}: permission {} has no evidence type",
                deck.id, permission.id
            )));
        }
        if let Some(min) = permission.issuer_policy.as_ref().and_then(|p| p.min_trust) {
            if !min.is_finite() {
                return Err(PolicyError::InvalidDeck(format!(
                    "{}: permission {} has a non-finite minTrust",
                    deck.id, permission.id
                )));
            }
        }
    }
    Ok(())
}

/// Decks installed by `with_defaults` and `reset`.
pub fn default_decks() -> Vec<DeckDefinition> {
    vec![
        DeckDefinition {
            id: DeckId::new(BASIC_IDENTITY_DECK),
            name: "Basic identity".into(),
            version: "1.0".into(),
            permissions: vec![
                PermissionDefinition::new("age_over_18", "vc")
                    .with_description("Holder is at least 18 years old"),
                PermissionDefinition::new("email_verified", "any")
                    .with_description("Holder controls a verified email address"),
            ],
        },
        DeckDefinition {
            id: DeckId::new(KYC_LITE_DECK),
            name: "KYC lite".into(),
            version: "1.0".into(),
            permissions: vec![
                PermissionDefinition::new("identity_verified", "vc")
                    .with_freshness(365 * 24 * 3600)
                    .with_issuer_policy(IssuerPolicy {
                        allow: None,
                        deny: None,
                        min_trust: Some(0.8),
                    })
                    .with_description("Government identity checked by a trusted issuer"),
                PermissionDefinition::new("address_verified", "attestation")
                    .with_freshness(90 * 24 * 3600)
                    .with_description("Residential address attested within 90 days"),
            ],
        },
    ]
}
