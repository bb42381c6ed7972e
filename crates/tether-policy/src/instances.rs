use std::sync::Arc;

use tether_core::{get_json, list_json, put_json, InstanceId, RecordKind, RecordStore};
use tracing::debug;

use crate::deck::{DeckInstance, MAX_DECK_SOURCES};
use crate::error::{PolicyError, PolicyResult};

/// Deck instances persisted as `deckInstance` records.
pub struct DeckInstanceStore {
    store: Arc<dyn RecordStore>,
    max_sources: usize,
}

impl DeckInstanceStore {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            max_sources: MAX_DECK_SOURCES,
        }
    }

    pub fn with_max_sources(mut self, max_sources: usize) -> Self {
        self.max_sources = max_sources;
        self
    }

    /// Insert or replace an instance. Oversized instances are rejected
    /// before anything is written.
    pub fn save(&self, instance: &DeckInstance) -> PolicyResult<()> {
        if instance.sources.len() > self.max_sources {
            return Err(PolicyError::TooManySources {
                count: instance.sources.len(),
                max: self.max_sources,
            });
        }
        put_json(
            self.store.as_ref(),
            RecordKind::DeckInstance,
            instance.instance_id.as_str(),
            instance,
        )?;
        debug!(instance_id = %instance.instance_id, deck_id = %instance.deck_id, "saved deck instance");
        Ok(())
    }

    pub fn get(&self, instance_id: &InstanceId) -> PolicyResult<Option<DeckInstance>> {
        Ok(get_json(
            self.store.as_ref(),
            RecordKind::DeckInstance,
            instance_id.as_str(),
        )?)
    }

    /// Instances owned by `owner_did`, in insertion order.
    pub fn list_by_owner(&self, owner_did: &str) -> PolicyResult<Vec<DeckInstance>> {
        let all: Vec<DeckInstance> = list_json(self.store.as_ref(), RecordKind::DeckInstance)?;
        Ok(all.into_iter().filter(|i| i.owner_did == owner_did).collect())
    }

    pub fn delete(&self, instance_id: &InstanceId) -> PolicyResult<bool> {
        Ok(self
            .store
            .delete(RecordKind::DeckInstance, instance_id.as_str())?)
    }
}
