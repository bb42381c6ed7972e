use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use subtle::ConstantTimeEq;
use tether_core::{CoreError, CoreResult, RecordKind, RecordStore};

struct Entry {
    seq: u64,
    value: Vec<u8>,
}

#[derive(Default)]
struct Inner {
    next_seq: u64,
    records: HashMap<(RecordKind, String), Entry>,
}

impl Inner {
    fn upsert(&mut self, kind: RecordKind, id: &str, value: &[u8]) {
        if let Some(entry) = self.records.get_mut(&(kind, id.to_string())) {
            entry.value = value.to_vec();
            return;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.records.insert(
            (kind, id.to_string()),
            Entry {
                seq,
                value: value.to_vec(),
            },
        );
    }
}

/// In-memory record store implementing [`RecordStore`].
///
/// Every operation holds a single lock, so a read-modify-write through
/// `compare_and_swap` never interleaves with another writer. Updating an
/// existing record keeps its original insertion position.
pub struct InMemoryRecordStore {
    inner: Mutex<Inner>,
}

fn lock_inner(mutex: &Mutex<Inner>) -> CoreResult<MutexGuard<'_, Inner>> {
    mutex
        .lock()
        .map_err(|e| CoreError::Storage(format!("lock poisoned: {}", e)))
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Number of records of `kind`.
    pub fn count(&self, kind: RecordKind) -> usize {
        lock_inner(&self.inner)
            .map(|inner| inner.records.keys().filter(|(k, _)| *k == kind).count())
            .unwrap_or(0)
    }

    /// Total number of stored records.
    pub fn len(&self) -> usize {
        lock_inner(&self.inner)
            .map(|inner| inner.records.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordStore for InMemoryRecordStore {
    fn get(&self, kind: RecordKind, id: &str) -> CoreResult<Option<Vec<u8>>> {
        let inner = lock_inner(&self.inner)?;
        Ok(inner
            .records
            .get(&(kind, id.to_string()))
            .map(|e| e.value.clone()))
    }

    fn save(&self, kind: RecordKind, id: &str, value: &[u8]) -> CoreResult<()> {
        let mut inner = lock_inner(&self.inner)?;
        inner.upsert(kind, id, value);
        Ok(())
    }

    fn delete(&self, kind: RecordKind, id: &str) -> CoreResult<bool> {
        let mut inner = lock_inner(&self.inner)?;
        Ok(inner.records.remove(&(kind, id.to_string())).is_some())
    }

    fn list(&self, kind: RecordKind) -> CoreResult<Vec<(String, Vec<u8>)>> {
        let inner = lock_inner(&self.inner)?;
        let mut rows: Vec<(u64, String, Vec<u8>)> = inner
            .records
            .iter()
            .filter(|((k, _), _)| *k == kind)
            .map(|((_, id), e)| (e.seq, id.clone(), e.value.clone()))
            .collect();
        rows.sort_by_key(|(seq, _, _)| *seq);
        Ok(rows.into_iter().map(|(_, id, v)| (id, v)).collect())
    }

    fn compare_and_swap(
        &self,
        kind: RecordKind,
        id: &str,
        expected: Option<&[u8]>,
        new_value: &[u8],
    ) -> CoreResult<bool> {
        let mut inner = lock_inner(&self.inner)?;
        let current = inner.records.get(&(kind, id.to_string()));
        let matches = match (current, expected) {
            (None, None) => true,
            (Some(c), Some(e)) => c.value.as_slice().ct_eq(e).into(),
            _ => false,
        };
        if matches {
            inner.upsert(kind, id, new_value);
        }
        Ok(matches)
    }
}
