//! In-memory implementation of TriggerMetadataStore for testing

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use eventroute_core::TriggerId;
use parking_lot::RwLock;

use super::store::*;

/// In-memory implementation of TriggerMetadataStore
///
/// Used by tests and the CLI planner. Counts writes so tests can assert
/// that a no-op transition did not touch storage.
///
/// # Example
///
/// ```
/// use eventroute_provisioner::InMemoryTriggerMetadataStore;
///
/// let store = InMemoryTriggerMetadataStore::new();
/// assert_eq!(store.len(), 0);
/// ```
pub struct InMemoryTriggerMetadataStore {
    records: RwLock<HashMap<TriggerId, serde_json::Value>>,
    writes: AtomicUsize,
}

impl InMemoryTriggerMetadataStore {
    /// Create a new in-memory store
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            writes: AtomicUsize::new(0),
        }
    }

    /// Store a raw value without counting it as a write (for seeding garbled records)
    pub fn insert_raw(&self, trigger_id: TriggerId, value: serde_json::Value) {
        self.records.write().insert(trigger_id, value);
    }

    /// Read a raw value
    pub fn get_raw(&self, trigger_id: &TriggerId) -> Option<serde_json::Value> {
        self.records.read().get(trigger_id).cloned()
    }

    /// Get the number of saves performed
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Get the number of stored records
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Clear all data (for testing)
    pub fn clear(&self) {
        self.records.write().clear();
    }
}

impl Default for InMemoryTriggerMetadataStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TriggerMetadataStore for InMemoryTriggerMetadataStore {
    async fn load(&self, trigger_id: &TriggerId) -> Result<Option<serde_json::Value>, StoreError> {
        Ok(self.records.read().get(trigger_id).cloned())
    }

    async fn save(
        &self,
        trigger_id: &TriggerId,
        value: serde_json::Value,
    ) -> Result<(), StoreError> {
        self.records.write().insert(trigger_id.clone(), value);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete(&self, trigger_id: &TriggerId) -> Result<bool, StoreError> {
        Ok(self.records.write().remove(trigger_id).is_some())
    }
}
