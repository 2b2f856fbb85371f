//! TriggerMetadataStore trait definition

use async_trait::async_trait;
use eventroute_core::TriggerId;

/// Error type for store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Backend failure
    #[error("storage error: {0}")]
    Backend(String),

    /// Value could not be encoded for the backend
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Trigger-scoped key/value metadata supplied by the host
///
/// Values are opaque JSON; decoding is the caller's concern so that a
/// garbled record can be told apart from a backend failure.
#[async_trait]
pub trait TriggerMetadataStore: Send + Sync {
    /// Load the metadata for a trigger, if any
    async fn load(&self, trigger_id: &TriggerId) -> Result<Option<serde_json::Value>, StoreError>;

    /// Replace the metadata for a trigger (last write wins)
    async fn save(&self, trigger_id: &TriggerId, value: serde_json::Value)
        -> Result<(), StoreError>;

    /// Delete the metadata for a trigger, returning whether anything was removed
    async fn delete(&self, trigger_id: &TriggerId) -> Result<bool, StoreError>;
}
