//! Persistence layer for trigger-scoped metadata
//!
//! This module provides:
//! - [`TriggerMetadataStore`] trait for the host's per-trigger key/value storage
//! - [`InMemoryTriggerMetadataStore`] for testing

mod memory;
mod store;

pub use memory::InMemoryTriggerMetadataStore;
pub use store::{StoreError, TriggerMetadataStore};
