//! Message bus port
//!
//! Subscribing is the last step of routing: once the rule exists, the
//! trigger registers its filter with the bus that fans webhook deliveries
//! out to triggers.

use async_trait::async_trait;
use eventroute_core::{matches, EventEnvelope, EventFilter, SubscriptionId, TriggerId};
use parking_lot::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Error type for bus operations
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("subscription rejected: {0}")]
    Rejected(String),

    #[error("bus unavailable: {0}")]
    Unavailable(String),
}

/// Local subscription to the shared event stream
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Register `filter` for `trigger_id` and return the new subscription id
    async fn subscribe(
        &self,
        trigger_id: &TriggerId,
        filter: &EventFilter,
    ) -> Result<SubscriptionId, BusError>;
}

/// A registered subscription
#[derive(Debug, Clone)]
pub struct BusSubscription {
    pub subscription_id: SubscriptionId,
    pub trigger_id: TriggerId,
    pub filter: EventFilter,
}

/// In-process bus that matches deliveries with the subscription matcher
#[derive(Default)]
pub struct InMemoryMessageBus {
    subscriptions: RwLock<Vec<BusSubscription>>,
}

impl InMemoryMessageBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of subscribe calls that succeeded
    pub fn subscribe_count(&self) -> usize {
        self.subscriptions.read().len()
    }

    /// Subscriptions registered for `trigger_id`
    pub fn subscriptions_for(&self, trigger_id: &TriggerId) -> Vec<BusSubscription> {
        self.subscriptions
            .read()
            .iter()
            .filter(|s| &s.trigger_id == trigger_id)
            .cloned()
            .collect()
    }

    /// Triggers that receive `event`, in subscription order
    pub fn deliver(&self, event: &EventEnvelope) -> Vec<TriggerId> {
        self.subscriptions
            .read()
            .iter()
            .filter(|s| matches(event, &s.filter))
            .map(|s| s.trigger_id.clone())
            .collect()
    }
}

#[async_trait]
impl MessageBus for InMemoryMessageBus {
    async fn subscribe(
        &self,
        trigger_id: &TriggerId,
        filter: &EventFilter,
    ) -> Result<SubscriptionId, BusError> {
        let subscription_id = SubscriptionId::new(Uuid::now_v7().to_string())
            .ok_or_else(|| BusError::Rejected("generated an empty id".to_string()))?;

        debug!(%trigger_id, %subscription_id, "subscribed");
        self.subscriptions.write().push(BusSubscription {
            subscription_id: subscription_id.clone(),
            trigger_id: trigger_id.clone(),
            filter: filter.clone(),
        });
        Ok(subscription_id)
    }
}
