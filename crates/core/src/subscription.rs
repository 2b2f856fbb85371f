//! Per-trigger subscription state
//!
//! A [`TriggerSubscription`] is owned by exactly one trigger and persisted in
//! that trigger's metadata. Its state only moves forward:
//!
//! ```text
//! NeedsProvisioning ──▶ AwaitingAvailability ──▶ Subscribed
//! ```
//!
//! The only way back to `NeedsProvisioning` is a new subscription built for a
//! different routing key (the trigger's region or resource changed).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::filter::{EventFilter, FilterError, RoutingKey};
use crate::ids::{SubscriptionId, TriggerId};
use crate::retry::RetryPolicy;

/// Provisioning progress of a trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionState {
    /// Nothing has been requested yet
    NeedsProvisioning,

    /// Provisioning was requested; waiting for the rule cache to show it
    AwaitingAvailability,

    /// Subscribed to the message bus
    Subscribed,
}

impl std::fmt::Display for SubscriptionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NeedsProvisioning => write!(f, "needs_provisioning"),
            Self::AwaitingAvailability => write!(f, "awaiting_availability"),
            Self::Subscribed => write!(f, "subscribed"),
        }
    }
}

/// One trigger's narrowed view of the shared event stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerSubscription {
    pub trigger_id: TriggerId,

    pub filter: EventFilter,

    pub state: SubscriptionState,

    /// Set once the bus subscription exists
    #[serde(default)]
    pub subscription_id: Option<SubscriptionId>,

    /// Incremented each time Setup starts a new chain of availability checks
    #[serde(default)]
    pub generation: u32,

    /// Ordinal of the most recently scheduled availability check in the chain
    #[serde(default)]
    pub attempt: u32,

    /// Cadence for availability checks, kept so callbacks survive restarts
    #[serde(default)]
    pub retry_policy: RetryPolicy,

    pub updated_at: DateTime<Utc>,
}

impl TriggerSubscription {
    /// A fresh subscription in `NeedsProvisioning`
    pub fn new(trigger_id: TriggerId, filter: EventFilter, retry_policy: RetryPolicy) -> Self {
        Self {
            trigger_id,
            filter,
            state: SubscriptionState::NeedsProvisioning,
            subscription_id: None,
            generation: 0,
            attempt: 0,
            retry_policy,
            updated_at: Utc::now(),
        }
    }

    pub fn routing_key(&self) -> Result<RoutingKey, FilterError> {
        self.filter.routing_key()
    }

    /// Region the subscription is routed in
    pub fn region(&self) -> Option<&str> {
        self.filter.region.as_deref()
    }

    /// Subscribed with a bus subscription id
    pub fn is_subscribed(&self) -> bool {
        self.state == SubscriptionState::Subscribed && self.subscription_id.is_some()
    }

    /// Start a new chain of checks; callbacks from earlier chains become stale
    pub fn start_chain(&mut self) {
        self.generation = self.generation.saturating_add(1);
        self.attempt = 0;
    }

    /// Whether a callback scheduled for (`generation`, `attempt`) is the current one
    pub fn is_current_check(&self, generation: u32, attempt: u32) -> bool {
        self.state == SubscriptionState::AwaitingAvailability
            && self.generation == generation
            && self.attempt == attempt
    }

    /// Record that check number `attempt` has been scheduled
    pub fn await_availability(&mut self, attempt: u32) {
        self.state = SubscriptionState::AwaitingAvailability;
        self.attempt = attempt;
        self.updated_at = Utc::now();
    }

    /// Record the bus subscription
    pub fn mark_subscribed(&mut self, subscription_id: SubscriptionId) {
        self.state = SubscriptionState::Subscribed;
        self.subscription_id = Some(subscription_id);
        self.updated_at = Utc::now();
    }

    /// Replace the filter, keeping state; only valid for an unchanged routing key
    pub fn refine_filter(&mut self, filter: EventFilter) {
        debug_assert_eq!(self.filter.routing_key(), filter.routing_key());
        self.filter = filter;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> EventFilter {
        EventFilter::new("aws.codebuild", "CodeBuild Build State Change").in_region("us-east-1")
    }

    #[test]
    fn test_progression() {
        let mut sub = TriggerSubscription::new(
            TriggerId::new("t-1").unwrap(),
            filter(),
            RetryPolicy::default(),
        );
        assert_eq!(sub.state, SubscriptionState::NeedsProvisioning);
        assert!(!sub.is_subscribed());

        sub.await_availability(1);
        assert_eq!(sub.state, SubscriptionState::AwaitingAvailability);
        assert_eq!(sub.attempt, 1);

        sub.mark_subscribed(SubscriptionId::new("sub-1").unwrap());
        assert!(sub.is_subscribed());
        assert!(SubscriptionState::Subscribed > SubscriptionState::AwaitingAvailability);
    }

    #[test]
    fn test_new_chain_makes_old_checks_stale() {
        let mut sub = TriggerSubscription::new(
            TriggerId::new("t-1").unwrap(),
            filter(),
            RetryPolicy::default(),
        );
        sub.start_chain();
        sub.await_availability(1);
        assert!(sub.is_current_check(1, 1));

        sub.start_chain();
        sub.await_availability(1);
        assert!(!sub.is_current_check(1, 1));
        assert!(sub.is_current_check(2, 1));

        sub.mark_subscribed(SubscriptionId::new("sub-1").unwrap());
        assert!(!sub.is_current_check(2, 1));
    }

    #[test]
    fn test_chain_counter_saturates() {
        let mut sub = TriggerSubscription::new(
            TriggerId::new("t-1").unwrap(),
            filter(),
            RetryPolicy::default(),
        );
        sub.generation = u32::MAX;
        sub.start_chain();
        assert_eq!(sub.generation, u32::MAX);
        assert_eq!(sub.attempt, 0);
    }

    #[test]
    fn test_state_serialization() {
        let json = serde_json::to_string(&SubscriptionState::AwaitingAvailability).unwrap();
        assert_eq!(json, "\"awaiting_availability\"");
    }

    #[test]
    fn test_roundtrip_through_metadata() {
        let mut sub = TriggerSubscription::new(
            TriggerId::new("t-2").unwrap(),
            filter().with_any_of("build-status", ["FAILED"]),
            RetryPolicy::bounded(),
        );
        sub.await_availability(3);

        let value = serde_json::to_value(&sub).unwrap();
        let parsed: TriggerSubscription = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, sub);
    }
}
