//! Provisioning state machine
//!
//! `ensure_routed` brings one trigger's subscription towards `Subscribed`:
//!
//! 1. Rule cached for (region, source) covering the detail type: subscribe.
//! 2. No API destination in the region: ask the integration to provision
//!    one and check back later.
//! 3. Destination present, rule missing the detail type: put the rule and
//!    target, and check back later.
//!
//! Waiting is never done in-process. A transition returns the commands the
//! host must schedule and the cache updates the integration must persist;
//! the next check re-enters with a freshly read cache.

use std::sync::Arc;

use eventroute_core::{
    CacheUpdate, EventFilter, RetryPolicy, RuleCache, SubscriptionState, TriggerId,
    TriggerSubscription,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, instrument, warn};

use crate::bus::MessageBus;
use crate::command::{action_names, RoutingCommand, PROVISION_KICKOFF_DELAY};
use crate::error::ProvisionError;
use crate::gateway::{ProvisioningApi, ResourceGateway};

/// Parameters carried by availability-check callbacks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackParams {
    pub trigger_id: TriggerId,
    /// Chain the check belongs to
    pub generation: u32,
    /// Ordinal of the check within its chain
    pub attempt: u32,
}

/// What the trigger wants routed
#[derive(Debug, Clone)]
pub struct EnsureRequest {
    pub trigger_id: TriggerId,
    pub filter: EventFilter,
    pub retry_policy: RetryPolicy,
    /// Set when this invocation is availability check number `n`; `None` for Setup
    pub check: Option<u32>,
}

impl EnsureRequest {
    /// A Setup request
    pub fn setup(trigger_id: TriggerId, filter: EventFilter, retry_policy: RetryPolicy) -> Self {
        Self {
            trigger_id,
            filter,
            retry_policy,
            check: None,
        }
    }

    /// Re-run a persisted subscription as availability check `attempt`
    pub fn follow_up(subscription: &TriggerSubscription, attempt: u32) -> Self {
        Self {
            trigger_id: subscription.trigger_id.clone(),
            filter: subscription.filter.clone(),
            retry_policy: subscription.retry_policy.clone(),
            check: Some(attempt),
        }
    }
}

/// Result of one `ensure_routed` call
#[derive(Debug, Clone, Serialize)]
pub struct Transition {
    /// Subscription to persist
    pub subscription: TriggerSubscription,

    /// Work for the host scheduler, in order
    pub commands: Vec<RoutingCommand>,

    /// Instructions for the integration's rule cache
    pub cache_updates: Vec<CacheUpdate>,

    /// Whether `subscription` differs from what was loaded
    pub changed: bool,
}

impl Transition {
    fn unchanged(subscription: TriggerSubscription) -> Self {
        Self {
            subscription,
            commands: Vec::new(),
            cache_updates: Vec::new(),
            changed: false,
        }
    }

    fn updated(subscription: TriggerSubscription) -> Self {
        Self {
            changed: true,
            ..Self::unchanged(subscription)
        }
    }

    pub fn state(&self) -> SubscriptionState {
        self.subscription.state
    }
}

/// Drives subscriptions through provisioning
pub struct RoutingStateMachine<A: ProvisioningApi> {
    gateway: ResourceGateway<A>,
    bus: Arc<dyn MessageBus>,
}

impl<A: ProvisioningApi> RoutingStateMachine<A> {
    pub fn new(gateway: ResourceGateway<A>, bus: Arc<dyn MessageBus>) -> Self {
        Self { gateway, bus }
    }

    pub fn gateway(&self) -> &ResourceGateway<A> {
        &self.gateway
    }

    /// Advance `current` towards `Subscribed` for `request`
    ///
    /// `cache` is a snapshot and is never mutated; see
    /// [`Transition::cache_updates`].
    #[instrument(
        skip(self, request, current, cache),
        fields(trigger_id = %request.trigger_id, check = ?request.check)
    )]
    pub async fn ensure_routed(
        &self,
        request: EnsureRequest,
        current: Option<TriggerSubscription>,
        cache: &RuleCache,
    ) -> Result<Transition, ProvisionError> {
        let key = request.filter.routing_key()?;

        let mut subscription = match current {
            Some(existing) if existing.routing_key().ok().as_ref() == Some(&key) => existing,
            Some(stale) => {
                if let Some(old_id) = &stale.subscription_id {
                    warn!(
                        subscription_id = %old_id,
                        routing_key = %key,
                        "routing changed, orphaning previous subscription"
                    );
                }
                TriggerSubscription::new(
                    request.trigger_id.clone(),
                    request.filter.clone(),
                    request.retry_policy.clone(),
                )
            }
            None => TriggerSubscription::new(
                request.trigger_id.clone(),
                request.filter.clone(),
                request.retry_policy.clone(),
            ),
        };

        // Idempotency guard: never subscribe twice for the same routing key
        if subscription.is_subscribed() {
            if subscription.filter == request.filter {
                debug!("already subscribed");
                return Ok(Transition::unchanged(subscription));
            }
            debug!("refining predicates of subscribed trigger");
            subscription.refine_filter(request.filter);
            return Ok(Transition::updated(subscription));
        }

        subscription.filter = request.filter;
        subscription.retry_policy = request.retry_policy;
        let next_attempt = match request.check {
            None => {
                subscription.start_chain();
                1
            }
            Some(attempt) => attempt.saturating_add(1),
        };

        let filter = &subscription.filter;
        let (region, source, detail_type) = (&key.region, &filter.source, &filter.detail_type);

        // 1. Steady state
        if cache.covers(region, source, detail_type) {
            let subscription_id = self
                .bus
                .subscribe(&subscription.trigger_id, &subscription.filter)
                .await?;
            info!(%subscription_id, routing_key = %key, "trigger subscribed");
            subscription.mark_subscribed(subscription_id);
            return Ok(Transition::updated(subscription));
        }

        let exhausted = |attempts: u32| ProvisionError::RuleNotAvailable {
            region: region.clone(),
            event_source: source.clone(),
            detail_type: detail_type.clone(),
            attempts,
        };
        if let Some(attempt) = request.check {
            if !subscription.retry_policy.has_attempts_remaining(attempt) {
                warn!(attempt, "availability checks exhausted");
                return Err(exhausted(attempt));
            }
        }

        let mut commands = Vec::with_capacity(2);
        let mut cache_updates = Vec::new();
        let check_action = match cache.destination(region) {
            // 2. Region has no destination yet
            None => {
                info!(%region, "requesting api destination");
                commands.push(RoutingCommand::action(
                    action_names::PROVISION_DESTINATION,
                    json!({ "region": region }),
                    PROVISION_KICKOFF_DELAY,
                ));
                action_names::CHECK_DESTINATION_AVAILABILITY
            }
            // 3. Destination exists, rule does not cover the detail type
            Some(destination) => {
                let update = self
                    .gateway
                    .provision_rule(
                        region,
                        destination,
                        cache.rule(region, source),
                        source,
                        detail_type,
                    )
                    .await
                    .map_err(|e| ProvisionError::gateway(region, e))?;
                cache_updates.push(update);
                action_names::CHECK_RULE_AVAILABILITY
            }
        };

        let params = CallbackParams {
            trigger_id: subscription.trigger_id.clone(),
            generation: subscription.generation,
            attempt: next_attempt,
        };
        let delay = subscription.retry_policy.delay_for_attempt(next_attempt);
        commands.push(RoutingCommand::callback(
            check_action,
            serde_json::to_value(&params)?,
            delay,
        ));
        debug!(check_action, attempt = next_attempt, ?delay, "availability check scheduled");

        subscription.await_availability(next_attempt);
        Ok(Transition {
            subscription,
            commands,
            cache_updates,
            changed: true,
        })
    }
}
