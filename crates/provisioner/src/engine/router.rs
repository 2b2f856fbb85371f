//! Trigger router
//!
//! The entry points the host calls: Setup, availability-check callbacks and
//! teardown. Each one loads the trigger's persisted subscription, runs the
//! state machine, persists the result and only then hands commands to the
//! scheduler, so a callback can never observe state older than the one that
//! scheduled it.

use std::sync::Arc;

use eventroute_core::{
    EventFilter, RetryPolicy, RuleCache, TriggerId, TriggerKind, TriggerSubscription,
};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use super::state_machine::{CallbackParams, EnsureRequest, RoutingStateMachine, Transition};
use crate::config::RetryOverrides;
use crate::error::ProvisionError;
use crate::gateway::ProvisioningApi;
use crate::persistence::TriggerMetadataStore;
use crate::schedule::Scheduler;

/// Routes triggers through the state machine with persistence and scheduling
pub struct TriggerRouter<A: ProvisioningApi> {
    machine: RoutingStateMachine<A>,
    store: Arc<dyn TriggerMetadataStore>,
    scheduler: Arc<dyn Scheduler>,
    retry_overrides: RetryOverrides,
}

impl<A: ProvisioningApi> TriggerRouter<A> {
    pub fn new(
        machine: RoutingStateMachine<A>,
        store: Arc<dyn TriggerMetadataStore>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Self {
        Self {
            machine,
            store,
            scheduler,
            retry_overrides: RetryOverrides::default(),
        }
    }

    /// Apply installation-wide overrides to every trigger kind's retry policy
    pub fn with_retry_overrides(mut self, overrides: RetryOverrides) -> Self {
        self.retry_overrides = overrides;
        self
    }

    pub fn machine(&self) -> &RoutingStateMachine<A> {
        &self.machine
    }

    /// Retry policy used for `kind` after overrides
    pub fn retry_policy_for(&self, kind: TriggerKind) -> RetryPolicy {
        self.retry_overrides.apply(kind.retry_policy())
    }

    /// Setup for a built-in trigger kind
    #[instrument(skip_all, fields(trigger_id = %trigger_id, kind = %kind, region = %region))]
    pub async fn setup(
        &self,
        trigger_id: TriggerId,
        kind: TriggerKind,
        region: &str,
        config: &Value,
        cache: &RuleCache,
    ) -> Result<Transition, ProvisionError> {
        let filter = kind.build_filter(region, config)?;
        self.setup_with(trigger_id, filter, self.retry_policy_for(kind), cache)
            .await
    }

    /// Setup with a caller-built filter
    ///
    /// Unreadable persisted state is discarded with a warning: Setup has
    /// everything it needs to start over.
    #[instrument(skip_all, fields(trigger_id = %trigger_id))]
    pub async fn setup_with(
        &self,
        trigger_id: TriggerId,
        filter: EventFilter,
        retry_policy: RetryPolicy,
        cache: &RuleCache,
    ) -> Result<Transition, ProvisionError> {
        let current = match self.load(&trigger_id).await {
            Ok(current) => current,
            Err(ProvisionError::Decode { reason, .. }) => {
                warn!(%reason, "discarding unreadable trigger state");
                None
            }
            Err(e) => return Err(e),
        };

        let request = EnsureRequest::setup(trigger_id, filter, retry_policy);
        let transition = self.machine.ensure_routed(request, current, cache).await?;
        self.commit(&transition).await?;
        Ok(transition)
    }

    /// Handle an availability-check callback
    ///
    /// A callback from a superseded chain, or one arriving after the trigger
    /// subscribed, is acknowledged without doing anything.
    #[instrument(skip(self, parameters, cache))]
    pub async fn handle_callback(
        &self,
        action_name: &str,
        parameters: &Value,
        cache: &RuleCache,
    ) -> Result<Transition, ProvisionError> {
        let invalid = |reason: String| ProvisionError::InvalidCallback {
            action_name: action_name.to_string(),
            reason,
        };
        if !crate::command::action_names::is_availability_check(action_name) {
            return Err(invalid("unknown action".to_string()));
        }
        let params: CallbackParams =
            serde_json::from_value(parameters.clone()).map_err(|e| invalid(e.to_string()))?;

        let current = self
            .load(&params.trigger_id)
            .await?
            .ok_or_else(|| ProvisionError::TriggerGone(params.trigger_id.clone()))?;

        if !current.is_current_check(params.generation, params.attempt) {
            debug!(
                trigger_id = %params.trigger_id,
                generation = params.generation,
                attempt = params.attempt,
                persisted_generation = current.generation,
                persisted_attempt = current.attempt,
                state = %current.state,
                "ignoring stale callback"
            );
            return Ok(Transition {
                subscription: current,
                commands: Vec::new(),
                cache_updates: Vec::new(),
                changed: false,
            });
        }

        let request = EnsureRequest::follow_up(&current, params.attempt);
        let transition = self
            .machine
            .ensure_routed(request, Some(current), cache)
            .await?;
        self.commit(&transition).await?;
        Ok(transition)
    }

    /// Forget a trigger; any pending callback for it will end its chain
    ///
    /// Shared AWS resources and the bus subscription are left in place.
    #[instrument(skip_all, fields(trigger_id = %trigger_id))]
    pub async fn teardown(&self, trigger_id: &TriggerId) -> Result<bool, ProvisionError> {
        let removed = self.store.delete(trigger_id).await?;
        info!(removed, "trigger torn down");
        Ok(removed)
    }

    /// Persisted subscription for a trigger
    pub async fn subscription(
        &self,
        trigger_id: &TriggerId,
    ) -> Result<Option<TriggerSubscription>, ProvisionError> {
        self.load(trigger_id).await
    }

    async fn load(
        &self,
        trigger_id: &TriggerId,
    ) -> Result<Option<TriggerSubscription>, ProvisionError> {
        let Some(value) = self.store.load(trigger_id).await? else {
            return Ok(None);
        };
        let subscription: TriggerSubscription =
            serde_json::from_value(value).map_err(|e| ProvisionError::Decode {
                trigger_id: trigger_id.clone(),
                reason: e.to_string(),
            })?;

        if &subscription.trigger_id != trigger_id {
            return Err(ProvisionError::Decode {
                trigger_id: trigger_id.clone(),
                reason: format!("record belongs to trigger {}", subscription.trigger_id),
            });
        }
        Ok(Some(subscription))
    }

    /// Persist, then schedule
    async fn commit(&self, transition: &Transition) -> Result<(), ProvisionError> {
        if transition.changed {
            let sub = &transition.subscription;
            self.store
                .save(&sub.trigger_id, serde_json::to_value(sub)?)
                .await?;
            debug!(state = %sub.state, attempt = sub.attempt, "trigger state persisted");
        }
        for command in &transition.commands {
            self.scheduler.schedule(command.clone()).await?;
        }
        Ok(())
    }
}
