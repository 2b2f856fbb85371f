//! End-to-end provisioning scenarios against the in-memory adapters
//!
//! The `Integration` harness plays the host: it owns the rule cache, runs
//! platform-level kickoffs and fires scheduled callbacks by hand.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use eventroute_provisioner::gateway::{GatewayError, ResourceKind};
use eventroute_provisioner::prelude::*;

const REGION: &str = "us-east-1";
const BUILD_DETAIL: &str = "CodeBuild Build State Change";
const PHASE_DETAIL: &str = "CodeBuild Build Phase Change";
const BUILD_RULE: &str = "eventroute-us-east-1-aws-codebuild";

struct Integration {
    router: TriggerRouter<InMemoryProvisioningApi>,
    api: Arc<InMemoryProvisioningApi>,
    bus: Arc<InMemoryMessageBus>,
    store: Arc<InMemoryTriggerMetadataStore>,
    scheduler: Arc<InMemoryScheduler>,
    cache: RuleCache,
}

impl Integration {
    fn new() -> Self {
        let api = Arc::new(InMemoryProvisioningApi::new());
        let bus = Arc::new(InMemoryMessageBus::new());
        let store = Arc::new(InMemoryTriggerMetadataStore::new());
        let scheduler = Arc::new(InMemoryScheduler::new());

        let gateway = ResourceGateway::from_arc(
            Arc::clone(&api),
            GatewaySettings::new(
                "https://hooks.example.com/aws",
                "arn:aws:iam::123456789012:role/eventroute-invoker",
                "s3cret",
            )
            .with_tag("installation", "inst-1"),
        );
        let machine = RoutingStateMachine::new(gateway, bus.clone());
        let router = TriggerRouter::new(machine, store.clone(), scheduler.clone());

        Self {
            router,
            api,
            bus,
            store,
            scheduler,
            cache: RuleCache::new(),
        }
    }

    async fn setup_build(&self, trigger: &str, project: &str) -> Result<Transition, ProvisionError> {
        self.router
            .setup(
                trigger_id(trigger),
                TriggerKind::Build,
                REGION,
                &json!({ "projectName": project }),
                &self.cache,
            )
            .await
    }

    /// Run every pending platform-level action and fold the results into the cache
    async fn run_kickoffs(&mut self) {
        let gateway = self.router.machine().gateway().clone();
        for command in self.scheduler.take() {
            if command.is_callback() {
                // Not ours to run here; put it back
                self.scheduler.schedule(command).await.unwrap();
                continue;
            }
            assert_eq!(command.action_name(), action_names::PROVISION_DESTINATION);
            let region = command.parameters()["region"].as_str().unwrap().to_string();
            let update = gateway.provision_destination(&region).await.unwrap();
            self.cache.apply(update);
        }
    }

    /// The single pending callback, removed from the scheduler
    fn next_callback(&self) -> RoutingCommand {
        let mut callbacks: Vec<_> = self
            .scheduler
            .take()
            .into_iter()
            .filter(RoutingCommand::is_callback)
            .collect();
        assert_eq!(callbacks.len(), 1, "expected exactly one pending callback");
        callbacks.remove(0)
    }

    async fn fire(&self, command: &RoutingCommand) -> Result<Transition, ProvisionError> {
        self.router
            .handle_callback(command.action_name(), command.parameters(), &self.cache)
            .await
    }

    fn apply(&mut self, transition: &Transition) {
        for update in &transition.cache_updates {
            self.cache.apply(update.clone());
        }
    }
}

/// Detail types the remote rule currently forwards
fn remote_detail_types(api: &InMemoryProvisioningApi) -> Vec<String> {
    let Some(pattern) = api.rule_pattern(REGION, BUILD_RULE) else {
        return Vec::new();
    };
    let pattern: Value = serde_json::from_str(&pattern).unwrap();
    pattern["detail-type"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect()
}

fn trigger_id(id: &str) -> TriggerId {
    TriggerId::new(id).unwrap()
}

fn build_event(project: &str) -> EventEnvelope {
    serde_json::from_value(json!({
        "region": REGION,
        "source": "aws.codebuild",
        "detail-type": BUILD_DETAIL,
        "detail": { "project-name": project, "build-status": "FAILED" }
    }))
    .unwrap()
}

#[test_log::test(tokio::test)]
async fn test_scenarios_a_to_d_first_trigger_in_region() {
    let mut it = Integration::new();

    // A: nothing provisioned
    let a = it.setup_build("t-backend", "backend-build").await.unwrap();
    assert_eq!(a.state(), SubscriptionState::AwaitingAvailability);
    assert!(a.subscription.subscription_id.is_none());

    let scheduled = it.scheduler.scheduled();
    assert_eq!(scheduled.len(), 2);
    assert_eq!(
        scheduled[0],
        RoutingCommand::action(
            "provisionDestination",
            json!({ "region": REGION }),
            Duration::from_secs(1)
        )
    );
    assert_eq!(scheduled[1].action_name(), "checkDestinationAvailability");
    assert_eq!(scheduled[1].delay(), Duration::from_secs(5));
    assert_eq!(it.api.total_calls(), 0);

    // B: destination appears, rule does not cover the detail type yet
    it.run_kickoffs().await;
    assert!(it.cache.destination(REGION).is_some());

    let check = it.next_callback();
    let b = it.fire(&check).await.unwrap();
    assert_eq!(b.state(), SubscriptionState::AwaitingAvailability);
    assert_eq!(it.api.calls("put_rule"), 1);
    assert_eq!(it.api.calls("put_target"), 1);
    assert_eq!(b.commands.len(), 1);
    assert_eq!(b.commands[0].action_name(), "checkRuleAvailability");
    assert_eq!(b.commands[0].delay(), Duration::from_secs(10));

    // C: the integration has folded the rule into its cache
    it.apply(&b);
    assert!(it.cache.covers(REGION, "aws.codebuild", BUILD_DETAIL));

    let check = it.next_callback();
    let c = it.fire(&check).await.unwrap();
    assert_eq!(c.state(), SubscriptionState::Subscribed);
    assert!(c
        .subscription
        .subscription_id
        .as_ref()
        .is_some_and(|id| !id.as_str().is_empty()));
    assert!(c.commands.is_empty());
    assert_eq!(it.bus.subscribe_count(), 1);
    assert!(it.scheduler.is_empty());

    // D: events for other projects are dropped, ours are forwarded
    assert!(it.bus.deliver(&build_event("frontend")).is_empty());
    assert_eq!(
        it.bus.deliver(&build_event("backend-build")),
        vec![trigger_id("t-backend")]
    );
}

#[tokio::test]
async fn test_scenario_e_concurrent_connection_creates_share_arn() {
    let it = Integration::new();
    let gateway = it.router.machine().gateway();

    let (first, second) = tokio::join!(
        gateway.ensure_connection(REGION, "dest-1", "x-eventroute-signature", "s3cret"),
        gateway.ensure_connection(REGION, "dest-1", "x-eventroute-signature", "s3cret"),
    );

    let (first, second) = (first.unwrap(), second.unwrap());
    assert_eq!(first, second);
    assert_eq!(it.api.calls("create_connection"), 2);
    assert_eq!(it.api.calls("describe_connection"), 1);
}

#[tokio::test]
async fn test_api_destination_create_race_falls_back_to_describe() {
    let it = Integration::new();
    let gateway = it.router.machine().gateway();

    let connection = gateway
        .ensure_connection(REGION, "dest-1", "x-eventroute-signature", "s3cret")
        .await
        .unwrap();
    let first = gateway
        .ensure_api_destination(REGION, "dest-1", &connection, "https://hooks.example.com/aws")
        .await
        .unwrap();
    let second = gateway
        .ensure_api_destination(REGION, "dest-1", &connection, "https://hooks.example.com/aws")
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(it.api.calls("describe_api_destination"), 1);
}

#[tokio::test]
async fn test_no_duplicate_subscriptions() {
    let mut it = Integration::new();
    it.setup_build("t-1", "backend-build").await.unwrap();
    it.run_kickoffs().await;
    let b = it.fire(&it.next_callback()).await.unwrap();
    it.apply(&b);
    it.fire(&it.next_callback()).await.unwrap();
    assert_eq!(it.bus.subscribe_count(), 1);

    let writes = it.store.write_count();
    let calls = it.api.total_calls();

    let again = it.setup_build("t-1", "backend-build").await.unwrap();
    assert!(!again.changed);
    assert_eq!(again.state(), SubscriptionState::Subscribed);
    assert_eq!(it.bus.subscribe_count(), 1);
    assert_eq!(it.store.write_count(), writes);
    assert_eq!(it.api.total_calls(), calls);
    assert!(it.scheduler.is_empty());
}

#[tokio::test]
async fn test_state_never_regresses_without_routing_change() {
    let mut it = Integration::new();
    let mut states = vec![it.setup_build("t-1", "backend-build").await.unwrap().state()];

    it.run_kickoffs().await;
    let b = it.fire(&it.next_callback()).await.unwrap();
    states.push(b.state());
    it.apply(&b);
    states.push(it.fire(&it.next_callback()).await.unwrap().state());

    // Setup re-run, then a project change under the same routing key
    states.push(it.setup_build("t-1", "backend-build").await.unwrap().state());
    let refined = it.setup_build("t-1", "frontend").await.unwrap();
    assert!(refined.changed);
    assert!(refined.commands.is_empty());
    states.push(refined.state());
    assert_eq!(it.bus.subscribe_count(), 1);

    assert!(states.windows(2).all(|w| w[0] <= w[1]), "{states:?}");
    assert_eq!(states.last(), Some(&SubscriptionState::Subscribed));
}

#[tokio::test]
async fn test_second_trigger_reuses_shared_rule() {
    let mut it = Integration::new();
    it.setup_build("t-1", "backend-build").await.unwrap();
    it.run_kickoffs().await;
    let b = it.fire(&it.next_callback()).await.unwrap();
    it.apply(&b);
    it.fire(&it.next_callback()).await.unwrap();

    let calls = it.api.total_calls();
    let t = it.setup_build("t-2", "frontend").await.unwrap();

    assert_eq!(t.state(), SubscriptionState::Subscribed);
    assert_eq!(it.api.total_calls(), calls);
    assert_eq!(it.bus.deliver(&build_event("frontend")), vec![trigger_id("t-2")]);
}

#[tokio::test]
async fn test_new_detail_type_extends_existing_rule() {
    let mut it = Integration::new();
    it.setup_build("t-1", "backend-build").await.unwrap();
    it.run_kickoffs().await;
    let b = it.fire(&it.next_callback()).await.unwrap();
    it.apply(&b);
    it.fire(&it.next_callback()).await.unwrap();

    let phase = EventFilter::new("aws.codebuild", "CodeBuild Build Phase Change").in_region(REGION);
    let t = it
        .router
        .setup_with(trigger_id("t-phase"), phase, RetryPolicy::unbounded(), &it.cache)
        .await
        .unwrap();
    it.apply(&t);

    let rule = it.cache.rule(REGION, "aws.codebuild").unwrap();
    assert!(rule.covers(BUILD_DETAIL));
    assert!(rule.covers("CodeBuild Build Phase Change"));
    assert_eq!(it.api.calls("put_rule"), 2);
}

#[tokio::test]
async fn test_bounded_trigger_gives_up_after_six_checks() {
    let it = Integration::new();
    it.router
        .setup(
            trigger_id("t-alarm"),
            TriggerKind::Alarm,
            REGION,
            &json!({ "alarmName": "cpu-high" }),
            &it.cache,
        )
        .await
        .unwrap();

    // The destination never appears
    let mut checks = 0;
    let err = loop {
        let check = it.next_callback();
        checks += 1;
        assert_eq!(check.delay(), Duration::from_secs(10));
        match it.fire(&check).await {
            Ok(t) => assert_eq!(t.state(), SubscriptionState::AwaitingAvailability),
            Err(e) => break e,
        }
    };

    assert_eq!(checks, 6);
    assert!(matches!(
        err,
        ProvisionError::RuleNotAvailable { attempts: 6, .. }
    ));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_stale_callback_is_ignored() {
    let it = Integration::new();
    it.setup_build("t-1", "backend-build").await.unwrap();
    let stale = it.next_callback();

    // Setup runs again before the first check fires
    it.setup_build("t-1", "backend-build").await.unwrap();
    let current = it.next_callback();

    let ignored = it.fire(&stale).await.unwrap();
    assert!(!ignored.changed);
    assert!(ignored.commands.is_empty());
    assert!(it.scheduler.is_empty());

    let live = it.fire(&current).await.unwrap();
    assert!(live.changed);
    assert_eq!(it.scheduler.callbacks().len(), 1);
}

#[tokio::test]
async fn test_teardown_ends_the_retry_chain() {
    let it = Integration::new();
    it.setup_build("t-1", "backend-build").await.unwrap();
    let pending = it.next_callback();

    assert!(it.router.teardown(&trigger_id("t-1")).await.unwrap());

    let err = it.fire(&pending).await.unwrap_err();
    assert!(matches!(err, ProvisionError::TriggerGone(_)));
    assert!(it.scheduler.is_empty());
}

#[tokio::test]
async fn test_region_change_orphans_old_subscription() {
    let mut it = Integration::new();
    it.setup_build("t-1", "backend-build").await.unwrap();
    it.run_kickoffs().await;
    let b = it.fire(&it.next_callback()).await.unwrap();
    it.apply(&b);
    let subscribed = it.fire(&it.next_callback()).await.unwrap();
    let old_id = subscribed.subscription.subscription_id.clone();

    let moved = it
        .router
        .setup(
            trigger_id("t-1"),
            TriggerKind::Build,
            "eu-west-1",
            &json!({ "projectName": "backend-build" }),
            &it.cache,
        )
        .await
        .unwrap();

    assert_eq!(moved.state(), SubscriptionState::AwaitingAvailability);
    assert!(moved.subscription.subscription_id.is_none());
    assert_ne!(moved.subscription.subscription_id, old_id);

    let persisted = it.router.subscription(&trigger_id("t-1")).await.unwrap().unwrap();
    assert_eq!(persisted.region(), Some("eu-west-1"));
}

#[tokio::test]
async fn test_transient_gateway_failure_is_retryable() {
    let mut it = Integration::new();
    it.setup_build("t-1", "backend-build").await.unwrap();
    it.run_kickoffs().await;
    let check = it.next_callback();

    it.api.fail_next(
        "put_rule",
        GatewayError::transient(ResourceKind::Rule, BUILD_RULE, "throttled"),
    );
    let err = it.fire(&check).await.unwrap_err();
    assert!(err.is_retryable());

    // State was not advanced, so the same check can be replayed
    let t = it.fire(&check).await.unwrap();
    assert_eq!(t.state(), SubscriptionState::AwaitingAvailability);
    assert_eq!(t.cache_updates.len(), 1);
}

#[tokio::test]
async fn test_persisted_record_shape() {
    let it = Integration::new();
    it.setup_build("t-1", "backend-build").await.unwrap();

    let raw: Value = it.store.get_raw(&trigger_id("t-1")).unwrap();
    assert_eq!(raw["state"], "awaiting_availability");
    assert_eq!(raw["attempt"], 1);
    assert_eq!(raw["generation"], 1);
    assert_eq!(raw["retry_policy"]["first_delay"], 5_000);
    assert_eq!(raw["filter"]["region"], REGION);
}

#[test_log::test(tokio::test)]
async fn test_racing_puts_for_one_source_end_with_both_types_routed() {
    let mut it = Integration::new();
    let gateway = it.router.machine().gateway().clone();
    let destination = gateway.provision_destination(REGION).await.unwrap();
    it.cache.apply(destination);

    // Both triggers read the same snapshot: destination, no rule
    let snapshot = it.cache.clone();
    let state = EventFilter::new("aws.codebuild", BUILD_DETAIL).in_region(REGION);
    let phase = EventFilter::new("aws.codebuild", PHASE_DETAIL).in_region(REGION);
    let a = it
        .router
        .setup_with(trigger_id("t-state"), state, RetryPolicy::unbounded(), &snapshot)
        .await
        .unwrap();
    let b = it
        .router
        .setup_with(trigger_id("t-phase"), phase, RetryPolicy::unbounded(), &snapshot)
        .await
        .unwrap();

    // The second put overwrote the first
    assert_eq!(remote_detail_types(&it.api), vec![PHASE_DETAIL.to_string()]);
    it.apply(&a);
    it.apply(&b);
    assert!(!it.cache.covers(REGION, "aws.codebuild", BUILD_DETAIL));

    let mut subscribed = Vec::new();
    for _ in 0..4 {
        let pending = it.scheduler.take();
        if pending.is_empty() {
            break;
        }
        for check in pending {
            let t = it.fire(&check).await.unwrap();
            it.apply(&t);
            if t.state() == SubscriptionState::Subscribed {
                // Never subscribed while the remote rule drops its type
                let routed = remote_detail_types(&it.api);
                assert!(routed.contains(&t.subscription.filter.detail_type));
                subscribed.push(t.subscription.trigger_id.clone());
            }
        }
    }

    subscribed.sort();
    assert_eq!(subscribed, vec![trigger_id("t-phase"), trigger_id("t-state")]);
    assert_eq!(
        remote_detail_types(&it.api),
        vec![PHASE_DETAIL.to_string(), BUILD_DETAIL.to_string()]
    );
}

#[tokio::test]
async fn test_failed_tagging_is_repaired_by_the_next_kickoff() {
    let mut it = Integration::new();
    let gateway = it.router.machine().gateway().clone();
    it.setup_build("t-1", "backend-build").await.unwrap();
    it.api.fail_next(
        "tag_resource",
        GatewayError::transient(
            ResourceKind::Connection,
            "eventroute-us-east-1-connection",
            "throttled",
        ),
    );

    // The kickoff creates the connection, then fails to tag it
    let check = it.next_callback();
    let err = gateway.provision_destination(REGION).await.unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(it.api.calls("create_connection"), 1);

    // The next check asks for the kickoff again
    let t = it.fire(&check).await.unwrap();
    assert_eq!(t.commands[0].action_name(), action_names::PROVISION_DESTINATION);
    it.run_kickoffs().await;

    let destination = it.cache.destination(REGION).unwrap().clone();
    assert_eq!(it.api.calls("describe_connection"), 1);
    for arn in [&destination.connection_arn, &destination.api_destination_arn] {
        assert_eq!(
            it.api.tags_for(arn).get("installation").map(String::as_str),
            Some("inst-1")
        );
    }

    let b = it.fire(&it.next_callback()).await.unwrap();
    it.apply(&b);
    let c = it.fire(&it.next_callback()).await.unwrap();
    assert_eq!(c.state(), SubscriptionState::Subscribed);
}
