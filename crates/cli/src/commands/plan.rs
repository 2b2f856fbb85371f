// Provisioning plan command
//
// Runs Setup for a trigger against in-memory adapters and prints what the
// provisioner would do. With --simulate it also plays the integration:
// running kickoffs, folding cache updates and firing callbacks until the
// trigger subscribes or gives up.

use std::sync::Arc;

use crate::output::{print_field, read_document, OutputFormat};
use anyhow::{Context, Result};
use eventroute_provisioner::prelude::*;
use serde::Serialize;
use serde_json::Value;

/// Guards against a simulation that never converges
const MAX_SIMULATED_STEPS: usize = 32;

pub struct PlanArgs {
    pub kind: TriggerKind,
    pub region: String,
    pub config: String,
    pub cache: Option<String>,
    pub trigger_id: String,
    pub simulate: bool,
}

#[derive(Debug, Serialize)]
struct PlanStep {
    step: usize,
    entry_point: String,
    transition: Transition,
}

#[derive(Debug, Serialize)]
struct Plan {
    steps: Vec<PlanStep>,
    cache: RuleCache,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn load_settings() -> (GatewaySettings, RetryOverrides) {
    match ProvisionerConfig::from_env() {
        Ok(config) => (config.gateway, config.retry),
        Err(e) => {
            tracing::debug!(error = %e, "provisioner config incomplete, planning with placeholders");
            (
                GatewaySettings::new(
                    "https://hooks.example.invalid/aws",
                    "arn:aws:iam::123456789012:role/eventroute-invoker",
                    "placeholder",
                ),
                RetryOverrides::default(),
            )
        }
    }
}

pub async fn run(output: OutputFormat, quiet: bool, args: PlanArgs) -> Result<()> {
    let config: Value = read_document(&args.config).context("Invalid trigger configuration")?;
    let mut cache: RuleCache = match &args.cache {
        Some(doc) => read_document(doc).context("Invalid rule cache")?,
        None => RuleCache::new(),
    };
    let trigger_id = TriggerId::new(args.trigger_id.as_str()).context("Trigger id is empty")?;

    let (settings, overrides) = load_settings();
    let scheduler = Arc::new(InMemoryScheduler::new());
    let machine = RoutingStateMachine::new(
        ResourceGateway::new(InMemoryProvisioningApi::new(), settings),
        Arc::new(InMemoryMessageBus::new()),
    );
    let router = TriggerRouter::new(
        machine,
        Arc::new(InMemoryTriggerMetadataStore::new()),
        scheduler.clone(),
    )
    .with_retry_overrides(overrides);

    let mut plan = Plan {
        steps: Vec::new(),
        cache: RuleCache::new(),
        error: None,
    };

    let first = router
        .setup(trigger_id, args.kind, &args.region, &config, &cache)
        .await?;
    record(&mut plan, &mut cache, "setup", first);

    if args.simulate {
        if let Err(e) = simulate(&router, &scheduler, &mut cache, &mut plan).await {
            plan.error = Some(e.to_string());
        }
    }
    plan.cache = cache;

    if !output.is_text() {
        return output.print_value(&plan);
    }
    print_plan(&plan, quiet);
    Ok(())
}

fn record(plan: &mut Plan, cache: &mut RuleCache, entry_point: &str, transition: Transition) {
    for update in &transition.cache_updates {
        cache.apply(update.clone());
    }
    plan.steps.push(PlanStep {
        step: plan.steps.len() + 1,
        entry_point: entry_point.to_string(),
        transition,
    });
}

async fn simulate(
    router: &TriggerRouter<InMemoryProvisioningApi>,
    scheduler: &InMemoryScheduler,
    cache: &mut RuleCache,
    plan: &mut Plan,
) -> Result<(), ProvisionError> {
    let gateway = router.machine().gateway();

    while plan.steps.len() < MAX_SIMULATED_STEPS {
        let pending = scheduler.take();
        if pending.is_empty() {
            return Ok(());
        }

        // Kickoffs run first: they are due sooner than any check
        let (callbacks, actions): (Vec<_>, Vec<_>) =
            pending.into_iter().partition(RoutingCommand::is_callback);
        for action in actions {
            let Some(region) = action.parameters()["region"].as_str() else {
                continue;
            };
            let update = gateway
                .provision_destination(region)
                .await
                .map_err(|e| ProvisionError::Gateway {
                    region: region.to_string(),
                    error: e,
                })?;
            cache.apply(update);
        }

        for callback in callbacks {
            let transition = router
                .handle_callback(callback.action_name(), callback.parameters(), cache)
                .await?;
            record(plan, cache, callback.action_name(), transition);
        }
    }
    Ok(())
}

fn print_plan(plan: &Plan, quiet: bool) {
    for step in &plan.steps {
        let t = &step.transition;
        if quiet {
            println!("{} {} {}", step.step, step.entry_point, t.state());
            continue;
        }

        println!("Step {} ({})", step.step, step.entry_point);
        print_field("State", &t.state().to_string());
        if let Some(id) = &t.subscription.subscription_id {
            print_field("Subscription", id.as_str());
        }
        for command in &t.commands {
            let kind = if command.is_callback() { "callback" } else { "action" };
            print_field(
                "Schedule",
                &format!(
                    "{} {} in {}s",
                    kind,
                    command.action_name(),
                    command.delay().as_secs()
                ),
            );
        }
        if !t.cache_updates.is_empty() {
            print_field("Cache updates", &t.cache_updates.len().to_string());
        }
        println!();
    }

    if let Some(error) = &plan.error {
        print_field("Error", error);
    }
}
