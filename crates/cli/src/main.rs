// Eventroute CLI
//
// Design Decision: Use clap derive for ergonomic argument parsing.
// Design Decision: Support text/json/yaml output formats for scripting.
// Design Decision: Everything runs against in-memory adapters; no AWS calls.

mod commands;
mod output;

use clap::{Parser, Subcommand};
use eventroute_core::telemetry::{init_telemetry, TelemetryConfig};
use eventroute_core::TriggerKind;

#[derive(Parser)]
#[command(name = "eventroute")]
#[command(about = "Eventroute CLI - Plan EventBridge routing and test trigger filters")]
#[command(version)]
pub struct Cli {
    /// Output format
    #[arg(long, short, default_value = "text", value_parser = ["text", "json", "yaml"])]
    pub output: String,

    /// Suppress non-essential output
    #[arg(long, short)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List supported trigger kinds
    Kinds,

    /// Check whether an event would be forwarded to a trigger
    Match {
        /// Event envelope (file path or inline JSON/YAML)
        #[arg(long, short)]
        event: String,

        /// Stored trigger filter (file path or inline JSON/YAML)
        #[arg(long, short, conflicts_with_all = ["trigger", "config"])]
        filter: Option<String>,

        /// Trigger kind (e.g. on_build)
        #[arg(long, short, requires_all = ["region", "config"])]
        trigger: Option<TriggerKind>,

        /// Region the trigger is configured in
        #[arg(long, short)]
        region: Option<String>,

        /// Trigger configuration (file path or inline JSON/YAML)
        #[arg(long, short)]
        config: Option<String>,
    },

    /// Show the provisioning steps Setup would take for a trigger
    Plan {
        /// Trigger kind (e.g. on_build)
        #[arg(long, short)]
        trigger: TriggerKind,

        /// Region the trigger is configured in
        #[arg(long, short)]
        region: String,

        /// Trigger configuration (file path or inline JSON/YAML)
        #[arg(long, short)]
        config: String,

        /// Current rule cache (file path or inline JSON/YAML)
        #[arg(long)]
        cache: Option<String>,

        /// Trigger id to plan for
        #[arg(long, default_value = "plan-trigger")]
        trigger_id: String,

        /// Keep going through kickoffs and callbacks until the trigger settles
        #[arg(long)]
        simulate: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_telemetry(TelemetryConfig::from_env());

    let cli = Cli::parse();
    let output_format = output::OutputFormat::parse(&cli.output);

    match cli.command {
        Commands::Kinds => commands::kinds::run(output_format),
        Commands::Match {
            event,
            filter,
            trigger,
            region,
            config,
        } => {
            let source = match (filter, trigger, region, config) {
                (Some(doc), _, _, _) => commands::match_event::FilterSource::Filter(doc),
                (None, Some(kind), Some(region), Some(config)) => {
                    commands::match_event::FilterSource::Trigger {
                        kind,
                        region,
                        config,
                    }
                }
                _ => anyhow::bail!(
                    "Either --filter or --trigger with --region and --config is required"
                ),
            };
            commands::match_event::run(output_format, cli.quiet, &event, source)
        }
        Commands::Plan {
            trigger,
            region,
            config,
            cache,
            trigger_id,
            simulate,
        } => {
            commands::plan::run(
                output_format,
                cli.quiet,
                commands::plan::PlanArgs {
                    kind: trigger,
                    region,
                    config,
                    cache,
                    trigger_id,
                    simulate,
                },
            )
            .await
        }
    }
}
