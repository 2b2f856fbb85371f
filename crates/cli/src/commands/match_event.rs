// Event matching command

use crate::output::{print_field, read_document, OutputFormat};
use anyhow::{Context, Result};
use eventroute_core::{mismatch, EventEnvelope, EventFilter, TriggerKind};
use serde::Serialize;
use serde_json::Value;

/// How the filter to test against is given
pub enum FilterSource {
    /// A stored filter document
    Filter(String),
    /// A trigger kind plus its configuration
    Trigger {
        kind: TriggerKind,
        region: String,
        config: String,
    },
}

#[derive(Debug, Serialize)]
struct MatchResult {
    matched: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
    filter: EventFilter,
}

pub fn run(output: OutputFormat, quiet: bool, event: &str, filter: FilterSource) -> Result<()> {
    let event: EventEnvelope = read_document(event).context("Invalid event")?;
    let filter = match filter {
        FilterSource::Filter(doc) => read_document::<EventFilter>(&doc).context("Invalid filter")?,
        FilterSource::Trigger {
            kind,
            region,
            config,
        } => {
            let config: Value = read_document(&config).context("Invalid trigger configuration")?;
            kind.build_filter(&region, &config)?
        }
    };

    let reason = mismatch(&event, &filter).map(|m| m.to_string());
    let result = MatchResult {
        matched: reason.is_none(),
        reason,
        filter,
    };

    if !output.is_text() {
        return output.print_value(&result);
    }
    if quiet {
        println!("{}", result.matched);
        return Ok(());
    }

    print_field("Source", &event.source);
    print_field("Detail type", &event.detail_type);
    match &result.reason {
        None => print_field("Result", "match"),
        Some(reason) => {
            print_field("Result", "no match");
            print_field("Reason", reason);
        }
    }
    Ok(())
}
