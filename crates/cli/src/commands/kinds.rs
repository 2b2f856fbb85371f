// Trigger kind listing command

use crate::output::{OutputFormat, Table};
use anyhow::Result;
use eventroute_core::{RetryPolicy, TriggerKind};
use serde::Serialize;

/// Kind info for JSON/YAML output
#[derive(Debug, Serialize)]
struct KindInfo {
    name: &'static str,
    source: &'static str,
    detail_type: &'static str,
    retry_policy: RetryPolicy,
}

fn describe_retry(policy: &RetryPolicy) -> String {
    let bound = match policy.max_attempts {
        Some(max) => format!("{max} checks"),
        None => "unbounded".to_string(),
    };
    format!(
        "{}s then every {}s, {}",
        policy.first_delay.as_secs(),
        policy.interval.as_secs(),
        bound
    )
}

pub fn run(output: OutputFormat) -> Result<()> {
    let kinds: Vec<KindInfo> = TriggerKind::ALL
        .into_iter()
        .map(|kind| KindInfo {
            name: kind.name(),
            source: kind.source(),
            detail_type: kind.detail_type(),
            retry_policy: kind.retry_policy(),
        })
        .collect();

    if !output.is_text() {
        return output.print_value(&kinds);
    }

    let mut table = Table::new(&["NAME", "SOURCE", "DETAIL TYPE", "CHECKS"]);
    for kind in &kinds {
        table.row([
            kind.name.to_string(),
            kind.source.to_string(),
            kind.detail_type.to_string(),
            describe_retry(&kind.retry_policy),
        ]);
    }
    table.print();
    Ok(())
}
