//! Subscription matcher
//!
//! Decides whether an inbound event is forwarded to a trigger. The rule on
//! the AWS side already narrows by source and detail type, but a rule may
//! forward several detail types and the webhook is shared by every trigger
//! in the region, so everything is re-checked here.
//!
//! Matching is a pure function of (event, filter).

use serde_json::Value;
use tracing::info;

use crate::envelope::EventEnvelope;
use crate::filter::EventFilter;
use crate::subscription::TriggerSubscription;

/// Why an event did not match a filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mismatch {
    Region { expected: String, actual: String },
    Source { expected: String, actual: String },
    DetailType { expected: String, actual: String },
    /// No predicate configured for `field` accepted the value
    Predicate { field: String, value: Option<String> },
}

impl std::fmt::Display for Mismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Region { expected, actual } => {
                write!(f, "region {actual} is not {expected}")
            }
            Self::Source { expected, actual } => {
                write!(f, "source {actual} is not {expected}")
            }
            Self::DetailType { expected, actual } => {
                write!(f, "detail type {actual} is not {expected}")
            }
            Self::Predicate { field, value } => match value {
                Some(value) => write!(f, "{field}={value} rejected"),
                None => write!(f, "{field} missing"),
            },
        }
    }
}

/// The first reason `event` fails `filter`, or `None` when it matches
pub fn mismatch(event: &EventEnvelope, filter: &EventFilter) -> Option<Mismatch> {
    if let Some(region) = &filter.region {
        if *region != event.region {
            return Some(Mismatch::Region {
                expected: region.clone(),
                actual: event.region.clone(),
            });
        }
    }

    if filter.source != event.source {
        return Some(Mismatch::Source {
            expected: filter.source.clone(),
            actual: event.source.clone(),
        });
    }

    if filter.detail_type != event.detail_type {
        return Some(Mismatch::DetailType {
            expected: filter.detail_type.clone(),
            actual: event.detail_type.clone(),
        });
    }

    for (field, predicates) in &filter.detail_predicates {
        if predicates.is_empty() {
            continue;
        }
        let value = event.detail_field(field).map(coerce);
        if !predicates.iter().any(|p| p.evaluate(value.as_deref())) {
            return Some(Mismatch::Predicate {
                field: field.clone(),
                value,
            });
        }
    }

    None
}

/// Whether `event` should be forwarded to the trigger owning `filter`
///
/// Mismatches are expected traffic and are logged at info level.
pub fn matches(event: &EventEnvelope, filter: &EventFilter) -> bool {
    match mismatch(event, filter) {
        None => true,
        Some(reason) => {
            info!(
                source = %event.source,
                detail_type = %event.detail_type,
                reason = %reason,
                "event dropped by filter"
            );
            false
        }
    }
}

/// The subscribed triggers that should receive `event`
pub fn route_event<'a, I>(event: &EventEnvelope, subscriptions: I) -> Vec<&'a TriggerSubscription>
where
    I: IntoIterator<Item = &'a TriggerSubscription>,
{
    subscriptions
        .into_iter()
        .filter(|sub| sub.is_subscribed() && matches(event, &sub.filter))
        .collect()
}

/// String form of a detail value used by predicates
fn coerce(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Bool(_) | Value::Number(_) | Value::Array(_) | Value::Object(_) => {
            value.to_string()
        }
    }
}
