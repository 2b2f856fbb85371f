//! Provisioning errors

use eventroute_core::{FilterError, TriggerId};

use crate::bus::BusError;
use crate::gateway::GatewayError;
use crate::persistence::StoreError;
use crate::schedule::ScheduleError;

/// Errors from routing a trigger
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    /// A gateway call failed; `AlreadyExists` never reaches here
    #[error("provisioning in {region} failed: {error}")]
    Gateway {
        region: String,
        #[source]
        error: GatewayError,
    },

    /// Store error
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Bus error
    #[error("bus error: {0}")]
    Bus(#[from] BusError),

    /// Scheduler error
    #[error("schedule error: {0}")]
    Schedule(#[from] ScheduleError),

    /// The trigger's filter is unusable
    #[error("invalid filter: {0}")]
    Filter(#[from] FilterError),

    /// Persisted state exists but cannot be read
    #[error("persisted state for trigger {trigger_id} is unreadable: {reason}")]
    Decode { trigger_id: TriggerId, reason: String },

    /// A callback arrived with an unknown action or bad parameters
    #[error("invalid callback {action_name}: {reason}")]
    InvalidCallback { action_name: String, reason: String },

    /// A bounded trigger ran out of availability checks
    #[error("rule not available for {event_source} / {detail_type} in {region} after {attempts} checks")]
    RuleNotAvailable {
        region: String,
        event_source: String,
        detail_type: String,
        attempts: u32,
    },

    /// A callback arrived for a trigger that was torn down
    #[error("trigger {0} has no persisted state")]
    TriggerGone(TriggerId),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ProvisionError {
    pub(crate) fn gateway(region: &str, error: GatewayError) -> Self {
        Self::Gateway {
            region: region.to_string(),
            error,
        }
    }

    /// Whether the host may recover by invoking the same entry point later
    ///
    /// Only transient gateway failures qualify; everything else needs a
    /// configuration or operator change.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Gateway { error, .. } => error.is_retryable(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::ResourceKind;
    use std::error::Error as _;

    #[test]
    fn test_gateway_error_keeps_context() {
        let err = ProvisionError::gateway(
            "us-east-1",
            GatewayError::transient(ResourceKind::Rule, "eventroute-us-east-1-aws-ecr", "throttled"),
        );
        assert!(err.is_retryable());
        assert!(err.to_string().contains("us-east-1"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_not_available_is_terminal() {
        let err = ProvisionError::RuleNotAvailable {
            region: "us-east-1".into(),
            event_source: "aws.cloudwatch".into(),
            detail_type: "CloudWatch Alarm State Change".into(),
            attempts: 6,
        };
        assert!(!err.is_retryable());
        assert_eq!(
            err.to_string(),
            "rule not available for aws.cloudwatch / CloudWatch Alarm State Change in us-east-1 after 6 checks"
        );
    }
}
