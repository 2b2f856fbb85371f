//! Commands the state machine hands to the host scheduler

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Entry points the host invokes on our behalf
pub mod action_names {
    /// Platform-level kickoff that provisions a region's API destination
    pub const PROVISION_DESTINATION: &str = "provisionDestination";

    /// Follow-up check while the region's destination is missing
    pub const CHECK_DESTINATION_AVAILABILITY: &str = "checkDestinationAvailability";

    /// Follow-up check while the rule for (region, source) is missing
    pub const CHECK_RULE_AVAILABILITY: &str = "checkRuleAvailability";

    /// Whether `name` is one of the follow-up checks
    pub fn is_availability_check(name: &str) -> bool {
        name == CHECK_DESTINATION_AVAILABILITY || name == CHECK_RULE_AVAILABILITY
    }
}

/// Delay before the platform-level destination kickoff runs
pub const PROVISION_KICKOFF_DELAY: Duration = Duration::from_secs(1);

/// Delayed work requested by a transition
///
/// Commands are data; nothing waits in-process. The host persists them and
/// calls back after `delay`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoutingCommand {
    /// Re-invoke one of our own entry points
    ScheduleCallback {
        action_name: String,

        parameters: serde_json::Value,

        #[serde(with = "eventroute_core::duration_millis")]
        delay: Duration,
    },

    /// Ask the integration to run a platform-level action
    ScheduleAction {
        action_name: String,

        parameters: serde_json::Value,

        #[serde(with = "eventroute_core::duration_millis")]
        delay: Duration,
    },
}

impl RoutingCommand {
    pub fn callback(
        action_name: impl Into<String>,
        parameters: serde_json::Value,
        delay: Duration,
    ) -> Self {
        Self::ScheduleCallback {
            action_name: action_name.into(),
            parameters,
            delay,
        }
    }

    pub fn action(
        action_name: impl Into<String>,
        parameters: serde_json::Value,
        delay: Duration,
    ) -> Self {
        Self::ScheduleAction {
            action_name: action_name.into(),
            parameters,
            delay,
        }
    }

    pub fn action_name(&self) -> &str {
        match self {
            Self::ScheduleCallback { action_name, .. } | Self::ScheduleAction { action_name, .. } => {
                action_name
            }
        }
    }

    pub fn parameters(&self) -> &serde_json::Value {
        match self {
            Self::ScheduleCallback { parameters, .. } | Self::ScheduleAction { parameters, .. } => {
                parameters
            }
        }
    }

    pub fn delay(&self) -> Duration {
        match self {
            Self::ScheduleCallback { delay, .. } | Self::ScheduleAction { delay, .. } => *delay,
        }
    }

    /// Whether this re-invokes our own entry point
    pub fn is_callback(&self) -> bool {
        matches!(self, Self::ScheduleCallback { .. })
    }
}
