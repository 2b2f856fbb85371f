//! # Eventroute Provisioner
//!
//! Lazily provisions the EventBridge plumbing that carries AWS events to the
//! platform webhook, then subscribes each trigger to its slice of the stream.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      TriggerRouter                           │
//! │  (load state, run state machine, persist, schedule)         │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   RoutingStateMachine                        │
//! │  (rule cache snapshot in, commands + cache updates out)     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    ResourceGateway                           │
//! │  (create-or-describe over EventBridge, tags everything)     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The host supplies four ports: [`TriggerMetadataStore`], [`Scheduler`],
//! [`MessageBus`] and a [`CredentialedIssuer`]. In-memory versions of all of
//! them ship with the crate.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use eventroute_provisioner::prelude::*;
//! use serde_json::json;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let machine = RoutingStateMachine::new(
//!     ResourceGateway::new(
//!         InMemoryProvisioningApi::new(),
//!         GatewaySettings::new("https://hooks.example.com/aws", "arn:aws:iam::1:role/r", "secret"),
//!     ),
//!     Arc::new(InMemoryMessageBus::new()),
//! );
//! let scheduler = Arc::new(InMemoryScheduler::new());
//! let router = TriggerRouter::new(
//!     machine,
//!     Arc::new(InMemoryTriggerMetadataStore::new()),
//!     scheduler.clone(),
//! );
//!
//! let transition = router
//!     .setup(
//!         TriggerId::new("trigger-1").unwrap(),
//!         TriggerKind::Build,
//!         "us-east-1",
//!         &json!({ "projectName": "backend-build" }),
//!         &RuleCache::new(),
//!     )
//!     .await
//!     .unwrap();
//!
//! assert_eq!(transition.state(), SubscriptionState::AwaitingAvailability);
//! assert_eq!(scheduler.len(), 2);
//! # });
//! ```

pub mod bus;
pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod persistence;
pub mod schedule;

/// Prelude for common imports
pub mod prelude {
    pub use crate::bus::{BusError, InMemoryMessageBus, MessageBus};
    pub use crate::command::{action_names, RoutingCommand};
    pub use crate::config::{ConfigError, ProvisionerConfig, RetryOverrides};
    pub use crate::engine::{
        CallbackParams, EnsureRequest, RoutingStateMachine, Transition, TriggerRouter,
    };
    pub use crate::error::ProvisionError;
    pub use crate::gateway::{
        CredentialedIssuer, EventBridgeApi, GatewayError, GatewaySettings,
        InMemoryProvisioningApi, ProvisioningApi, ResourceGateway, ResourceKind,
    };
    pub use crate::persistence::{InMemoryTriggerMetadataStore, StoreError, TriggerMetadataStore};
    pub use crate::schedule::{InMemoryScheduler, ScheduleError, Scheduler};
    pub use eventroute_core::prelude::*;
}

// Re-export key types at crate root
pub use bus::{InMemoryMessageBus, MessageBus};
pub use command::RoutingCommand;
pub use config::{ConfigError, ProvisionerConfig, RetryOverrides};
pub use engine::{CallbackParams, EnsureRequest, RoutingStateMachine, Transition, TriggerRouter};
pub use error::ProvisionError;
pub use gateway::{
    CredentialedIssuer, EventBridgeApi, GatewayError, GatewaySettings, InMemoryProvisioningApi,
    ProvisioningApi, ResourceGateway,
};
pub use persistence::{InMemoryTriggerMetadataStore, TriggerMetadataStore};
pub use schedule::{InMemoryScheduler, Scheduler};
