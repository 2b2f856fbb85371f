//! # Eventroute Core
//!
//! Domain model for routing AWS-origin events to platform triggers.
//!
//! ## Features
//!
//! - **Event filters**: per-trigger slices of the shared event stream with
//!   equals / not-equals / regex predicates on detail fields
//! - **Rule cache**: a pure, serialisable read model of which regions already
//!   have an API destination and which (source, detail-type) pairs are routed
//! - **Subscription matcher**: decides emit-or-drop for an inbound event
//! - **Trigger kinds**: filter-construction presets for the built-in triggers
//!
//! Nothing in this crate performs I/O. Provisioning lives in
//! `eventroute-provisioner`.
//!
//! ## Example
//!
//! ```
//! use eventroute_core::prelude::*;
//! use serde_json::json;
//!
//! let filter = EventFilter::new("aws.codebuild", "CodeBuild Build State Change")
//!     .in_region("us-east-1")
//!     .with_any_of("project-name", ["backend-build"]);
//!
//! let event: EventEnvelope = serde_json::from_value(json!({
//!     "region": "us-east-1",
//!     "source": "aws.codebuild",
//!     "detail-type": "CodeBuild Build State Change",
//!     "detail": { "project-name": "frontend" }
//! }))
//! .unwrap();
//!
//! assert!(!matches(&event, &filter));
//! ```

pub mod cache;
pub mod duration_millis;
pub mod envelope;
pub mod filter;
pub mod ids;
pub mod matcher;
pub mod resources;
pub mod retry;
pub mod subscription;
pub mod telemetry;
pub mod triggers;

/// Prelude for common imports
pub mod prelude {
    pub use crate::cache::{CacheUpdate, RegionRouting, RuleCache};
    pub use crate::envelope::EventEnvelope;
    pub use crate::filter::{EventFilter, FilterError, Pattern, Predicate, RoutingKey};
    pub use crate::ids::{SubscriptionId, TriggerId};
    pub use crate::matcher::{matches, mismatch, route_event, Mismatch};
    pub use crate::resources::{ApiDestination, RoutingRule};
    pub use crate::retry::RetryPolicy;
    pub use crate::subscription::{SubscriptionState, TriggerSubscription};
    pub use crate::triggers::TriggerKind;
}

// Re-export key types at crate root
pub use cache::{CacheUpdate, RegionRouting, RuleCache};
pub use envelope::EventEnvelope;
pub use filter::{EventFilter, FilterError, Pattern, Predicate, RoutingKey};
pub use ids::{SubscriptionId, TriggerId};
pub use matcher::{matches, mismatch, route_event, Mismatch};
pub use resources::{ApiDestination, RoutingRule};
pub use retry::RetryPolicy;
pub use subscription::{SubscriptionState, TriggerSubscription};
pub use triggers::TriggerKind;
