//! Provisioning engine
//!
//! This module provides:
//! - [`RoutingStateMachine`] deciding the next step for one trigger
//! - [`TriggerRouter`] wrapping it with persistence and scheduling

mod router;
mod state_machine;

pub use router::TriggerRouter;
pub use state_machine::{CallbackParams, EnsureRequest, RoutingStateMachine, Transition};
