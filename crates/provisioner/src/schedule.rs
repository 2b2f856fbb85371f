//! Scheduled-retry port
//!
//! The host platform owns delayed re-invocation. We only hand it
//! [`RoutingCommand`]s.

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::command::RoutingCommand;

/// Error type for scheduler operations
#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    /// The host refused the request
    #[error("schedule rejected: {0}")]
    Rejected(String),

    /// The host could not be reached
    #[error("scheduler unavailable: {0}")]
    Unavailable(String),
}

/// Delayed re-invocation supplied by the host
#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Run `command` after its delay
    async fn schedule(&self, command: RoutingCommand) -> Result<(), ScheduleError>;
}

/// Records scheduled commands instead of running them
///
/// Tests and the planner drive the "later" half themselves by reading what
/// was scheduled.
#[derive(Default)]
pub struct InMemoryScheduler {
    scheduled: RwLock<Vec<RoutingCommand>>,
}

impl InMemoryScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything scheduled so far, oldest first
    pub fn scheduled(&self) -> Vec<RoutingCommand> {
        self.scheduled.read().clone()
    }

    /// Remove and return everything scheduled so far
    pub fn take(&self) -> Vec<RoutingCommand> {
        std::mem::take(&mut *self.scheduled.write())
    }

    /// Scheduled re-invocations of our own entry points
    pub fn callbacks(&self) -> Vec<RoutingCommand> {
        self.scheduled
            .read()
            .iter()
            .filter(|c| c.is_callback())
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.scheduled.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.scheduled.read().is_empty()
    }
}

#[async_trait]
impl Scheduler for InMemoryScheduler {
    async fn schedule(&self, command: RoutingCommand) -> Result<(), ScheduleError> {
        self.scheduled.write().push(command);
        Ok(())
    }
}
