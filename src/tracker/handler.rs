//! Composable per-tick handler chain
//!
//! Independent subsystems register periodic behavior against a tracker
//! without a central dispatch table. The chain is an ordered list of
//! function values; registration order is execution order, and composition
//! is associative.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::tracker::bundler::BundlerSet;
use crate::tracker::Tracker;

/// One unit of per-tick work. May write into the bundler set and read or
/// mutate tracker state; has no return contract.
pub type TickHandler = Arc<dyn Fn(&Tracker, &mut BundlerSet) + Send + Sync>;

/// Ordered chain of tick handlers, first-registered-first-run.
#[derive(Default)]
pub struct HandlerChain {
    handlers: RwLock<Vec<TickHandler>>,
}

impl HandlerChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler; it runs after everything registered before it.
    pub fn push(&self, handler: TickHandler) {
        self.handlers.write().push(handler);
    }

    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.read().is_empty()
    }

    /// Run every handler in registration order.
    ///
    /// The list is snapshotted first so a handler may register further
    /// handlers without deadlocking; additions take effect next firing.
    pub(crate) fn run(&self, tracker: &Tracker, bundlers: &mut BundlerSet) {
        let snapshot: Vec<TickHandler> = self.handlers.read().clone();
        for handler in &snapshot {
            handler(tracker, bundlers);
        }
    }
}
