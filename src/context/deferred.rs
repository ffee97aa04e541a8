//! Invoke-later queue.
//!
//! [`DeferredQueue`] holds actions queued while request data is still being
//! reconciled, each paired with the context that was active when it was
//! queued. The lifecycle drains it until empty, so actions may queue more
//! actions.

use std::collections::VecDeque;
use std::fmt;

use super::cx::Cx;
use super::store::ContextId;
use crate::error::ComponentError;

/// A queued application action.
pub type DeferredAction = Box<dyn FnOnce(&mut Cx<'_>) -> Result<(), ComponentError> + Send>;

/// An action paired with the context it must run in.
pub struct Deferred {
    pub context: ContextId,
    pub action: DeferredAction,
}

impl fmt::Debug for Deferred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred")
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

/// FIFO queue of deferred actions.
#[derive(Debug, Default)]
pub struct DeferredQueue {
    queue: VecDeque<Deferred>,
}

impl DeferredQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue an action for later processing.
    pub fn push(&mut self, deferred: Deferred) {
        self.queue.push_back(deferred);
    }

    /// Take the oldest action.
    pub fn pop(&mut self) -> Option<Deferred> {
        self.queue.pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Drop every pending action.
    pub fn clear(&mut self) {
        self.queue.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn noop() -> DeferredAction {
        Box::new(|_cx: &mut Cx<'_>| -> Result<(), ComponentError> { Ok(()) })
    }

    #[test]
    fn fifo_order() {
        let mut contexts: SlotMap<ContextId, ()> = SlotMap::with_key();
        let first = contexts.insert(());
        let second = contexts.insert(());

        let mut queue = DeferredQueue::new();
        queue.push(Deferred { context: first, action: noop() });
        queue.push(Deferred { context: second, action: noop() });
        assert_eq!(queue.len(), 2);

        assert_eq!(queue.pop().map(|d| d.context), Some(first));
        assert_eq!(queue.pop().map(|d| d.context), Some(second));
        assert!(queue.pop().is_none());
    }

    #[test]
    fn clear_empties() {
        let mut contexts: SlotMap<ContextId, ()> = SlotMap::with_key();
        let ctx = contexts.insert(());
        let mut queue = DeferredQueue::default();
        queue.push(Deferred { context: ctx, action: noop() });
        queue.clear();
        assert!(queue.is_empty());
    }
}
