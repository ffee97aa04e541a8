//! Per-session table of registered AJAX operations, keyed by trigger id.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::operation::AjaxOperation;

/// Session-scoped trigger → operation table.
///
/// Operations are overwritten by re-registration and survive being serviced;
/// only [`clear`](Self::clear) (session reset) removes them. The table also
/// counts how many times each trigger has been serviced, which is what load
/// count limits are checked against.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OperationTable {
    operations: HashMap<String, AjaxOperation>,
    serviced: HashMap<String, u32>,
}

impl OperationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `operation` under its trigger id, replacing any previous entry.
    ///
    /// Returns `false` without storing anything when the operation's load count
    /// is already used up for this trigger.
    pub fn register(&mut self, operation: AjaxOperation) -> bool {
        let trigger = operation.trigger_id().to_owned();
        let fired = self.fire_count(&trigger);
        if operation.policy().is_exhausted(fired) {
            debug!(trigger = %trigger, fired, "load count exhausted; not registering");
            return false;
        }
        debug!(trigger = %trigger, targets = ?operation.targets(), "registered ajax operation");
        self.operations.insert(trigger, operation);
        true
    }

    /// The operation registered for `trigger_id`.
    pub fn get(&self, trigger_id: &str) -> Option<&AjaxOperation> {
        self.operations.get(trigger_id)
    }

    /// Record that `trigger_id` has been serviced once more. Returns the new count.
    pub fn mark_serviced(&mut self, trigger_id: &str) -> u32 {
        let count = self.serviced.entry(trigger_id.to_owned()).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }

    /// How many times `trigger_id` has been serviced.
    pub fn fire_count(&self, trigger_id: &str) -> u32 {
        self.serviced.get(trigger_id).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Drop every operation and fire count.
    pub fn clear(&mut self) {
        self.operations.clear();
        self.serviced.clear();
    }
}
