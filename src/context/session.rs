//! Session: everything one user session keeps between requests.

use tracing::debug;

use super::store::ContextStore;
use crate::ajax::OperationTable;
use crate::error::StateError;
use crate::model::{ComponentModel, Handle, ModelData};
use crate::tree::{ComponentTree, NodeId};

/// The two keyed structures a session stores: its context overlay and its
/// AJAX operation table.
///
/// A session is not internally synchronized. The HTTP layer must serialize
/// requests per session, typically by keeping it behind a `Mutex`.
#[derive(Debug, Default)]
pub struct Session {
    store: ContextStore,
    operations: OperationTable,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self) -> &ContextStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ContextStore {
        &mut self.store
    }

    pub fn operations(&self) -> &OperationTable {
        &self.operations
    }

    pub fn operations_mut(&mut self) -> &mut OperationTable {
        &mut self.operations
    }

    pub(crate) fn parts_mut(&mut self) -> (&mut ContextStore, &mut OperationTable) {
        (&mut self.store, &mut self.operations)
    }

    /// Effective state of `handle` in the root context, outside any request.
    pub fn state<'s, M: ModelData>(
        &'s self,
        tree: &'s ComponentTree,
        handle: Handle<M>,
    ) -> Result<&'s ComponentModel<M>, StateError> {
        self.store.state(tree, self.store.root(), handle)
    }

    /// Session model of `handle` in the root context, created on first use.
    pub fn state_mut<M: ModelData>(
        &mut self,
        tree: &ComponentTree,
        handle: Handle<M>,
    ) -> Result<&mut ComponentModel<M>, StateError> {
        let root = self.store.root();
        self.store.state_mut(tree, root, handle)
    }

    /// Drop redundant session models under `start`. See [`ContextStore::tidy`].
    pub fn tidy(&mut self, tree: &ComponentTree, start: NodeId) -> usize {
        self.store.tidy(tree, start)
    }

    /// Clear every context, session model, pending action and AJAX operation.
    pub fn reset(&mut self) {
        self.store.reset();
        self.operations.clear();
        debug!("session reset");
    }
}
