//! Typed component handles.

use std::fmt;
use std::marker::PhantomData;

use crate::tree::NodeId;

/// A node id that remembers the model type of the component behind it.
///
/// Handles are `Copy`; they only store the id. The tree hands them out when a
/// component is inserted, so a handle always agrees with the node's model type.
pub struct Handle<M> {
    node: NodeId,
    _marker: PhantomData<fn() -> M>,
}

impl<M> Handle<M> {
    pub(crate) fn new(node: NodeId) -> Self {
        Self {
            node,
            _marker: PhantomData,
        }
    }

    /// The untyped node id.
    pub fn node(&self) -> NodeId {
        self.node
    }
}

// Manual impls so we don't require M: Copy/Clone/PartialEq for the handle itself.
impl<M> Copy for Handle<M> {}
impl<M> Clone for Handle<M> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<M> PartialEq for Handle<M> {
    fn eq(&self, other: &Self) -> bool {
        self.node == other.node
    }
}
impl<M> Eq for Handle<M> {}

impl<M> fmt::Debug for Handle<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Handle").field(&self.node).finish()
    }
}

impl<M> From<Handle<M>> for NodeId {
    fn from(handle: Handle<M>) -> Self {
        handle.node
    }
}
