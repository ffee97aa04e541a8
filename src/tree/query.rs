//! Tree navigation: lookups by id and type, ancestor and descendant searches.

use super::component_tree::ComponentTree;
use super::node::{NodeData, NodeId};

impl ComponentTree {
    /// Find the node whose id (named or auto-generated) equals `id`.
    ///
    /// Row qualifiers (`name.row`) are not understood here; resolve those through
    /// a request context.
    pub fn find_by_id(&self, id: &str) -> Option<NodeId> {
        if let Some(node) = self.named(id) {
            return Some(node);
        }
        // Only auto ids remain; they always start with `_`.
        if !id.starts_with('_') && !id.contains('-') {
            return None;
        }
        self.nodes
            .keys()
            .find(|&node| self.id(node).is_ok_and(|candidate| candidate == id))
    }

    /// Find all nodes of a given component type.
    pub fn query_by_type(&self, type_name: &str) -> Vec<NodeId> {
        self.query_all(|data| data.type_name == type_name)
    }

    /// Find all nodes matching an arbitrary predicate, in arena order.
    pub fn query_all(&self, predicate: impl Fn(&NodeData) -> bool) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|(_, data)| predicate(data))
            .map(|(node_id, _)| node_id)
            .collect()
    }

    /// Nearest proper ancestor of `id` satisfying `predicate`.
    pub fn find_ancestor(
        &self,
        id: NodeId,
        predicate: impl Fn(NodeId, &NodeData) -> bool,
    ) -> Option<NodeId> {
        self.ancestors(id)
            .into_iter()
            .find(|&a| self.get(a).is_some_and(|data| predicate(a, data)))
    }

    /// Nearest proper ancestor of the given component type.
    pub fn find_ancestor_of_type(&self, id: NodeId, type_name: &str) -> Option<NodeId> {
        self.find_ancestor(id, |_, data| data.type_name == type_name)
    }

    /// Nearest enclosing repeating region, i.e. the closest ancestor whose
    /// component renders its children once per row.
    pub fn nearest_repeater(&self, id: NodeId) -> Option<NodeId> {
        self.find_ancestor(id, |node, _| {
            self.component(node).is_ok_and(|c| c.is_repeating())
        })
    }

    /// Whether `ancestor` is a proper ancestor of `id`.
    pub fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        self.ancestors(id).contains(&ancestor)
    }

    /// All descendants of `id` in pre-order, excluding `id` itself.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut all = self.walk_depth_first(id);
        if !all.is_empty() {
            all.remove(0);
        }
        all
    }

    /// First descendant (pre-order) satisfying `predicate`.
    pub fn find_descendant(
        &self,
        id: NodeId,
        predicate: impl Fn(NodeId, &NodeData) -> bool,
    ) -> Option<NodeId> {
        self.descendants(id)
            .into_iter()
            .find(|&d| self.get(d).is_some_and(|data| predicate(d, data)))
    }
}
