//! The shared component tree: arena, structure, locking, default models.

use std::collections::HashMap;
use std::sync::OnceLock;

use slotmap::{SecondaryMap, SlotMap};

use super::node::{validate_id_name, NodeData, NodeId};
use crate::component::traits::{Component, DynComponent};
use crate::error::StateError;
use crate::model::{AnyModel, ComponentModel, Handle, ModelData};

/// Empty slice constant for returning when a node has no children.
const EMPTY_CHILDREN: &[NodeId] = &[];

/// Id given to an unnamed root.
const ROOT_AUTO_ID: &str = "_root";

/// Behaviour and default model of one node.
struct Slot {
    component: Box<dyn DynComponent>,
    default: OnceLock<Box<dyn AnyModel>>,
}

/// The component tree shared by every session, backed by a slotmap arena.
///
/// The tree is assembled once, then [`lock`](Self::lock)ed and usually wrapped
/// in an `Arc`. Default models are created lazily on first access; after locking
/// they can only be read, so concurrent request threads may share them freely.
/// All per-session state lives in a [`ContextStore`](crate::context::ContextStore).
pub struct ComponentTree {
    pub(crate) nodes: SlotMap<NodeId, NodeData>,
    children: SecondaryMap<NodeId, Vec<NodeId>>,
    parent: SecondaryMap<NodeId, NodeId>,
    slots: SecondaryMap<NodeId, Slot>,
    ids: HashMap<String, NodeId>,
    root: Option<NodeId>,
}

impl ComponentTree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self {
            nodes: SlotMap::with_key(),
            children: SecondaryMap::new(),
            parent: SecondaryMap::new(),
            slots: SecondaryMap::new(),
            ids: HashMap::new(),
            root: None,
        }
    }

    // ── Structure ────────────────────────────────────────────────────

    /// Insert a parentless component. The first one inserted becomes the root.
    ///
    /// Fails once the current root is locked.
    pub fn insert<C: Component>(
        &mut self,
        component: C,
    ) -> Result<Handle<C::Model>, StateError> {
        self.ensure_root_unlocked()?;
        let id = self.attach(component)?;
        if self.root.is_none() {
            self.root = Some(id);
        }
        Ok(Handle::new(id))
    }

    /// Insert a component as the last child of `parent`.
    pub fn insert_child<C: Component>(
        &mut self,
        parent: impl Into<NodeId>,
        component: C,
    ) -> Result<Handle<C::Model>, StateError> {
        let parent = parent.into();
        let data = self.node(parent)?;
        if data.locked {
            return Err(StateError::LockedStructure {
                component: self.describe(parent),
            });
        }
        let id = self.attach(component)?;
        self.parent.insert(id, parent);
        if let Some(siblings) = self.children.get_mut(parent) {
            siblings.push(id);
        }
        Ok(Handle::new(id))
    }

    fn attach<C: Component>(&mut self, component: C) -> Result<NodeId, StateError> {
        let mut data = NodeData::new(Component::type_name(&component));
        if let Some(name) = Component::id_name(&component) {
            validate_id_name(name)?;
            if self.ids.contains_key(name) {
                return Err(StateError::DuplicateId { id: name.to_owned() });
            }
            data = data.with_id(name);
        }
        let name = data.id_name.clone();
        let id = self.nodes.insert(data);
        self.children.insert(id, Vec::new());
        self.slots.insert(
            id,
            Slot {
                component: Box::new(component),
                default: OnceLock::new(),
            },
        );
        if let Some(name) = name {
            self.ids.insert(name, id);
        }
        Ok(id)
    }

    /// Remove a node and all its descendants.
    ///
    /// Fails if the node or its parent is locked. Session models held for the
    /// removed nodes become unreachable and are dropped by the next tidy pass.
    pub fn remove(&mut self, id: impl Into<NodeId>) -> Result<NodeData, StateError> {
        let id = id.into();
        if self.node(id)?.locked {
            return Err(StateError::LockedStructure {
                component: self.describe(id),
            });
        }
        if let Some(parent_id) = self.parent.get(id).copied() {
            if self.node(parent_id)?.locked {
                return Err(StateError::LockedStructure {
                    component: self.describe(parent_id),
                });
            }
            if let Some(siblings) = self.children.get_mut(parent_id) {
                siblings.retain(|&child| child != id);
            }
        }
        if self.root == Some(id) {
            self.root = None;
        }

        let mut removed_root = None;
        for current in self.walk_depth_first(id) {
            self.children.remove(current);
            self.parent.remove(current);
            self.slots.remove(current);
            if let Some(data) = self.nodes.remove(current) {
                if let Some(name) = &data.id_name {
                    self.ids.remove(name);
                }
                if current == id {
                    removed_root = Some(data);
                }
            }
        }
        removed_root.ok_or_else(|| StateError::UnknownComponent {
            node: format!("{id:?}"),
        })
    }

    /// Get the parent of a node, if it has one.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.parent.get(id).copied()
    }

    /// Get the children of a node. Returns an empty slice if the node has no
    /// children or does not exist.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.children
            .get(id)
            .map(Vec::as_slice)
            .unwrap_or(EMPTY_CHILDREN)
    }

    /// Walk from `id` up to the root, collecting ancestor node ids.
    ///
    /// The returned vec does **not** include `id` itself; it starts with the
    /// immediate parent and ends at the root.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut current = id;
        while let Some(p) = self.parent.get(current).copied() {
            result.push(p);
            current = p;
        }
        result
    }

    /// Structural metadata of a node.
    pub fn get(&self, id: NodeId) -> Option<&NodeData> {
        self.nodes.get(id)
    }

    fn node(&self, id: NodeId) -> Result<&NodeData, StateError> {
        self.nodes.get(id).ok_or_else(|| StateError::UnknownComponent {
            node: format!("{id:?}"),
        })
    }

    /// The root node, if set.
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Explicitly set the root node. Fails once the current root is locked.
    pub fn set_root(&mut self, id: impl Into<NodeId>) -> Result<(), StateError> {
        let id = id.into();
        self.ensure_root_unlocked()?;
        self.node(id)?;
        self.root = Some(id);
        Ok(())
    }

    fn ensure_root_unlocked(&self) -> Result<(), StateError> {
        match self.root {
            Some(root) if self.is_locked(root) => Err(StateError::LockedStructure {
                component: self.describe(root),
            }),
            _ => Ok(()),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Pre-order depth-first traversal starting from `start`.
    pub fn walk_depth_first(&self, start: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut stack = vec![start];
        while let Some(current) = stack.pop() {
            if !self.nodes.contains_key(current) {
                continue;
            }
            result.push(current);
            // Push children in reverse so the first child is visited first.
            for &child in self.children(current).iter().rev() {
                stack.push(child);
            }
        }
        result
    }

    /// Post-order depth-first traversal: every child before its parent.
    pub fn walk_post_order(&self, start: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut stack = vec![(start, false)];
        while let Some((current, expanded)) = stack.pop() {
            if !self.nodes.contains_key(current) {
                continue;
            }
            if expanded {
                result.push(current);
                continue;
            }
            stack.push((current, true));
            for &child in self.children(current).iter().rev() {
                stack.push((child, false));
            }
        }
        result
    }

    // ── Locking ──────────────────────────────────────────────────────

    /// Lock every node. Call once assembly is complete, before the tree is
    /// shared between request threads.
    pub fn lock(&mut self) {
        for data in self.nodes.values_mut() {
            data.locked = true;
        }
    }

    /// Unlock every node, allowing default writes and structural changes again.
    pub fn unlock(&mut self) {
        for data in self.nodes.values_mut() {
            data.locked = false;
        }
    }

    /// Lock a single subtree.
    pub fn lock_subtree(&mut self, start: NodeId) {
        for id in self.walk_depth_first(start) {
            if let Some(data) = self.nodes.get_mut(id) {
                data.locked = true;
            }
        }
    }

    pub fn is_locked(&self, id: NodeId) -> bool {
        self.nodes.get(id).is_some_and(|d| d.locked)
    }

    // ── Ids ──────────────────────────────────────────────────────────

    /// The id of a node outside any row context.
    ///
    /// Named nodes use their id name. Unnamed nodes get `{parent id}-{index}`,
    /// with an unnamed root being `_root`.
    pub fn id(&self, id: NodeId) -> Result<String, StateError> {
        let data = self.node(id)?;
        if let Some(name) = &data.id_name {
            return Ok(name.clone());
        }
        match self.parent(id) {
            None => Ok(ROOT_AUTO_ID.to_owned()),
            Some(parent) => {
                let index = self
                    .children(parent)
                    .iter()
                    .position(|&c| c == id)
                    .unwrap_or_default();
                Ok(format!("{}-{}", self.id(parent)?, index))
            }
        }
    }

    /// Node with the given id name (no auto ids).
    pub(crate) fn named(&self, name: &str) -> Option<NodeId> {
        self.ids.get(name).copied()
    }

    /// Human-readable label for error messages.
    pub(crate) fn describe(&self, id: NodeId) -> String {
        self.id(id).unwrap_or_else(|_| format!("{id:?}"))
    }

    // ── Behaviour and default models ─────────────────────────────────

    pub(crate) fn component(&self, id: NodeId) -> Result<&dyn DynComponent, StateError> {
        self.slots
            .get(id)
            .map(|slot| slot.component.as_ref())
            .ok_or_else(|| StateError::UnknownComponent {
                node: format!("{id:?}"),
            })
    }

    /// The node's default model, created on first access.
    pub fn default_model(&self, id: NodeId) -> Result<&dyn AnyModel, StateError> {
        let slot = self.slots.get(id).ok_or_else(|| StateError::UnknownComponent {
            node: format!("{id:?}"),
        })?;
        Ok(slot
            .default
            .get_or_init(|| slot.component.new_default())
            .as_ref())
    }

    /// Typed read of a default model.
    pub fn default_state<M: ModelData>(
        &self,
        handle: Handle<M>,
    ) -> Result<&ComponentModel<M>, StateError> {
        self.default_model(handle.node())?
            .downcast_ref::<M>()
            .ok_or_else(|| self.mismatch::<M>(handle.node()))
    }

    /// Typed write access to a default model. Fails once the node is locked.
    pub fn default_state_mut<M: ModelData>(
        &mut self,
        handle: Handle<M>,
    ) -> Result<&mut ComponentModel<M>, StateError> {
        let id = handle.node();
        if self.node(id)?.locked {
            return Err(StateError::LockedDefault {
                component: self.describe(id),
            });
        }
        let mismatch = self.mismatch::<M>(id);
        let slot = self.slots.get_mut(id).ok_or_else(|| StateError::UnknownComponent {
            node: format!("{id:?}"),
        })?;
        if slot.default.get().is_none() {
            let model = slot.component.new_default();
            let _ = slot.default.set(model);
        }
        slot.default
            .get_mut()
            .and_then(|model| model.downcast_mut::<M>())
            .ok_or(mismatch)
    }

    fn mismatch<M: ModelData>(&self, id: NodeId) -> StateError {
        StateError::ModelTypeMismatch {
            component: self.describe(id),
            expected: std::any::type_name::<M>(),
        }
    }
}

impl Default for ComponentTree {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ComponentTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentTree")
            .field("len", &self.nodes.len())
            .field("root", &self.root)
            .finish()
    }
}
