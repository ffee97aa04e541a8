//! ContextStore: one session's state overlay over the shared tree.
//!
//! The store is an arena of [`Context`]s. The root context belongs to the
//! session; every row of a repeating component gets its own sub-context, created
//! on demand and keyed by `(repeater, row key)` under its parent. A context holds
//! only the session models that differ from what it would otherwise inherit:
//! lookups fall back through the parent chain and finally to the tree's default
//! model, and a session model is created only on the first write.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use slotmap::{new_key_type, SlotMap};
use tracing::debug;

use super::deferred::DeferredQueue;
use super::headers::Headers;
use super::scratch::Scratch;
use crate::error::StateError;
use crate::model::{AnyModel, ComponentModel, Flags, Handle, ModelData};
use crate::request::Environment;
use crate::tree::{ComponentTree, NodeId};

new_key_type! {
    /// Identifies a context inside one session's store.
    pub struct ContextId;
}

/// Locale a new session starts with.
pub const DEFAULT_LOCALE: &str = "en";

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// One logical instance scope: the session root, or one row of a repeater.
#[derive(Debug, Default)]
pub struct Context {
    parent: Option<ContextId>,
    /// `(repeater, row key)` for row contexts.
    row: Option<(NodeId, String)>,
    models: HashMap<NodeId, Box<dyn AnyModel>>,
    phase_scratch: HashMap<NodeId, Scratch>,
    request_scratch: HashMap<NodeId, Scratch>,
    rows: HashMap<(NodeId, String), ContextId>,
}

impl Context {
    pub fn parent(&self) -> Option<ContextId> {
        self.parent
    }

    /// Repeater node and row key, for row contexts.
    pub fn row(&self) -> Option<(NodeId, &str)> {
        self.row.as_ref().map(|(node, key)| (*node, key.as_str()))
    }

    /// Number of session models held directly by this context.
    pub fn model_count(&self) -> usize {
        self.models.len()
    }

    pub(crate) fn models(&self) -> impl Iterator<Item = (NodeId, &dyn AnyModel)> {
        self.models.iter().map(|(&node, model)| (node, model.as_ref()))
    }
}

// ---------------------------------------------------------------------------
// ContextStore
// ---------------------------------------------------------------------------

/// Per-session context arena plus the session-wide data every context shares:
/// focus, the invoke-later queue, creation time, locale, environment, headers.
pub struct ContextStore {
    contexts: SlotMap<ContextId, Context>,
    root: ContextId,
    focus: Option<(ContextId, NodeId)>,
    pub(crate) deferred: DeferredQueue,
    created: SystemTime,
    locale: String,
    environment: Option<Arc<dyn Environment>>,
    headers: Headers,
}

impl ContextStore {
    /// Create a store holding only an empty root context.
    pub fn new() -> Self {
        let mut contexts = SlotMap::with_key();
        let root = contexts.insert(Context::default());
        Self {
            contexts,
            root,
            focus: None,
            deferred: DeferredQueue::new(),
            created: SystemTime::now(),
            locale: DEFAULT_LOCALE.to_owned(),
            environment: None,
            headers: Headers::new(),
        }
    }

    /// The session's root context.
    pub fn root(&self) -> ContextId {
        self.root
    }

    pub fn contains(&self, ctx: ContextId) -> bool {
        self.contexts.contains_key(ctx)
    }

    pub fn get(&self, ctx: ContextId) -> Option<&Context> {
        self.contexts.get(ctx)
    }

    /// Number of live contexts, the root included.
    pub fn context_count(&self) -> usize {
        self.contexts.len()
    }

    /// Total number of session models across every context.
    pub fn model_count(&self) -> usize {
        self.contexts.values().map(Context::model_count).sum()
    }

    pub(crate) fn contexts(&self) -> impl Iterator<Item = (ContextId, &Context)> {
        self.contexts.iter()
    }

    fn context(&self, ctx: ContextId) -> Result<&Context, StateError> {
        self.contexts.get(ctx).ok_or_else(|| StateError::UnknownContext {
            context: format!("{ctx:?}"),
        })
    }

    fn context_mut(&mut self, ctx: ContextId) -> Result<&mut Context, StateError> {
        self.contexts.get_mut(ctx).ok_or_else(|| StateError::UnknownContext {
            context: format!("{ctx:?}"),
        })
    }

    // ── Scope resolution ─────────────────────────────────────────────

    /// The context that owns `node`'s state when `ctx` is active.
    ///
    /// A row context only scopes the repeater's descendants; anything else is
    /// owned by the nearest ancestor context that does scope it.
    pub fn scope_for(
        &self,
        tree: &ComponentTree,
        ctx: ContextId,
        node: NodeId,
    ) -> Result<ContextId, StateError> {
        let mut current = ctx;
        loop {
            let context = self.context(current)?;
            match (&context.row, context.parent) {
                (Some((repeater, _)), Some(parent)) if !tree.is_ancestor(*repeater, node) => {
                    current = parent;
                }
                _ => return Ok(current),
            }
        }
    }

    /// First session model for `node` found walking up from `start`, falling
    /// back to the default model.
    fn resolve_from<'s>(
        &'s self,
        tree: &'s ComponentTree,
        start: Option<ContextId>,
        node: NodeId,
    ) -> Result<&'s dyn AnyModel, StateError> {
        let mut current = start;
        while let Some(id) = current {
            let context = self.context(id)?;
            if let Some(model) = context.models.get(&node) {
                return Ok(model.as_ref());
            }
            current = context.parent;
        }
        tree.default_model(node)
    }

    // ── Models ───────────────────────────────────────────────────────

    /// The session model held directly by the owning context, if any.
    /// Never falls back, never creates.
    pub fn model(
        &self,
        tree: &ComponentTree,
        ctx: ContextId,
        node: NodeId,
    ) -> Result<Option<&dyn AnyModel>, StateError> {
        let scope = self.scope_for(tree, ctx, node)?;
        Ok(self.context(scope)?.models.get(&node).map(|m| m.as_ref()))
    }

    /// The state `node` has for this session: its session model if present,
    /// otherwise whatever the enclosing contexts or the default model hold.
    pub fn effective_model<'s>(
        &'s self,
        tree: &'s ComponentTree,
        ctx: ContextId,
        node: NodeId,
    ) -> Result<&'s dyn AnyModel, StateError> {
        let scope = self.scope_for(tree, ctx, node)?;
        self.resolve_from(tree, Some(scope), node)
    }

    /// Typed [`effective_model`](Self::effective_model).
    pub fn state<'s, M: ModelData>(
        &'s self,
        tree: &'s ComponentTree,
        ctx: ContextId,
        handle: Handle<M>,
    ) -> Result<&'s ComponentModel<M>, StateError> {
        self.effective_model(tree, ctx, handle.node())?
            .downcast_ref::<M>()
            .ok_or_else(|| mismatch::<M>(tree, handle.node()))
    }

    /// Typed [`model`](Self::model).
    pub fn session_state<'s, M: ModelData>(
        &'s self,
        tree: &ComponentTree,
        ctx: ContextId,
        handle: Handle<M>,
    ) -> Result<Option<&'s ComponentModel<M>>, StateError> {
        match self.model(tree, ctx, handle.node())? {
            None => Ok(None),
            Some(model) => model
                .downcast_ref::<M>()
                .map(Some)
                .ok_or_else(|| mismatch::<M>(tree, handle.node())),
        }
    }

    /// The session model for `handle`, created on first use by cloning the
    /// state the node currently inherits.
    pub fn state_mut<M: ModelData>(
        &mut self,
        tree: &ComponentTree,
        ctx: ContextId,
        handle: Handle<M>,
    ) -> Result<&mut ComponentModel<M>, StateError> {
        let node = handle.node();
        let scope = self.scope_for(tree, ctx, node)?;
        if !self.context(scope)?.models.contains_key(&node) {
            let parent = self.context(scope)?.parent;
            let seed = self.resolve_from(tree, parent, node)?.clone_boxed();
            if seed.downcast_ref::<M>().is_none() {
                return Err(mismatch::<M>(tree, node));
            }
            self.context_mut(scope)?.models.insert(node, seed);
        }
        self.context_mut(scope)?
            .models
            .get_mut(&node)
            .and_then(|model| model.downcast_mut::<M>())
            .ok_or_else(|| mismatch::<M>(tree, node))
    }

    /// Drop the session model for `node`, reverting it to inherited state.
    /// Not recursive. Returns whether a model was removed.
    pub fn remove_model(
        &mut self,
        tree: &ComponentTree,
        ctx: ContextId,
        node: NodeId,
    ) -> Result<bool, StateError> {
        let scope = self.scope_for(tree, ctx, node)?;
        Ok(self.context_mut(scope)?.models.remove(&node).is_some())
    }

    /// Common flags of the effective state.
    pub fn flags(
        &self,
        tree: &ComponentTree,
        ctx: ContextId,
        node: NodeId,
    ) -> Result<Flags, StateError> {
        Ok(self.effective_model(tree, ctx, node)?.flags())
    }

    /// Whether `node` or any ancestor matches `test` in the given context.
    pub(crate) fn inherited_flag(
        &self,
        tree: &ComponentTree,
        ctx: ContextId,
        node: NodeId,
        test: impl Fn(Flags) -> bool,
    ) -> Result<bool, StateError> {
        if test(self.flags(tree, ctx, node)?) {
            return Ok(true);
        }
        for ancestor in tree.ancestors(node) {
            if test(self.flags(tree, ctx, ancestor)?) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    // ── Tidy ─────────────────────────────────────────────────────────

    /// Remove every session model under `start` that matches what its node
    /// would inherit anyway, plus models of nodes no longer in the tree.
    ///
    /// Equality is decided by each model type's
    /// [`ModelData::matches_default`]. This is a maintenance pass; the
    /// lifecycle never runs it implicitly. Returns the number of models removed.
    pub fn tidy(&mut self, tree: &ComponentTree, start: NodeId) -> usize {
        let subtree: HashSet<NodeId> = tree.walk_depth_first(start).into_iter().collect();
        let mut removed = 0;
        for ctx in self.top_down() {
            let candidates: Vec<NodeId> = match self.contexts.get(ctx) {
                Some(context) => context.models.keys().copied().collect(),
                None => continue,
            };
            for node in candidates {
                let redundant = if !tree.contains(node) {
                    true
                } else if subtree.contains(&node) {
                    self.is_redundant(tree, ctx, node)
                } else {
                    false
                };
                if redundant {
                    if let Some(context) = self.contexts.get_mut(ctx) {
                        context.models.remove(&node);
                        removed += 1;
                    }
                }
            }
        }
        debug!(removed, "tidied session models");
        removed
    }

    fn is_redundant(&self, tree: &ComponentTree, ctx: ContextId, node: NodeId) -> bool {
        let Some(context) = self.contexts.get(ctx) else {
            return false;
        };
        let Some(model) = context.models.get(&node) else {
            return false;
        };
        self.resolve_from(tree, context.parent, node)
            .is_ok_and(|inherited| model.matches_default(inherited))
    }

    /// Every context, parents before children.
    fn top_down(&self) -> Vec<ContextId> {
        let mut order = Vec::with_capacity(self.contexts.len());
        let mut queue = VecDeque::from([self.root]);
        while let Some(ctx) = queue.pop_front() {
            if let Some(context) = self.contexts.get(ctx) {
                order.push(ctx);
                queue.extend(context.rows.values().copied());
            }
        }
        order
    }

    // ── Sub-contexts ─────────────────────────────────────────────────

    /// The sub-context for one row of `repeater` under `parent`, created on
    /// first use.
    pub fn sub_context(
        &mut self,
        parent: ContextId,
        repeater: NodeId,
        row_key: &str,
    ) -> Result<ContextId, StateError> {
        let key = (repeater, row_key.to_owned());
        if let Some(&existing) = self.context(parent)?.rows.get(&key) {
            return Ok(existing);
        }
        let id = self.contexts.insert(Context {
            parent: Some(parent),
            row: Some(key.clone()),
            ..Context::default()
        });
        self.context_mut(parent)?.rows.insert(key, id);
        Ok(id)
    }

    /// Discard the row contexts of `repeater` under `parent` whose keys are not
    /// in `keep`, together with everything nested in them. Returns how many
    /// row contexts were discarded.
    pub fn retain_rows(&mut self, parent: ContextId, repeater: NodeId, keep: &[String]) -> usize {
        let stale: Vec<ContextId> = match self.contexts.get_mut(parent) {
            Some(context) => {
                let stale_keys: Vec<(NodeId, String)> = context
                    .rows
                    .keys()
                    .filter(|(node, key)| *node == repeater && !keep.contains(key))
                    .cloned()
                    .collect();
                stale_keys
                    .iter()
                    .filter_map(|key| context.rows.remove(key))
                    .collect()
            }
            None => return 0,
        };
        for &ctx in &stale {
            self.discard(ctx);
        }
        stale.len()
    }

    fn discard(&mut self, ctx: ContextId) {
        let mut queue = vec![ctx];
        while let Some(current) = queue.pop() {
            if let Some(context) = self.contexts.remove(current) {
                queue.extend(context.rows.into_values());
            }
            if self.focus.is_some_and(|(focus_ctx, _)| focus_ctx == current) {
                self.focus = None;
            }
        }
    }

    /// Whether `ctx` is `ancestor` or resolves through it.
    pub fn is_within(&self, ctx: ContextId, ancestor: ContextId) -> bool {
        let mut current = Some(ctx);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.contexts.get(id).and_then(|c| c.parent);
        }
        false
    }

    /// Qualified id of `node` seen from `ctx`: the tree id followed by one
    /// `.key` per enclosing row.
    pub fn qualified_id(
        &self,
        tree: &ComponentTree,
        ctx: ContextId,
        node: NodeId,
    ) -> Result<String, StateError> {
        let mut keys = Vec::new();
        let mut current = Some(self.scope_for(tree, ctx, node)?);
        while let Some(id) = current {
            let context = self.context(id)?;
            if let Some((_, key)) = &context.row {
                keys.push(key.as_str());
            }
            current = context.parent;
        }
        let mut id = tree.id(node)?;
        for key in keys.iter().rev() {
            id.push('.');
            id.push_str(key);
        }
        Ok(id)
    }

    /// Resolve a qualified id back to the `(context, node)` it names. Row
    /// contexts are only looked up, never created.
    pub fn resolve_id(&self, tree: &ComponentTree, qualified: &str) -> Option<(ContextId, NodeId)> {
        let mut parts = qualified.split('.');
        let node = tree.find_by_id(parts.next()?)?;
        let keys: Vec<&str> = parts.collect();
        let mut repeaters: Vec<NodeId> = tree
            .ancestors(node)
            .into_iter()
            .filter(|&a| tree.component(a).is_ok_and(|c| c.is_repeating()))
            .collect();
        repeaters.reverse();
        if repeaters.len() != keys.len() {
            return None;
        }
        let mut ctx = self.root;
        for (repeater, key) in repeaters.into_iter().zip(keys) {
            ctx = *self
                .contexts
                .get(ctx)?
                .rows
                .get(&(repeater, key.to_owned()))?;
        }
        Some((ctx, node))
    }

    // ── Scratch ──────────────────────────────────────────────────────

    /// Scratch space for `node` that lives until the current phase ends.
    pub fn phase_scratch(
        &mut self,
        ctx: ContextId,
        node: NodeId,
    ) -> Result<&mut Scratch, StateError> {
        Ok(self.context_mut(ctx)?.phase_scratch.entry(node).or_default())
    }

    /// Scratch space for `node` that lives until the current request ends.
    pub fn request_scratch(
        &mut self,
        ctx: ContextId,
        node: NodeId,
    ) -> Result<&mut Scratch, StateError> {
        Ok(self.context_mut(ctx)?.request_scratch.entry(node).or_default())
    }

    /// Request scratch for `node`, if anything was stored in it.
    pub fn request_scratch_of(&self, ctx: ContextId, node: NodeId) -> Option<&Scratch> {
        self.contexts.get(ctx)?.request_scratch.get(&node)
    }

    pub fn clear_phase_scratch(&mut self) {
        for context in self.contexts.values_mut() {
            context.phase_scratch.clear();
        }
    }

    pub fn clear_request_scratch(&mut self) {
        for context in self.contexts.values_mut() {
            context.request_scratch.clear();
            context.phase_scratch.clear();
        }
    }

    /// Drop whatever a previous request left behind when it unwound before
    /// finishing: queued actions and scratch. Returns how many queued actions
    /// were dropped.
    pub(crate) fn begin_request(&mut self) -> usize {
        let stale = self.deferred.len();
        self.deferred.clear();
        self.clear_request_scratch();
        stale
    }

    // ── Session-wide data ────────────────────────────────────────────

    pub fn set_focus(&mut self, ctx: ContextId, node: NodeId) {
        self.focus = Some((ctx, node));
    }

    pub fn clear_focus(&mut self) {
        self.focus = None;
    }

    /// The focused component and the context it was focused in.
    pub fn focus(&self) -> Option<(ContextId, NodeId)> {
        self.focus
    }

    pub fn pending_deferred(&self) -> usize {
        self.deferred.len()
    }

    pub fn created(&self) -> SystemTime {
        self.created
    }

    pub(crate) fn set_created(&mut self, created: SystemTime) {
        self.created = created;
    }

    /// Install a replicated session model, replacing any existing one.
    pub(crate) fn insert_model(
        &mut self,
        ctx: ContextId,
        node: NodeId,
        model: Box<dyn AnyModel>,
    ) -> Result<(), StateError> {
        self.context_mut(ctx)?.models.insert(node, model);
        Ok(())
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    pub fn set_locale(&mut self, locale: impl Into<String>) {
        self.locale = locale.into();
    }

    pub fn environment(&self) -> Option<&Arc<dyn Environment>> {
        self.environment.as_ref()
    }

    pub fn set_environment(&mut self, environment: Arc<dyn Environment>) {
        self.environment = Some(environment);
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    /// Forget every context, model, queued action and focus. Creation time,
    /// locale and environment are kept.
    pub fn reset(&mut self) {
        self.contexts.clear();
        self.root = self.contexts.insert(Context::default());
        self.focus = None;
        self.deferred.clear();
        self.headers.clear();
    }
}

impl Default for ContextStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ContextStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextStore")
            .field("contexts", &self.contexts.len())
            .field("models", &self.model_count())
            .field("focus", &self.focus)
            .field("deferred", &self.deferred.len())
            .field("locale", &self.locale)
            .finish()
    }
}

fn mismatch<M: ModelData>(tree: &ComponentTree, node: NodeId) -> StateError {
    StateError::ModelTypeMismatch {
        component: tree.describe(node),
        expected: std::any::type_name::<M>(),
    }
}
