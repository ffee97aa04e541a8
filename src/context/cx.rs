//! Cx: the per-request processing struct handed to every component hook.
//!
//! `Cx` bundles the shared tree, the session being served, the request and the
//! engine config with the explicit context stack. All state access goes through
//! the context on top of that stack, so a component never needs to know whether
//! it is running at the session root or inside a repeater row. Pushing a context
//! returns a [`ContextGuard`], and dropping the guard pops it again on every exit
//! path, errors included.

use std::ops::{Deref, DerefMut};
use std::str::FromStr;

use tracing::{debug, warn};

use super::deferred::Deferred;
use super::headers::Headers;
use super::scratch::Scratch;
use super::session::Session;
use super::store::{ContextId, ContextStore};
use crate::ajax::{follow_up_url, AjaxOperation, OperationTable};
use crate::error::{ComponentError, StateError};
use crate::lifecycle::config::EngineConfig;
use crate::lifecycle::phase::{Phase, PhaseTracker};
use crate::model::{AnyModel, ComponentModel, Flags, Handle, ModelData};
use crate::request::{Method, Request};
use crate::tree::{ComponentTree, NodeId};

/// Request processing state. Created by the engine for one request and dropped
/// when the response has been painted.
pub struct Cx<'a> {
    pub(crate) tree: &'a ComponentTree,
    pub(crate) store: &'a mut ContextStore,
    pub(crate) operations: &'a mut OperationTable,
    pub(crate) request: &'a mut dyn Request,
    pub(crate) config: &'a EngineConfig,
    stack: Vec<ContextId>,
    pub(crate) operation: Option<AjaxOperation>,
    pub(crate) changed: Vec<(ContextId, NodeId)>,
    pub(crate) phases: PhaseTracker,
}

impl<'a> Cx<'a> {
    /// Prime a request for `session`, with its root context as the only entry
    /// on the stack.
    pub fn new(
        tree: &'a ComponentTree,
        session: &'a mut Session,
        request: &'a mut dyn Request,
        config: &'a EngineConfig,
    ) -> Self {
        let (store, operations) = session.parts_mut();
        let root = store.root();
        Self {
            tree,
            store,
            operations,
            request,
            config,
            stack: vec![root],
            operation: None,
            changed: Vec::new(),
            phases: PhaseTracker::new(),
        }
    }

    pub fn tree(&self) -> &'a ComponentTree {
        self.tree
    }

    pub fn store(&self) -> &ContextStore {
        self.store
    }

    pub fn config(&self) -> &EngineConfig {
        self.config
    }

    /// The phase the request is in.
    pub fn phase(&self) -> Phase {
        self.phases.current()
    }

    // ── Context stack ────────────────────────────────────────────────

    /// The context on top of the stack. The session root is always at the
    /// bottom, so there is always one.
    pub fn current_context(&self) -> ContextId {
        self.stack.last().copied().unwrap_or_else(|| self.store.root())
    }

    /// Depth of the context stack, the root included.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Make `ctx` current until the returned guard is dropped.
    pub fn push_context(&mut self, ctx: ContextId) -> Result<ContextGuard<'_, 'a>, StateError> {
        if !self.store.contains(ctx) {
            return Err(StateError::UnknownContext {
                context: format!("{ctx:?}"),
            });
        }
        self.stack.push(ctx);
        Ok(ContextGuard { cx: self })
    }

    /// Enter the row `key` of `repeater`, creating its sub-context under the
    /// current one if needed.
    pub fn enter_row(
        &mut self,
        repeater: impl Into<NodeId>,
        key: &str,
    ) -> Result<ContextGuard<'_, 'a>, StateError> {
        let parent = self.current_context();
        let row = self.store.sub_context(parent, repeater.into(), key)?;
        self.push_context(row)
    }

    // ── State ────────────────────────────────────────────────────────

    /// Effective state of `handle`: its session model if it has one, otherwise
    /// inherited or default state. Never creates a session model.
    pub fn state<M: ModelData>(&self, handle: Handle<M>) -> Result<&ComponentModel<M>, StateError> {
        self.state_in(self.current_context(), handle)
    }

    /// [`state`](Self::state) in an explicit context.
    pub fn state_in<M: ModelData>(
        &self,
        ctx: ContextId,
        handle: Handle<M>,
    ) -> Result<&ComponentModel<M>, StateError> {
        self.store.state(self.tree, ctx, handle)
    }

    /// Writable session model of `handle`, cloned from its current effective
    /// state on first use.
    pub fn state_mut<M: ModelData>(
        &mut self,
        handle: Handle<M>,
    ) -> Result<&mut ComponentModel<M>, StateError> {
        let ctx = self.current_context();
        self.store.state_mut(self.tree, ctx, handle)
    }

    /// The session model of `node`, if this session has one.
    pub fn model(&self, node: impl Into<NodeId>) -> Result<Option<&dyn AnyModel>, StateError> {
        self.store.model(self.tree, self.current_context(), node.into())
    }

    /// Effective model of `node` in `ctx`, untyped.
    pub fn model_in(&self, ctx: ContextId, node: NodeId) -> Result<&dyn AnyModel, StateError> {
        self.store.effective_model(self.tree, ctx, node)
    }

    /// Revert `node` to inherited state. Not recursive.
    pub fn remove_model(&mut self, node: impl Into<NodeId>) -> Result<bool, StateError> {
        let ctx = self.current_context();
        self.store.remove_model(self.tree, ctx, node.into())
    }

    pub fn flags_in(&self, ctx: ContextId, node: NodeId) -> Result<Flags, StateError> {
        self.store.flags(self.tree, ctx, node)
    }

    /// Visible if the node and all its ancestors are visible.
    pub fn is_visible(&self, node: impl Into<NodeId>) -> Result<bool, StateError> {
        self.is_visible_in(self.current_context(), node.into())
    }

    pub fn is_visible_in(&self, ctx: ContextId, node: NodeId) -> Result<bool, StateError> {
        let hidden = self
            .store
            .inherited_flag(self.tree, ctx, node, |flags| !flags.visible)?;
        Ok(!hidden)
    }

    /// Disabled if the node or any ancestor is disabled.
    pub fn is_disabled(&self, node: impl Into<NodeId>) -> Result<bool, StateError> {
        self.is_disabled_in(self.current_context(), node.into())
    }

    pub fn is_disabled_in(&self, ctx: ContextId, node: NodeId) -> Result<bool, StateError> {
        self.store
            .inherited_flag(self.tree, ctx, node, |flags| flags.disabled)
    }

    /// Read-only if the node or any ancestor is read-only.
    pub fn is_read_only(&self, node: impl Into<NodeId>) -> Result<bool, StateError> {
        self.is_read_only_in(self.current_context(), node.into())
    }

    pub fn is_read_only_in(&self, ctx: ContextId, node: NodeId) -> Result<bool, StateError> {
        self.store
            .inherited_flag(self.tree, ctx, node, |flags| flags.read_only)
    }

    /// Id of `node` qualified with the current row keys.
    pub fn qualified_id(&self, node: impl Into<NodeId>) -> Result<String, StateError> {
        self.store
            .qualified_id(self.tree, self.current_context(), node.into())
    }

    // ── Request data ─────────────────────────────────────────────────

    pub fn method(&self) -> Method {
        self.request.method()
    }

    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.request.parameter(name)
    }

    pub fn parameter_values(&self, name: &str) -> Vec<&str> {
        self.request.parameter_values(name)
    }

    /// Parse a parameter. Unparseable input is logged and treated as absent,
    /// so the component keeps its last valid state.
    pub fn parameter_as<T: FromStr>(&self, name: &str) -> Option<T> {
        let raw = self.request.parameter(name)?;
        match raw.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(
                    parameter = name,
                    value = raw,
                    expected = std::any::type_name::<T>(),
                    "ignoring unparseable request parameter"
                );
                None
            }
        }
    }

    pub fn request(&self) -> &(dyn Request + 'a) {
        &*self.request
    }

    pub fn request_mut(&mut self) -> &mut (dyn Request + 'a) {
        &mut *self.request
    }

    /// Ask the HTTP layer to end the session.
    pub fn logout(&mut self) {
        self.request.logout();
    }

    // ── Change tracking ──────────────────────────────────────────────

    /// Record that request data changed `node` in the current context.
    pub fn mark_changed(&mut self, node: impl Into<NodeId>) {
        let entry = (self.current_context(), node.into());
        if !self.changed.contains(&entry) {
            self.changed.push(entry);
        }
    }

    pub fn is_changed(&self, node: impl Into<NodeId>) -> bool {
        self.changed
            .contains(&(self.current_context(), node.into()))
    }

    // ── Deferred actions ─────────────────────────────────────────────

    /// Queue `action` to run once every component has reconciled the request,
    /// in the context that is current now.
    ///
    /// Returns `false`, dropping the action, once preparing has started.
    pub fn invoke_later<F>(&mut self, action: F) -> bool
    where
        F: FnOnce(&mut Cx<'_>) -> Result<(), ComponentError> + Send + 'static,
    {
        let phase = self.phase();
        if !phase.accepts_deferred() {
            warn!(?phase, "invoke_later outside handling; action dropped");
            return false;
        }
        self.store.deferred.push(Deferred {
            context: self.current_context(),
            action: Box::new(action),
        });
        true
    }

    // ── AJAX ─────────────────────────────────────────────────────────

    /// Store `operation` in the session, replacing any previous operation for
    /// the same trigger. Returns `false` when its load count is used up.
    pub fn register_operation(&mut self, operation: AjaxOperation) -> bool {
        self.operations.register(operation)
    }

    /// The operation registered for `trigger_id` in this session.
    pub fn operation(&self, trigger_id: &str) -> Option<&AjaxOperation> {
        self.operations.get(trigger_id)
    }

    /// The operation this request is servicing, if it is an AJAX request.
    pub fn current_operation(&self) -> Option<&AjaxOperation> {
        self.operation.as_ref()
    }

    /// Whether `node`, in the current context, is the trigger of the operation
    /// being serviced.
    pub fn is_current_trigger(&self, node: impl Into<NodeId>) -> bool {
        let Some(operation) = &self.operation else {
            return false;
        };
        self.qualified_id(node)
            .is_ok_and(|id| id == operation.trigger_id())
    }

    /// Follow-up URL a client calls to fire `node` as a trigger. `None` when
    /// the session has no environment.
    pub fn ajax_url(&self, node: impl Into<NodeId>) -> Result<Option<String>, StateError> {
        let id = self.qualified_id(node)?;
        Ok(self
            .store
            .environment()
            .map(|env| follow_up_url(&**env, &self.config.ajax_trigger_param, &id)))
    }

    // ── Scratch, focus, headers ──────────────────────────────────────

    /// Scratch for `node` cleared when the current phase ends.
    pub fn phase_scratch(&mut self, node: impl Into<NodeId>) -> Result<&mut Scratch, StateError> {
        let ctx = self.current_context();
        self.store.phase_scratch(ctx, node.into())
    }

    /// Scratch for `node` cleared when the request ends.
    pub fn request_scratch(&mut self, node: impl Into<NodeId>) -> Result<&mut Scratch, StateError> {
        let ctx = self.current_context();
        self.store.request_scratch(ctx, node.into())
    }

    /// Request scratch of `node` in `ctx`, for renderers.
    pub fn request_scratch_in(&self, ctx: ContextId, node: NodeId) -> Option<&Scratch> {
        self.store.request_scratch_of(ctx, node)
    }

    /// Focus `node` in the current context.
    pub fn set_focus(&mut self, node: impl Into<NodeId>) {
        let ctx = self.current_context();
        let node = node.into();
        debug!(node = %self.tree.describe(node), "focus moved");
        self.store.set_focus(ctx, node);
    }

    pub fn focus(&self) -> Option<(ContextId, NodeId)> {
        self.store.focus()
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        self.store.headers_mut()
    }

    pub fn locale(&self) -> &str {
        self.store.locale()
    }
}

impl std::fmt::Debug for Cx<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cx")
            .field("phase", &self.phase())
            .field("stack", &self.stack)
            .field("operation", &self.operation)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// ContextGuard
// ---------------------------------------------------------------------------

/// Keeps a context on the stack. Pops it when dropped.
pub struct ContextGuard<'g, 'a> {
    cx: &'g mut Cx<'a>,
}

impl<'a> Deref for ContextGuard<'_, 'a> {
    type Target = Cx<'a>;

    fn deref(&self) -> &Self::Target {
        self.cx
    }
}

impl DerefMut for ContextGuard<'_, '_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.cx
    }
}

impl Drop for ContextGuard<'_, '_> {
    fn drop(&mut self) {
        self.cx.stack.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{ComponentExt, Container, Repeater};
    use crate::lifecycle::phase::Phase;
    use crate::testing::fixtures::{TextData, TextField};
    use crate::testing::MockRequest;

    struct Fixture {
        tree: ComponentTree,
        rows: NodeId,
        name: Handle<TextData>,
        title: Handle<TextData>,
    }

    fn fixture() -> Fixture {
        let mut tree = ComponentTree::new();
        let page = tree.insert(Container.with_id("page")).unwrap();
        let rows = tree.insert_child(page, Repeater.with_id("rows")).unwrap();
        let name = tree.insert_child(rows, TextField.with_id("name")).unwrap();
        let title = tree.insert_child(page, TextField.with_id("title")).unwrap();
        tree.lock();
        Fixture {
            tree,
            rows: rows.node(),
            name,
            title,
        }
    }

    #[test]
    fn guard_pops_on_drop() {
        let f = fixture();
        let mut session = Session::new();
        let mut request = MockRequest::get();
        let config = EngineConfig::default();
        let mut cx = Cx::new(&f.tree, &mut session, &mut request, &config);
        let root = cx.current_context();

        {
            let mut row = cx.enter_row(f.rows, "1").unwrap();
            assert_ne!(row.current_context(), root);
            assert_eq!(row.depth(), 2);
            row.state_mut(f.name).unwrap().data.value = "first".into();
            assert_eq!(row.qualified_id(f.name).unwrap(), "name.1");
        }

        assert_eq!(cx.current_context(), root);
        assert_eq!(cx.depth(), 1);
        assert_eq!(cx.state(f.name).unwrap().data.value, "");
    }

    #[test]
    fn guard_pops_on_error_paths() {
        fn failing(cx: &mut Cx<'_>, rows: NodeId) -> Result<(), StateError> {
            let _row = cx.enter_row(rows, "1")?;
            Err(StateError::NoRoot)
        }

        let f = fixture();
        let mut session = Session::new();
        let mut request = MockRequest::get();
        let config = EngineConfig::default();
        let mut cx = Cx::new(&f.tree, &mut session, &mut request, &config);
        assert!(failing(&mut cx, f.rows).is_err());
        assert_eq!(cx.depth(), 1);
    }

    #[test]
    fn sibling_rows_do_not_leak() {
        let f = fixture();
        let mut session = Session::new();
        let mut request = MockRequest::get();
        let config = EngineConfig::default();
        let mut cx = Cx::new(&f.tree, &mut session, &mut request, &config);

        cx.enter_row(f.rows, "a")
            .unwrap()
            .state_mut(f.name)
            .unwrap()
            .data
            .value = "alpha".into();
        let row_b = cx.enter_row(f.rows, "b").unwrap();
        assert_eq!(row_b.state(f.name).unwrap().data.value, "");
    }

    #[test]
    fn nodes_outside_repeater_share_root_state() {
        let f = fixture();
        let mut session = Session::new();
        let mut request = MockRequest::get();
        let config = EngineConfig::default();
        let mut cx = Cx::new(&f.tree, &mut session, &mut request, &config);

        cx.enter_row(f.rows, "a")
            .unwrap()
            .state_mut(f.title)
            .unwrap()
            .data
            .value = "shared".into();
        assert_eq!(cx.state(f.title).unwrap().data.value, "shared");
    }

    #[test]
    fn inherited_flags() {
        let f = fixture();
        let page = f.tree.root().unwrap();
        let mut session = Session::new();
        let mut request = MockRequest::get();
        let config = EngineConfig::default();
        let mut cx = Cx::new(&f.tree, &mut session, &mut request, &config);

        assert!(cx.is_visible(f.title).unwrap());
        cx.state_mut(Handle::<()>::new(page)).unwrap().disabled = true;
        assert!(cx.is_disabled(f.title).unwrap());
        assert!(!cx.is_read_only(f.title).unwrap());
        cx.state_mut(Handle::<()>::new(page)).unwrap().visible = false;
        assert!(!cx.is_visible(f.title).unwrap());
    }

    #[test]
    fn parameter_as_ignores_garbage() {
        let f = fixture();
        let mut session = Session::new();
        let mut request = MockRequest::post().param("n", "12").param("bad", "x1");
        let config = EngineConfig::default();
        let cx = Cx::new(&f.tree, &mut session, &mut request, &config);
        assert_eq!(cx.parameter_as::<u32>("n"), Some(12));
        assert_eq!(cx.parameter_as::<u32>("bad"), None);
        assert_eq!(cx.parameter_as::<u32>("missing"), None);
    }

    #[test]
    fn invoke_later_rejected_after_handling() {
        let f = fixture();
        let mut session = Session::new();
        let mut request = MockRequest::post();
        let config = EngineConfig::default();
        let mut cx = Cx::new(&f.tree, &mut session, &mut request, &config);

        cx.phases.advance(Phase::Collecting).unwrap();
        cx.phases.advance(Phase::Handling).unwrap();
        assert!(cx.invoke_later(|_| Ok(())));
        cx.phases.advance(Phase::DeferredRunning).unwrap();
        cx.phases.advance(Phase::Preparing).unwrap();
        assert!(!cx.invoke_later(|_| Ok(())));
        assert_eq!(cx.store().pending_deferred(), 1);
    }

    #[test]
    fn current_trigger_matches_qualified_id() {
        let f = fixture();
        let mut session = Session::new();
        let mut request = MockRequest::post();
        let config = EngineConfig::default();
        let mut cx = Cx::new(&f.tree, &mut session, &mut request, &config);
        cx.operation = Some(AjaxOperation::repaint("name.2", Vec::<String>::new()));

        assert!(!cx.is_current_trigger(f.name));
        assert!(!cx.enter_row(f.rows, "1").unwrap().is_current_trigger(f.name));
        assert!(cx.enter_row(f.rows, "2").unwrap().is_current_trigger(f.name));
    }

    #[test]
    fn mark_changed_is_per_context() {
        let f = fixture();
        let mut session = Session::new();
        let mut request = MockRequest::post();
        let config = EngineConfig::default();
        let mut cx = Cx::new(&f.tree, &mut session, &mut request, &config);
        cx.enter_row(f.rows, "1").unwrap().mark_changed(f.name);
        assert!(!cx.is_changed(f.name));
        assert!(cx.enter_row(f.rows, "1").unwrap().is_changed(f.name));
        assert_eq!(cx.changed.len(), 1);
    }
}
