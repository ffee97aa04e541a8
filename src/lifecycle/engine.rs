//! Engine: drives one request through every phase.
//!
//! ```text
//! Idle → Collecting → Handling → DeferredRunning → Preparing → Painting → Idle
//!   └──────────── (not the handling method) ────────┘
//! ```
//!
//! Collecting walks the visible tree children-first, expanding repeaters into
//! one pass per row. Handling reconciles request data component by component,
//! skipping anything disabled or read-only. The invoke-later queue is then
//! drained until empty. Preparing walks parent-first so a component can still
//! adjust its children, and painting hands the stable tree, or just the AJAX
//! targets, to the renderer.

use tracing::{debug, error, warn};

use super::config::{ActionErrorPolicy, EngineConfig};
use super::paint::{PaintFrame, PaintNode, Renderer};
use super::phase::Phase;
use crate::ajax::{AjaxAction, AjaxOperation};
use crate::component::traits::DynComponent;
use crate::context::{ContextId, Cx, Deferred, Session};
use crate::error::{ComponentError, LifecycleError, StateError};
use crate::request::Request;
use crate::tree::{ComponentTree, NodeId};

// ---------------------------------------------------------------------------
// Visit / RequestOutcome
// ---------------------------------------------------------------------------

/// One component instance reached by a traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Visit {
    pub context: ContextId,
    pub node: NodeId,
}

/// What happened while serving a request.
#[derive(Debug, Default)]
pub struct RequestOutcome {
    /// Phases entered, in order.
    pub phases: Vec<Phase>,
    /// Qualified ids in collecting order (children first).
    pub collected: Vec<String>,
    /// Qualified ids in preparing order (parents first).
    pub prepared: Vec<String>,
    /// Qualified ids of components whose state changed from request data.
    pub changed: Vec<String>,
    /// Qualified ids handed to the renderer.
    pub painted: Vec<String>,
    /// Failures of invoke-later actions under [`ActionErrorPolicy::Continue`].
    pub action_errors: Vec<ComponentError>,
    /// AJAX trigger named by the request, if any.
    pub trigger: Option<String>,
    /// The request was dropped without running the lifecycle.
    pub ignored: bool,
}

impl RequestOutcome {
    fn ignored(trigger: &str) -> Self {
        Self {
            trigger: Some(trigger.to_owned()),
            ignored: true,
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Serves requests against one shared tree. Stateless apart from its config, so
/// one engine can serve every session from every thread.
#[derive(Debug, Clone, Default)]
pub struct Engine {
    config: EngineConfig,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run `request` for `session` through the whole lifecycle and render the
    /// result with `renderer`.
    ///
    /// A request naming an AJAX trigger this session never registered is
    /// ignored with a warning. On error, the session keeps every state change
    /// made before the failure, but its pending actions are dropped. Actions and
    /// scratch left behind by a request that panicked are dropped before this
    /// one starts.
    pub fn serve(
        &self,
        tree: &ComponentTree,
        session: &mut Session,
        request: &mut dyn Request,
        renderer: &mut dyn Renderer,
    ) -> Result<RequestOutcome, LifecycleError> {
        let root = tree.root().ok_or(StateError::NoRoot)?;

        let stale = session.store_mut().begin_request();
        if stale > 0 {
            warn!(stale, "dropped actions left by an unfinished request");
        }

        let trigger = request
            .parameter(&self.config.ajax_trigger_param)
            .map(str::to_owned);
        let operation = match &trigger {
            None => None,
            Some(trigger) => match session.operations().get(trigger) {
                Some(operation) => Some(operation.clone()),
                None => {
                    warn!(trigger = %trigger, "unknown ajax trigger; request ignored");
                    return Ok(RequestOutcome::ignored(trigger));
                }
            },
        };
        if let Some(operation) = &operation {
            let fired = session
                .operations_mut()
                .mark_serviced(operation.trigger_id());
            debug!(trigger = operation.trigger_id(), fired, "servicing ajax operation");
        }

        let mut cx = Cx::new(tree, session, request, &self.config);
        cx.operation = operation;
        let mut outcome = RequestOutcome {
            trigger,
            ..RequestOutcome::default()
        };

        let result = self.run(&mut cx, root, renderer, &mut outcome);
        cx.store.clear_request_scratch();
        if result.is_err() {
            cx.store.deferred.clear();
            cx.phases.abort();
        }
        outcome.phases = cx.phases.finish();
        result.map(|()| outcome)
    }

    fn run(
        &self,
        cx: &mut Cx<'_>,
        root: NodeId,
        renderer: &mut dyn Renderer,
        outcome: &mut RequestOutcome,
    ) -> Result<(), LifecycleError> {
        let root_ctx = cx.current_context();
        let method = cx.method();

        if method == self.config.handling_method {
            enter(cx, Phase::Collecting)?;
            let mut visits = Vec::new();
            collect(cx, root_ctx, root, &mut visits)?;
            outcome.collected = labels(cx, &visits);

            enter(cx, Phase::Handling)?;
            handle(cx, &visits)?;

            enter(cx, Phase::DeferredRunning)?;
            outcome.action_errors = self.drain_deferred(cx)?;
        } else {
            let trigger_param = self.config.ajax_trigger_param.as_str();
            let carries_data = cx
                .request
                .parameter_names()
                .iter()
                .any(|name| *name != trigger_param);
            if carries_data {
                warn!(%method, "request data ignored for non-handling method");
            } else {
                debug!(%method, "skipping handling");
            }
        }

        enter(cx, Phase::Preparing)?;
        let mut prepared = Vec::new();
        prepare(cx, root_ctx, root, &mut prepared)?;
        outcome.prepared = labels(cx, &prepared);

        enter(cx, Phase::Painting)?;
        let frame = match cx.operation.clone() {
            None => PaintFrame {
                roots: paint(cx, root_ctx, root)?.into_iter().collect(),
                container: None,
            },
            Some(operation) => partial_frame(cx, &operation)?,
        };
        outcome.painted = frame.ids();
        renderer
            .render(cx, &frame)
            .map_err(|source| LifecycleError::Render {
                message: source.to_string(),
            })?;

        outcome.changed = cx
            .changed
            .iter()
            .map(|&(ctx, node)| label(cx, ctx, node))
            .collect();
        enter(cx, Phase::Idle)?;
        Ok(())
    }

    /// Run queued actions until the queue stays empty. Actions may queue more
    /// actions; each runs in the context it was queued from.
    fn drain_deferred(&self, cx: &mut Cx<'_>) -> Result<Vec<ComponentError>, LifecycleError> {
        let limit = self.config.max_deferred_rounds;
        let mut errors = Vec::new();
        let mut ran = 0usize;

        while let Some(Deferred { context, action }) = cx.store.deferred.pop() {
            if ran >= limit {
                cx.store.deferred.clear();
                return Err(LifecycleError::Deferred {
                    source: ComponentError::application(format!(
                        "more than {limit} invoke-later actions in one request"
                    )),
                });
            }
            ran += 1;

            if !cx.store.contains(context) {
                warn!(?context, "invoke-later context no longer exists; action dropped");
                continue;
            }
            let result = {
                let mut guard = cx.push_context(context)?;
                action(&mut *guard)
            };
            if let Err(err) = result {
                match self.config.action_errors {
                    ActionErrorPolicy::Continue => {
                        error!(error = %err, "invoke-later action failed");
                        errors.push(err);
                    }
                    ActionErrorPolicy::Abort => {
                        error!(error = %err, "invoke-later action failed; aborting");
                        cx.store.deferred.clear();
                        return Err(LifecycleError::Deferred { source: err });
                    }
                }
            }
        }
        debug!(ran, failed = errors.len(), "invoke-later queue drained");
        Ok(errors)
    }
}

// ---------------------------------------------------------------------------
// Phases
// ---------------------------------------------------------------------------

fn enter(cx: &mut Cx<'_>, phase: Phase) -> Result<(), LifecycleError> {
    cx.phases.advance(phase)?;
    cx.store.clear_phase_scratch();
    if phase == Phase::Preparing {
        cx.store.headers_mut().clear();
    }
    debug!(?phase, "entered phase");
    Ok(())
}

/// Children-first walk over the visible tree.
fn collect(
    cx: &mut Cx<'_>,
    ctx: ContextId,
    node: NodeId,
    out: &mut Vec<Visit>,
) -> Result<(), LifecycleError> {
    if !cx.flags_in(ctx, node)?.visible {
        return Ok(());
    }
    for (child_ctx, child) in children_of(cx, ctx, node, true)? {
        collect(cx, child_ctx, child, out)?;
    }
    out.push(Visit { context: ctx, node });
    Ok(())
}

fn handle(cx: &mut Cx<'_>, visits: &[Visit]) -> Result<(), LifecycleError> {
    let tree = cx.tree();
    for &Visit { context, node } in visits {
        if cx.is_disabled_in(context, node)? || cx.is_read_only_in(context, node)? {
            debug!(
                component = %label(cx, context, node),
                "not handling disabled or read-only component"
            );
            continue;
        }
        let component = tree.component(node)?;
        let result = {
            let mut guard = cx.push_context(context)?;
            component.handle_request(&mut guard, node)
        };
        if let Err(source) = result {
            return Err(LifecycleError::Handling {
                component: label(cx, context, node),
                source,
            });
        }
    }
    Ok(())
}

/// Parent-first walk. Visibility and rows are read after the parent has been
/// prepared, so preparing can still hide children or change rows.
fn prepare(
    cx: &mut Cx<'_>,
    ctx: ContextId,
    node: NodeId,
    out: &mut Vec<Visit>,
) -> Result<(), LifecycleError> {
    if !cx.flags_in(ctx, node)?.visible {
        return Ok(());
    }
    let component = cx.tree().component(node)?;
    let result = {
        let mut guard = cx.push_context(ctx)?;
        component.prepare_paint(&mut guard, node)
    };
    if let Err(source) = result {
        return Err(LifecycleError::Preparing {
            component: label(cx, ctx, node),
            source,
        });
    }
    out.push(Visit { context: ctx, node });
    for (child_ctx, child) in children_of(cx, ctx, node, true)? {
        prepare(cx, child_ctx, child, out)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Painting
// ---------------------------------------------------------------------------

fn paint(cx: &mut Cx<'_>, ctx: ContextId, node: NodeId) -> Result<Option<PaintNode>, StateError> {
    if !cx.flags_in(ctx, node)?.visible {
        return Ok(None);
    }
    let tree = cx.tree();
    let mut children = Vec::new();
    for (child_ctx, child) in children_of(cx, ctx, node, false)? {
        if let Some(painted) = paint(cx, child_ctx, child)? {
            children.push(painted);
        }
    }
    Ok(Some(PaintNode {
        id: cx.store.qualified_id(tree, ctx, node)?,
        type_name: tree.component(node)?.type_name(),
        context: ctx,
        node,
        children,
    }))
}

/// Frame for an AJAX request: only the operation's targets.
fn partial_frame(cx: &mut Cx<'_>, operation: &AjaxOperation) -> Result<PaintFrame, StateError> {
    let tree = cx.tree();
    match operation.action() {
        AjaxAction::Repaint => {
            let mut targets: Vec<(ContextId, NodeId)> = Vec::new();
            for target in operation.targets() {
                match cx.store.resolve_id(tree, target) {
                    Some(found) if !targets.contains(&found) => targets.push(found),
                    Some(_) => {}
                    None => warn!(
                        trigger = operation.trigger_id(),
                        target = %target,
                        "unknown ajax target; skipped"
                    ),
                }
            }

            let mut roots = Vec::new();
            for &(ctx, node) in &targets {
                // A target inside another target is painted with it.
                let covered = targets.iter().any(|&(outer_ctx, outer)| {
                    tree.is_ancestor(outer, node) && cx.store.is_within(ctx, outer_ctx)
                });
                if covered {
                    continue;
                }
                if !cx.is_visible_in(ctx, node)? {
                    debug!(target = %label(cx, ctx, node), "ajax target not visible; skipped");
                    continue;
                }
                roots.extend(paint(cx, ctx, node)?);
            }
            Ok(PaintFrame {
                roots,
                container: None,
            })
        }
        AjaxAction::ReplaceContent {
            container_id,
            content_id,
        } => {
            // Replacement content need not sit in a visible subtree.
            let roots = match cx.store.resolve_id(tree, content_id) {
                Some((ctx, node)) => paint(cx, ctx, node)?.into_iter().collect(),
                None => {
                    warn!(
                        trigger = operation.trigger_id(),
                        content = %content_id,
                        "unknown replacement content; nothing painted"
                    );
                    Vec::new()
                }
            };
            Ok(PaintFrame {
                roots,
                container: Some(container_id.clone()),
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Child instances of `node` in `ctx`: the plain children, or for a repeater
/// its children once per row, each in the row's sub-context. With `prune`,
/// row contexts for rows that no longer exist are discarded.
fn children_of(
    cx: &mut Cx<'_>,
    ctx: ContextId,
    node: NodeId,
    prune: bool,
) -> Result<Vec<(ContextId, NodeId)>, StateError> {
    let tree = cx.tree();
    let component = tree.component(node)?;
    let children = tree.children(node);
    if !component.is_repeating() {
        return Ok(children.iter().map(|&child| (ctx, child)).collect());
    }

    let keys = row_keys(cx, ctx, node, component)?;
    if prune {
        let dropped = cx.store.retain_rows(ctx, node, &keys);
        if dropped > 0 {
            debug!(repeater = %tree.describe(node), dropped, "discarded stale row contexts");
        }
    }
    let mut out = Vec::with_capacity(keys.len() * children.len());
    for key in &keys {
        let row = cx.store.sub_context(ctx, node, key)?;
        out.extend(children.iter().map(|&child| (row, child)));
    }
    Ok(out)
}

/// Row keys of a repeater, minus duplicates and keys that cannot be part of a
/// qualified id.
fn row_keys(
    cx: &mut Cx<'_>,
    ctx: ContextId,
    node: NodeId,
    component: &dyn DynComponent,
) -> Result<Vec<String>, StateError> {
    let raw = {
        let guard = cx.push_context(ctx)?;
        component.rows(&guard, node)
    };
    let mut keys: Vec<String> = Vec::with_capacity(raw.len());
    for key in raw {
        if key.is_empty() || key.contains('.') {
            warn!(repeater = %cx.tree().describe(node), key = %key, "invalid row key; row skipped");
        } else if !keys.contains(&key) {
            keys.push(key);
        }
    }
    Ok(keys)
}

fn label(cx: &Cx<'_>, ctx: ContextId, node: NodeId) -> String {
    cx.store
        .qualified_id(cx.tree(), ctx, node)
        .unwrap_or_else(|_| cx.tree().describe(node))
}

fn labels(cx: &Cx<'_>, visits: &[Visit]) -> Vec<String> {
    visits
        .iter()
        .map(|visit| label(cx, visit.context, visit.node))
        .collect()
}
