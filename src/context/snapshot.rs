//! Serializable form of a session, for replicating it between processes.
//!
//! Node and context ids are arena keys that mean nothing outside the process
//! that minted them. A snapshot therefore names components by tree id and
//! contexts by the `(repeater id, row key)` path leading to them from the root.
//! Queued actions and scratch never outlive a request, so they are not
//! captured. The environment is not captured either; install it again after
//! restoring.

use std::collections::BTreeMap;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::session::Session;
use super::store::{ContextId, ContextStore};
use crate::ajax::OperationTable;
use crate::error::StateError;
use crate::tree::{ComponentTree, NodeId};

/// Session models held by one context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextSnapshot {
    /// `(repeater id, row key)` pairs from the root down. Empty for the root.
    pub path: Vec<(String, String)>,
    /// Serialized session models keyed by tree id.
    pub models: BTreeMap<String, serde_json::Value>,
}

/// Everything a session keeps between requests, in serializable form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub contexts: Vec<ContextSnapshot>,
    /// Qualified id of the focused component.
    pub focus: Option<String>,
    pub locale: String,
    pub created: SystemTime,
    pub operations: OperationTable,
}

impl Session {
    /// Capture this session against the tree it is served with.
    ///
    /// Models of components no longer in the tree are left out.
    pub fn snapshot(&self, tree: &ComponentTree) -> Result<SessionSnapshot, StateError> {
        let store = self.store();
        let mut contexts = Vec::new();
        for (ctx, context) in store.contexts() {
            let mut models = BTreeMap::new();
            for (node, model) in context.models() {
                let Ok(id) = tree.id(node) else {
                    debug!(?node, "skipping model of removed component");
                    continue;
                };
                let value = model
                    .to_json()
                    .map_err(|source| StateError::Replication {
                        component: id.clone(),
                        source,
                    })?;
                models.insert(id, value);
            }
            contexts.push(ContextSnapshot {
                path: path_of(store, tree, ctx)?,
                models,
            });
        }
        contexts.sort_by(|a, b| a.path.cmp(&b.path));

        let focus = store
            .focus()
            .map(|(ctx, node)| store.qualified_id(tree, ctx, node))
            .transpose()?;

        Ok(SessionSnapshot {
            contexts,
            focus,
            locale: store.locale().to_owned(),
            created: store.created(),
            operations: self.operations().clone(),
        })
    }

    /// Rebuild a session from `snapshot` over the same tree it was taken with.
    pub fn restore(
        tree: &ComponentTree,
        snapshot: SessionSnapshot,
    ) -> Result<Session, StateError> {
        let mut session = Session::new();
        let (store, operations) = session.parts_mut();
        store.set_locale(snapshot.locale);
        store.set_created(snapshot.created);

        for context in snapshot.contexts {
            let mut ctx = store.root();
            for (repeater, key) in &context.path {
                ctx = store.sub_context(ctx, lookup(tree, repeater)?, key)?;
            }
            for (id, value) in context.models {
                let node = lookup(tree, &id)?;
                let model = tree
                    .component(node)?
                    .model_from_json(value)
                    .map_err(|source| StateError::Replication {
                        component: id,
                        source,
                    })?;
                store.insert_model(ctx, node, model)?;
            }
        }

        if let Some(focus) = snapshot.focus {
            match store.resolve_id(tree, &focus) {
                Some((ctx, node)) => store.set_focus(ctx, node),
                None => debug!(focus = %focus, "focused component not restored"),
            }
        }
        *operations = snapshot.operations;
        debug!(models = store.model_count(), "session restored");
        Ok(session)
    }
}

fn path_of(
    store: &ContextStore,
    tree: &ComponentTree,
    ctx: ContextId,
) -> Result<Vec<(String, String)>, StateError> {
    let mut path = Vec::new();
    let mut current = store.get(ctx);
    while let Some(context) = current {
        if let Some((repeater, key)) = context.row() {
            path.push((tree.id(repeater)?, key.to_owned()));
        }
        current = context.parent().and_then(|parent| store.get(parent));
    }
    path.reverse();
    Ok(path)
}

fn lookup(tree: &ComponentTree, id: &str) -> Result<NodeId, StateError> {
    tree.find_by_id(id)
        .ok_or_else(|| StateError::UnknownComponent { node: id.to_owned() })
}
