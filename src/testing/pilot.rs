//! Pilot: drive a shared tree with any number of headless sessions.
//!
//! The `Pilot` owns the locked tree behind an `Arc`, an [`Engine`] and a set of
//! named sessions. It sends GET, POST and AJAX requests through the full
//! lifecycle and returns the outline of what was painted.

use std::collections::HashMap;
use std::sync::Arc;

use super::outline::OutlineRenderer;
use super::request::MockRequest;
use crate::context::Session;
use crate::error::{LifecycleError, StateError};
use crate::lifecycle::{Engine, EngineConfig, RequestOutcome};
use crate::model::{ComponentModel, Handle, ModelData};
use crate::request::Environment;
use crate::tree::ComponentTree;

/// Result of one request sent through the [`Pilot`].
#[derive(Debug)]
pub struct Exchange {
    pub outcome: RequestOutcome,
    /// Outline of the painted frame.
    pub output: String,
    /// Whether a component asked to end the session.
    pub logged_out: bool,
}

/// A headless driver for testing.
///
/// # Examples
///
/// ```
/// use weft::component::{ComponentExt, Container};
/// use weft::testing::fixtures::TextField;
/// use weft::testing::Pilot;
/// use weft::tree::ComponentTree;
///
/// let mut tree = ComponentTree::new();
/// let form = tree.insert(Container.with_id("form")).unwrap();
/// let name = tree.insert_child(form, TextField.with_id("name")).unwrap();
///
/// let mut pilot = Pilot::new(tree);
/// pilot.post("alice", &[("name", "Alice")]).unwrap();
/// assert_eq!(pilot.state("alice", name).unwrap().data.value, "Alice");
/// assert_eq!(pilot.state("bob", name).unwrap().data.value, "");
/// ```
pub struct Pilot {
    tree: Arc<ComponentTree>,
    engine: Engine,
    sessions: HashMap<String, Session>,
    environment: Option<Arc<dyn Environment>>,
}

impl Pilot {
    /// Lock `tree` and drive it with a default engine.
    pub fn new(tree: ComponentTree) -> Self {
        Self::with_config(tree, EngineConfig::default())
    }

    /// Lock `tree` and drive it with an engine built from `config`.
    pub fn with_config(mut tree: ComponentTree, config: EngineConfig) -> Self {
        tree.lock();
        Self {
            tree: Arc::new(tree),
            engine: Engine::new(config),
            sessions: HashMap::new(),
            environment: None,
        }
    }

    /// Give every session this environment (builder).
    pub fn with_environment(mut self, environment: impl Environment + 'static) -> Self {
        self.environment = Some(Arc::new(environment));
        self
    }

    pub fn tree(&self) -> &ComponentTree {
        &self.tree
    }

    /// A second owner of the shared tree, e.g. for another thread.
    pub fn shared_tree(&self) -> Arc<ComponentTree> {
        Arc::clone(&self.tree)
    }

    /// The named session, created on first use.
    pub fn session(&mut self, name: &str) -> &mut Session {
        let environment = self.environment.clone();
        self.sessions.entry(name.to_owned()).or_insert_with(|| {
            let mut session = Session::new();
            if let Some(environment) = environment {
                session.store_mut().set_environment(environment);
            }
            session
        })
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    // ── Requests ─────────────────────────────────────────────────────

    /// Send `request` for the named session.
    pub fn request(
        &mut self,
        name: &str,
        mut request: MockRequest,
    ) -> Result<Exchange, LifecycleError> {
        let tree = Arc::clone(&self.tree);
        let engine = self.engine.clone();
        let session = self.session(name);
        let mut renderer = OutlineRenderer::new();
        let outcome = engine.serve(&tree, session, &mut request, &mut renderer)?;
        Ok(Exchange {
            outcome,
            output: renderer.output().to_owned(),
            logged_out: request.logged_out(),
        })
    }

    pub fn get(&mut self, name: &str) -> Result<Exchange, LifecycleError> {
        self.request(name, MockRequest::get())
    }

    /// Submit `params` with the handling method.
    pub fn post(
        &mut self,
        name: &str,
        params: &[(&str, &str)],
    ) -> Result<Exchange, LifecycleError> {
        let method = self.engine.config().handling_method.clone();
        let request = with_params(MockRequest::new(method), params);
        self.request(name, request)
    }

    /// Fire `trigger` with `params`, as a client would through its follow-up URL.
    pub fn ajax(
        &mut self,
        name: &str,
        trigger: &str,
        params: &[(&str, &str)],
    ) -> Result<Exchange, LifecycleError> {
        let config = self.engine.config();
        let request = MockRequest::new(config.handling_method.clone())
            .param(&config.ajax_trigger_param, trigger);
        self.request(name, with_params(request, params))
    }

    // ── Query ────────────────────────────────────────────────────────

    /// Effective root-context state of `handle` in the named session. An
    /// unknown session reads as a fresh one.
    pub fn state<M: ModelData>(
        &self,
        name: &str,
        handle: Handle<M>,
    ) -> Result<ComponentModel<M>, StateError> {
        match self.sessions.get(name) {
            Some(session) => session.state(&self.tree, handle).cloned(),
            None => self.tree.default_state(handle).cloned(),
        }
    }
}

fn with_params(request: MockRequest, params: &[(&str, &str)]) -> MockRequest {
    params
        .iter()
        .fold(request, |request, (name, value)| request.param(name, value))
}
