//! Engine configuration.

use crate::request::Method;

/// Request parameter that names the AJAX trigger being serviced.
pub const DEFAULT_AJAX_TRIGGER_PARAM: &str = "wc_ajax";

/// Upper bound on invoke-later actions run for one request.
pub const DEFAULT_MAX_DEFERRED_ROUNDS: usize = 10_000;

/// What the engine does when an invoke-later action fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActionErrorPolicy {
    /// Log the error, keep it in the outcome, and run the remaining actions.
    #[default]
    Continue,
    /// Drop the remaining actions and fail the request.
    Abort,
}

/// Configuration for the [`Engine`](super::Engine).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// The only method whose requests are handled. Others skip straight to
    /// preparing and painting.
    pub handling_method: Method,
    /// Parameter carrying the AJAX trigger id.
    pub ajax_trigger_param: String,
    /// Failure policy for invoke-later actions.
    pub action_errors: ActionErrorPolicy,
    /// Invoke-later actions run per request before the engine gives up.
    pub max_deferred_rounds: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            handling_method: Method::Post,
            ajax_trigger_param: DEFAULT_AJAX_TRIGGER_PARAM.to_owned(),
            action_errors: ActionErrorPolicy::Continue,
            max_deferred_rounds: DEFAULT_MAX_DEFERRED_ROUNDS,
        }
    }
}

impl EngineConfig {
    /// Create a new default config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the handling method (builder).
    pub fn with_handling_method(mut self, method: Method) -> Self {
        self.handling_method = method;
        self
    }

    /// Set the AJAX trigger parameter name (builder).
    pub fn with_ajax_trigger_param(mut self, param: impl Into<String>) -> Self {
        self.ajax_trigger_param = param.into();
        self
    }

    /// Set the action error policy (builder).
    pub fn with_action_errors(mut self, policy: ActionErrorPolicy) -> Self {
        self.action_errors = policy;
        self
    }

    /// Set the invoke-later bound (builder).
    pub fn with_max_deferred_rounds(mut self, rounds: usize) -> Self {
        self.max_deferred_rounds = rounds;
        self
    }
}
