//! Error taxonomy.
//!
//! [`StateError`] covers configuration mistakes that must fail fast at the call
//! site (locked defaults, malformed ids, model type mismatches). [`ComponentError`]
//! is what component hooks and deferred actions return. [`LifecycleError`] is what
//! a request as a whole fails with.
//!
//! Request-data problems and protocol misuse by clients never become errors: they
//! are logged and ignored, because untrusted input must not be able to fail a
//! session.

use crate::lifecycle::phase::Phase;

// ---------------------------------------------------------------------------
// StateError
// ---------------------------------------------------------------------------

/// Configuration errors raised by the tree, the model layer and the context store.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// A default model was written after its component was locked.
    #[error("default model of `{component}` is locked; write through a session model instead")]
    LockedDefault { component: String },

    /// A structural change was attempted under a locked component.
    #[error("cannot change the structure below locked component `{component}`")]
    LockedStructure { component: String },

    /// An id name does not follow `[A-Za-z][A-Za-z0-9_]*`.
    #[error("malformed component id `{id}`")]
    MalformedId { id: String },

    /// An id name is already taken by another component.
    #[error("component id `{id}` is already in use")]
    DuplicateId { id: String },

    /// A node id does not exist in the tree.
    #[error("unknown component {node}")]
    UnknownComponent { node: String },

    /// A context id does not belong to this session's store.
    #[error("unknown context {context}")]
    UnknownContext { context: String },

    /// A stored model is not of the type the caller asked for.
    #[error("component `{component}` does not carry a `{expected}` model")]
    ModelTypeMismatch {
        component: String,
        expected: &'static str,
    },

    /// An attribute value could not be serialized for session replication.
    #[error("attribute `{key}` is not serializable: {source}")]
    NotSerializable {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// A session snapshot could not be written or read back.
    #[error("session state of `{component}` cannot be replicated: {source}")]
    Replication {
        component: String,
        #[source]
        source: serde_json::Error,
    },

    /// The tree has no root component.
    #[error("component tree has no root")]
    NoRoot,
}

// ---------------------------------------------------------------------------
// ComponentError
// ---------------------------------------------------------------------------

/// Error returned from component hooks and invoke-later actions.
#[derive(Debug, thiserror::Error)]
pub enum ComponentError {
    /// The component misused the state layer.
    #[error(transparent)]
    State(#[from] StateError),

    /// Application code reported a failure.
    #[error("{message}")]
    Application { message: String },
}

impl ComponentError {
    /// Build an application-level error from any displayable message.
    pub fn application(message: impl Into<String>) -> Self {
        Self::Application {
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// LifecycleError
// ---------------------------------------------------------------------------

/// Failure of a whole request.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// The engine tried to move between two phases that are not adjacent.
    #[error("illegal lifecycle transition {from:?} -> {to:?}")]
    InvalidTransition { from: Phase, to: Phase },

    /// A component failed while reconciling request data.
    #[error("handling aborted at `{component}`: {source}")]
    Handling {
        component: String,
        #[source]
        source: ComponentError,
    },

    /// The deferred phase was aborted.
    #[error("deferred actions aborted: {source}")]
    Deferred {
        #[source]
        source: ComponentError,
    },

    /// A component failed while preparing to paint.
    #[error("prepare aborted at `{component}`: {source}")]
    Preparing {
        component: String,
        #[source]
        source: ComponentError,
    },

    /// The rendering collaborator failed.
    #[error("render failed: {message}")]
    Render { message: String },

    /// Configuration problem discovered while processing the request.
    #[error(transparent)]
    State(#[from] StateError),
}
