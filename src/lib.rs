//! # weft
//!
//! Session-state and request-lifecycle runtime for server-rendered component trees.
//!
//! weft lets one component tree, built once and locked, serve any number of
//! concurrent sessions. Components are stateless flyweights: what a session sees
//! is the tree's default model for each node, overlaid with the sparse session
//! models that session has written. Requests run through a fixed lifecycle, and
//! AJAX requests narrow painting down to the subtrees an operation targets.
//!
//! ## Core Systems
//!
//! - **[`tree`]**: Slotmap-backed component arena, id naming, locking, navigation queries
//! - **[`model`]**: `ComponentModel<M>`, typed handles, pluggable default equivalence
//! - **[`component`]**: The `Component` trait and built-in `Container`, `Repeater`, `AjaxControl`
//! - **[`context`]**: Per-session context overlay, row sub-contexts, scratch, `Cx`, snapshots
//! - **[`lifecycle`]**: Phase state machine, the `Engine`, paint frames and the `Renderer` trait
//! - **[`ajax`]**: Partial-repaint operations, the per-session operation table, follow-up URLs
//! - **[`request`]**: `Request` and `Environment` collaborator traits
//! - **[`error`]**: Error taxonomy
//! - **[`testing`]**: Mock collaborators, outline renderer and the headless `Pilot`

// Foundation
pub mod error;
pub mod request;

// State
pub mod model;
pub mod tree;

// Behaviour
pub mod component;
pub mod context;

// Processing
pub mod ajax;
pub mod lifecycle;

// Test support
pub mod testing;

pub use component::{Component, ComponentExt};
pub use context::{Cx, Session};
pub use error::{ComponentError, LifecycleError, StateError};
pub use lifecycle::{Engine, EngineConfig};
pub use model::{ComponentModel, Handle, ModelData};
pub use tree::ComponentTree;
