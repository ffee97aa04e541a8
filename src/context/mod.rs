//! Per-session state: the context overlay, scratch storage, the invoke-later
//! queue, the per-request [`Cx`] with its explicit context stack, and the
//! serializable session snapshot used for replication.

pub mod cx;
pub mod deferred;
pub mod headers;
pub mod scratch;
pub mod session;
pub mod snapshot;
pub mod store;

pub use cx::{ContextGuard, Cx};
pub use deferred::{Deferred, DeferredAction, DeferredQueue};
pub use headers::Headers;
pub use scratch::Scratch;
pub use session::Session;
pub use snapshot::{ContextSnapshot, SessionSnapshot};
pub use store::{Context, ContextId, ContextStore};
