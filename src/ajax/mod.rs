//! Partial-repaint (AJAX) targeting: operations, the session operation table,
//! follow-up URLs.

pub mod follow_up;
pub mod operation;
pub mod table;

pub use follow_up::follow_up_url;
pub use operation::{AjaxAction, AjaxOperation, LoadPolicy};
pub use table::OperationTable;
