//! Components: the [`Component`] trait and the built-in structural components.

pub mod ajax_control;
pub mod container;
pub mod repeater;
pub mod traits;

pub use ajax_control::{AjaxControl, AjaxControlData};
pub use container::Container;
pub use repeater::{Repeater, RepeaterData};
pub use traits::{Component, ComponentExt, Named};
