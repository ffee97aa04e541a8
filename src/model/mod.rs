//! Component models: default-vs-session state, attribute bags, typed handles.

pub mod attributes;
pub mod component_model;
pub mod handle;

pub use attributes::Attributes;
pub use component_model::{AnyModel, ComponentModel, Flags, ModelData};
pub use handle::Handle;
