//! ComponentModel: the per-component, per-session value object.
//!
//! Every component instance has exactly one model type, fixed at compile time by
//! its [`Component::Model`](crate::component::Component::Model) associated type.
//! The tree holds one lazily created *default* model per node; sessions hold
//! sparse *session* models that override it. Both are the same
//! `ComponentModel<M>` type, so a session model is always a clone of the model it
//! overrides.

use std::any::{type_name, Any};
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::attributes::Attributes;

// ---------------------------------------------------------------------------
// ModelData
// ---------------------------------------------------------------------------

/// Component-type specific state stored inside a [`ComponentModel`].
///
/// `matches_default` decides whether a session copy can be discarded by the tidy
/// pass. Structural equality is the default; override it when the model holds
/// fields whose equality should not count (caches, listener lists, ...).
///
/// Model data is replicated with the session, so it must round-trip through
/// serde.
pub trait ModelData:
    Any + Clone + Default + PartialEq + fmt::Debug + Send + Sync + Serialize + DeserializeOwned
{
    fn matches_default(&self, default: &Self) -> bool {
        self == default
    }
}

impl ModelData for () {}

// ---------------------------------------------------------------------------
// ComponentModel
// ---------------------------------------------------------------------------

/// State shared by every component type plus the component's own `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentModel<M> {
    /// Whether the component (and its subtree) takes part in the request.
    pub visible: bool,
    /// Disabled components ignore request data.
    pub disabled: bool,
    /// Read-only components ignore request data.
    pub read_only: bool,
    /// Free-form serializable attributes.
    pub attributes: Attributes,
    /// Component-specific state.
    pub data: M,
}

impl<M: Default> Default for ComponentModel<M> {
    fn default() -> Self {
        Self {
            visible: true,
            disabled: false,
            read_only: false,
            attributes: Attributes::new(),
            data: M::default(),
        }
    }
}

impl<M: ModelData> ComponentModel<M> {
    /// Create a model with default flags around the given data.
    pub fn with_data(data: M) -> Self {
        Self {
            data,
            ..Self::default()
        }
    }

    /// Whether this model carries the same observable state as `default`.
    pub fn matches(&self, default: &Self) -> bool {
        self.visible == default.visible
            && self.disabled == default.disabled
            && self.read_only == default.read_only
            && self.attributes == default.attributes
            && self.data.matches_default(&default.data)
    }
}

// ---------------------------------------------------------------------------
// Flags
// ---------------------------------------------------------------------------

/// The common flags, readable without knowing the model type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flags {
    pub visible: bool,
    pub disabled: bool,
    pub read_only: bool,
}

// ---------------------------------------------------------------------------
// AnyModel
// ---------------------------------------------------------------------------

/// Type-erased view of a `ComponentModel<M>`, used where the tree and the
/// context store handle models of many types side by side.
pub trait AnyModel: Any + Send + Sync + fmt::Debug {
    fn flags(&self) -> Flags;

    fn attributes(&self) -> &Attributes;

    fn clone_boxed(&self) -> Box<dyn AnyModel>;

    /// `false` if `default` is of a different model type.
    fn matches_default(&self, default: &dyn AnyModel) -> bool;

    /// Name of the concrete `ComponentModel<M>` type.
    fn model_type_name(&self) -> &'static str;

    /// Serialized form, for session replication.
    fn to_json(&self) -> Result<serde_json::Value, serde_json::Error>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<M: ModelData> AnyModel for ComponentModel<M> {
    fn flags(&self) -> Flags {
        Flags {
            visible: self.visible,
            disabled: self.disabled,
            read_only: self.read_only,
        }
    }

    fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    fn clone_boxed(&self) -> Box<dyn AnyModel> {
        Box::new(self.clone())
    }

    fn matches_default(&self, default: &dyn AnyModel) -> bool {
        default
            .as_any()
            .downcast_ref::<Self>()
            .is_some_and(|d| self.matches(d))
    }

    fn model_type_name(&self) -> &'static str {
        type_name::<Self>()
    }

    fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl dyn AnyModel {
    /// Downcast to the typed model.
    pub fn downcast_ref<M: ModelData>(&self) -> Option<&ComponentModel<M>> {
        self.as_any().downcast_ref::<ComponentModel<M>>()
    }

    /// Mutable downcast to the typed model.
    pub fn downcast_mut<M: ModelData>(&mut self) -> Option<&mut ComponentModel<M>> {
        self.as_any_mut().downcast_mut::<ComponentModel<M>>()
    }
}

/// Factory used by the tree to create a default model on first access.
pub(crate) fn new_default_model<M: ModelData>() -> Box<dyn AnyModel> {
    Box::new(ComponentModel::<M>::default())
}

/// Rebuild a replicated model of type `M`.
pub(crate) fn model_from_json<M: ModelData>(
    value: serde_json::Value,
) -> Result<Box<dyn AnyModel>, serde_json::Error> {
    let model: ComponentModel<M> = serde_json::from_value(value)?;
    Ok(Box::new(model))
}
