//! Component trait: typed request handling and paint preparation.
//!
//! A `Component` is the shared, stateless behaviour of one tree node. It never
//! stores session state in `self`; everything it reads or writes goes through the
//! [`Cx`] it is handed, typed by its `Model`. The `ComponentExt` trait adds
//! builder-style id naming.

use crate::context::Cx;
use crate::error::ComponentError;
use crate::model::component_model::{model_from_json, new_default_model};
use crate::model::{AnyModel, Handle, ModelData};
use crate::tree::NodeId;

// ---------------------------------------------------------------------------
// Component trait
// ---------------------------------------------------------------------------

/// Behaviour shared by every session for one node of the tree.
pub trait Component: Send + Sync + 'static {
    /// The model type holding this component's per-session state.
    type Model: ModelData;

    /// Component type name (e.g. "TextField").
    fn type_name(&self) -> &'static str;

    /// Builder-assigned id name. See [`ComponentExt::with_id`].
    fn id_name(&self) -> Option<&str> {
        None
    }

    /// Reconcile request data into this component's state.
    ///
    /// Called bottom-up for every visible, enabled, writable component when the
    /// request uses the handling verb. Work that may affect *other* components
    /// belongs in [`Cx::invoke_later`].
    fn handle_request(
        &self,
        cx: &mut Cx<'_>,
        this: Handle<Self::Model>,
    ) -> Result<(), ComponentError> {
        let _ = (cx, this);
        Ok(())
    }

    /// Last-moment adjustments before painting. Called top-down over the
    /// visible tree; AJAX triggers register their operations here.
    fn prepare_paint(
        &self,
        cx: &mut Cx<'_>,
        this: Handle<Self::Model>,
    ) -> Result<(), ComponentError> {
        let _ = (cx, this);
        Ok(())
    }

    /// Whether this component renders its children once per row.
    fn is_repeating(&self) -> bool {
        false
    }

    /// Row keys for a repeating component, in render order. Each row gets its
    /// own sub-context.
    fn rows(&self, cx: &Cx<'_>, this: Handle<Self::Model>) -> Vec<String> {
        let _ = (cx, this);
        Vec::new()
    }
}

// ---------------------------------------------------------------------------
// DynComponent
// ---------------------------------------------------------------------------

/// Object-safe form of [`Component`] stored in the tree. Converts node ids
/// back into typed handles.
pub(crate) trait DynComponent: Send + Sync {
    fn type_name(&self) -> &'static str;
    fn new_default(&self) -> Box<dyn AnyModel>;
    fn model_from_json(
        &self,
        value: serde_json::Value,
    ) -> Result<Box<dyn AnyModel>, serde_json::Error>;
    fn handle_request(&self, cx: &mut Cx<'_>, node: NodeId) -> Result<(), ComponentError>;
    fn prepare_paint(&self, cx: &mut Cx<'_>, node: NodeId) -> Result<(), ComponentError>;
    fn is_repeating(&self) -> bool;
    fn rows(&self, cx: &Cx<'_>, node: NodeId) -> Vec<String>;
}

impl<C: Component> DynComponent for C {
    fn type_name(&self) -> &'static str {
        Component::type_name(self)
    }

    fn new_default(&self) -> Box<dyn AnyModel> {
        new_default_model::<C::Model>()
    }

    fn model_from_json(
        &self,
        value: serde_json::Value,
    ) -> Result<Box<dyn AnyModel>, serde_json::Error> {
        model_from_json::<C::Model>(value)
    }

    fn handle_request(&self, cx: &mut Cx<'_>, node: NodeId) -> Result<(), ComponentError> {
        Component::handle_request(self, cx, Handle::new(node))
    }

    fn prepare_paint(&self, cx: &mut Cx<'_>, node: NodeId) -> Result<(), ComponentError> {
        Component::prepare_paint(self, cx, Handle::new(node))
    }

    fn is_repeating(&self) -> bool {
        Component::is_repeating(self)
    }

    fn rows(&self, cx: &Cx<'_>, node: NodeId) -> Vec<String> {
        Component::rows(self, cx, Handle::new(node))
    }
}

// ---------------------------------------------------------------------------
// ComponentExt / Named
// ---------------------------------------------------------------------------

/// Extension trait providing builder-style naming for components.
///
/// Automatically implemented for all types that implement `Component`.
pub trait ComponentExt: Component + Sized {
    /// Wrap this component with an id name.
    fn with_id(self, id: &str) -> Named<Self> {
        Named {
            component: self,
            id: id.to_owned(),
        }
    }
}

impl<T: Component> ComponentExt for T {}

/// A component carrying an id name. Delegates all behaviour to the inner
/// component.
#[derive(Debug)]
pub struct Named<C> {
    /// The wrapped component.
    pub component: C,
    /// The id name.
    pub id: String,
}

impl<C: Component> Component for Named<C> {
    type Model = C::Model;

    fn type_name(&self) -> &'static str {
        Component::type_name(&self.component)
    }

    fn id_name(&self) -> Option<&str> {
        Some(&self.id)
    }

    fn handle_request(
        &self,
        cx: &mut Cx<'_>,
        this: Handle<Self::Model>,
    ) -> Result<(), ComponentError> {
        Component::handle_request(&self.component, cx, this)
    }

    fn prepare_paint(
        &self,
        cx: &mut Cx<'_>,
        this: Handle<Self::Model>,
    ) -> Result<(), ComponentError> {
        Component::prepare_paint(&self.component, cx, this)
    }

    fn is_repeating(&self) -> bool {
        Component::is_repeating(&self.component)
    }

    fn rows(&self, cx: &Cx<'_>, this: Handle<Self::Model>) -> Vec<String> {
        Component::rows(&self.component, cx, this)
    }
}
