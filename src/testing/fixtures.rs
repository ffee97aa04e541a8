//! Small components for tests and demos.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::component::Component;
use crate::context::Cx;
use crate::error::ComponentError;
use crate::model::{Handle, ModelData};

// ---------------------------------------------------------------------------
// TextField
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextData {
    pub value: String,
}

impl ModelData for TextData {}

/// Takes its value from the request parameter named by its qualified id.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextField;

impl Component for TextField {
    type Model = TextData;

    fn type_name(&self) -> &'static str {
        "TextField"
    }

    fn handle_request(
        &self,
        cx: &mut Cx<'_>,
        this: Handle<TextData>,
    ) -> Result<(), ComponentError> {
        let id = cx.qualified_id(this)?;
        let Some(value) = cx.parameter(&id).map(str::to_owned) else {
            return Ok(());
        };
        if cx.state(this)?.data.value != value {
            cx.state_mut(this)?.data.value = value;
            cx.mark_changed(this);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// NumberField
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberData {
    pub value: i64,
}

impl ModelData for NumberData {}

/// Numeric input. Unparseable input leaves the last valid value in place.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumberField;

impl Component for NumberField {
    type Model = NumberData;

    fn type_name(&self) -> &'static str {
        "NumberField"
    }

    fn handle_request(
        &self,
        cx: &mut Cx<'_>,
        this: Handle<NumberData>,
    ) -> Result<(), ComponentError> {
        let id = cx.qualified_id(this)?;
        if let Some(value) = cx.parameter_as::<i64>(&id) {
            if cx.state(this)?.data.value != value {
                cx.state_mut(this)?.data.value = value;
                cx.mark_changed(this);
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Button
// ---------------------------------------------------------------------------

type Action = Arc<dyn Fn(&mut Cx<'_>) -> Result<(), ComponentError> + Send + Sync>;

/// Queues its action when the request carries a parameter named by its id.
#[derive(Clone)]
pub struct Button {
    action: Action,
}

impl Button {
    pub fn new<F>(action: F) -> Self
    where
        F: Fn(&mut Cx<'_>) -> Result<(), ComponentError> + Send + Sync + 'static,
    {
        Self {
            action: Arc::new(action),
        }
    }
}

impl fmt::Debug for Button {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Button").finish_non_exhaustive()
    }
}

impl Component for Button {
    type Model = ();

    fn type_name(&self) -> &'static str {
        "Button"
    }

    fn handle_request(&self, cx: &mut Cx<'_>, this: Handle<()>) -> Result<(), ComponentError> {
        let id = cx.qualified_id(this)?;
        if cx.parameter(&id).is_none() {
            return Ok(());
        }
        debug!(button = %id, "pressed");
        let action = Arc::clone(&self.action);
        cx.invoke_later(move |cx| action(cx));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Faulty
// ---------------------------------------------------------------------------

/// Fails every time it handles a request.
#[derive(Debug, Clone, Copy, Default)]
pub struct Faulty;

impl Component for Faulty {
    type Model = ();

    fn type_name(&self) -> &'static str {
        "Faulty"
    }

    fn handle_request(&self, _cx: &mut Cx<'_>, _this: Handle<()>) -> Result<(), ComponentError> {
        Err(ComponentError::application("faulty component"))
    }
}
