//! AjaxControl: declares a partial-repaint trigger while preparing.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::traits::Component;
use crate::ajax::{follow_up_url, AjaxOperation};
use crate::context::Cx;
use crate::error::ComponentError;
use crate::model::{Handle, ModelData};

/// Request-scratch key holding whether the last registration was accepted.
pub const REGISTERED: &str = "registered";

/// Request-scratch key holding the follow-up URL, when the session has an
/// environment.
pub const FOLLOW_UP_URL: &str = "url";

/// What an [`AjaxControl`] registers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AjaxControlData {
    /// Trigger id. `None` makes the control its own trigger.
    pub trigger: Option<String>,
    /// Qualified ids to repaint. Empty repaints the trigger.
    pub targets: Vec<String>,
    pub load_count: Option<u32>,
    pub delay_ms: i64,
}

impl ModelData for AjaxControlData {}

/// Registers a repaint operation for its trigger every time it is prepared,
/// until the trigger's load count runs out.
#[derive(Debug, Clone, Copy, Default)]
pub struct AjaxControl;

impl Component for AjaxControl {
    type Model = AjaxControlData;

    fn type_name(&self) -> &'static str {
        "AjaxControl"
    }

    fn prepare_paint(
        &self,
        cx: &mut Cx<'_>,
        this: Handle<AjaxControlData>,
    ) -> Result<(), ComponentError> {
        let data = cx.state(this)?.data.clone();
        let trigger = match data.trigger {
            Some(trigger) => trigger,
            None => cx.qualified_id(this)?,
        };

        let mut operation = AjaxOperation::repaint(trigger.as_str(), data.targets)
            .with_delay_ms(data.delay_ms);
        if let Some(limit) = data.load_count {
            operation = operation.with_load_count(limit);
        }
        let registered = cx.register_operation(operation);
        if !registered {
            debug!(trigger = %trigger, "ajax control not re-registered");
        }

        let url = cx
            .store()
            .environment()
            .map(|env| follow_up_url(&**env, &cx.config().ajax_trigger_param, &trigger));
        let scratch = cx.request_scratch(this)?;
        scratch.insert(REGISTERED, registered);
        if let Some(url) = url {
            scratch.insert(FOLLOW_UP_URL, url);
        }
        Ok(())
    }
}
