//! Repeater: renders its children once per row.

use serde::{Deserialize, Serialize};

use super::traits::Component;
use crate::context::Cx;
use crate::model::{Handle, ModelData};

/// Row keys of a [`Repeater`], in render order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepeaterData {
    pub rows: Vec<String>,
}

impl ModelData for RepeaterData {}

/// A repeating region. The child subtree is processed once per row key, each
/// time inside that row's own sub-context, so every row carries independent
/// state while sharing one set of component objects.
///
/// Row keys become part of qualified ids (`name.key`) and must not contain `.`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Repeater;

impl Repeater {
    /// Replace the row keys for the current session.
    pub fn set_rows(
        cx: &mut Cx<'_>,
        this: Handle<RepeaterData>,
        rows: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<(), crate::error::StateError> {
        cx.state_mut(this)?.data.rows = rows.into_iter().map(Into::into).collect();
        Ok(())
    }
}

impl Component for Repeater {
    type Model = RepeaterData;

    fn type_name(&self) -> &'static str {
        "Repeater"
    }

    fn is_repeating(&self) -> bool {
        true
    }

    fn rows(&self, cx: &Cx<'_>, this: Handle<RepeaterData>) -> Vec<String> {
        cx.state(this)
            .map(|model| model.data.rows.clone())
            .unwrap_or_default()
    }
}
