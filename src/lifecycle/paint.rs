//! Paint frames and the renderer collaborator.
//!
//! The engine never produces output itself. It hands the renderer a
//! [`PaintFrame`]: the visible tree, or for an AJAX request only the target
//! subtrees, with every node tagged by the context it must be read in.

use crate::context::{ContextId, Cx};
use crate::error::ComponentError;
use crate::tree::NodeId;

/// One visible component instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaintNode {
    /// Qualified id of this instance.
    pub id: String,
    pub type_name: &'static str,
    /// Context to read this instance's state in.
    pub context: ContextId,
    pub node: NodeId,
    pub children: Vec<PaintNode>,
}

impl PaintNode {
    fn collect_ids(&self, out: &mut Vec<String>) {
        out.push(self.id.clone());
        for child in &self.children {
            child.collect_ids(out);
        }
    }
}

/// What one response paints.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaintFrame {
    /// Subtrees to render, in order. A full page has a single root.
    pub roots: Vec<PaintNode>,
    /// Container whose content the roots replace, for content-replacement
    /// responses.
    pub container: Option<String>,
}

impl PaintFrame {
    /// Qualified ids of every painted instance, pre-order.
    pub fn ids(&self) -> Vec<String> {
        let mut out = Vec::new();
        for root in &self.roots {
            root.collect_ids(&mut out);
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}

/// Turns a paint frame into output. Owns the output format entirely.
pub trait Renderer {
    /// Render `frame`. State is read through `cx` in each node's context.
    fn render(&mut self, cx: &Cx<'_>, frame: &PaintFrame) -> Result<(), ComponentError>;
}
