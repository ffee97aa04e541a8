//! Outline renderer: paint frames as indented text for snapshot assertions.

use crate::context::Cx;
use crate::error::ComponentError;
use crate::lifecycle::{PaintFrame, PaintNode, Renderer};

/// Renders one `Type#id` line per painted instance, indented two spaces per
/// level. Disabled and read-only instances are marked. A content-replacement
/// frame starts with an `@container` line.
///
/// ```text
/// Container#form
///   TextField#name [disabled]
///   TextField#email
/// ```
#[derive(Debug, Default)]
pub struct OutlineRenderer {
    output: String,
}

impl OutlineRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Output of the last render.
    pub fn output(&self) -> &str {
        &self.output
    }

    fn line(
        &mut self,
        cx: &Cx<'_>,
        node: &PaintNode,
        depth: usize,
    ) -> Result<(), ComponentError> {
        let indent = depth * 2;
        self.output
            .push_str(&format!("{:indent$}{}#{}", "", node.type_name, node.id));
        if cx.is_disabled_in(node.context, node.node)? {
            self.output.push_str(" [disabled]");
        }
        if cx.is_read_only_in(node.context, node.node)? {
            self.output.push_str(" [read-only]");
        }
        self.output.push('\n');
        for child in &node.children {
            self.line(cx, child, depth + 1)?;
        }
        Ok(())
    }
}

impl Renderer for OutlineRenderer {
    fn render(&mut self, cx: &Cx<'_>, frame: &PaintFrame) -> Result<(), ComponentError> {
        self.output.clear();
        if let Some(container) = &frame.container {
            self.output.push('@');
            self.output.push_str(container);
            self.output.push('\n');
        }
        for root in &frame.roots {
            self.line(cx, root, 0)?;
        }
        Ok(())
    }
}
