//! Node types: NodeId, NodeData, id-name validation.

use slotmap::new_key_type;

use crate::error::StateError;

new_key_type! {
    /// Unique identifier for a component node. Copy, lightweight (u64).
    pub struct NodeId;
}

/// Structural metadata for a single component node.
///
/// Session-specific state never lives here; see [`crate::model`].
#[derive(Debug, Clone)]
pub struct NodeData {
    /// Component type name (e.g. "TextField", "Repeater").
    pub type_name: &'static str,
    /// Builder-assigned id name, if any.
    pub id_name: Option<String>,
    /// Locked nodes reject default-model writes and structural changes.
    pub locked: bool,
}

impl NodeData {
    pub fn new(type_name: &'static str) -> Self {
        Self {
            type_name,
            id_name: None,
            locked: false,
        }
    }

    /// Set the id name (builder).
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id_name = Some(id.into());
        self
    }
}

/// Check that `id` is usable as an id name: an ASCII letter followed by ASCII
/// letters, digits or underscores.
///
/// Auto-generated ids start with `_` and contain `-`, and row-qualified ids
/// contain `.`, so a valid id name can never collide with either.
pub fn validate_id_name(id: &str) -> Result<(), StateError> {
    let mut chars = id.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(StateError::MalformedId { id: id.to_owned() })
    }
}
