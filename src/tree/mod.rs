//! Component tree: slotmap-backed node arena shared by all sessions.

pub mod component_tree;
pub mod node;
pub mod query;

pub use component_tree::ComponentTree;
pub use node::{validate_id_name, NodeData, NodeId};
