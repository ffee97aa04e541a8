//! Container: a plain grouping component with no state of its own.

use super::traits::Component;

/// Groups child components. Its model only carries the common flags, which is
/// enough to hide, disable or make read-only a whole subtree at once.
#[derive(Debug, Clone, Copy, Default)]
pub struct Container;

impl Component for Container {
    type Model = ();

    fn type_name(&self) -> &'static str {
        "Container"
    }
}
