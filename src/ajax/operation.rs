//! AjaxOperation: a trigger → targets mapping for partial repaints.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// AjaxAction
// ---------------------------------------------------------------------------

/// What a partial-repaint request does with its targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AjaxAction {
    /// Repaint each target component in place.
    Repaint,
    /// Replace the content of a named container with one component's output.
    ReplaceContent {
        container_id: String,
        content_id: String,
    },
}

// ---------------------------------------------------------------------------
// LoadPolicy
// ---------------------------------------------------------------------------

/// How often, and after what delay, a trigger may fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LoadPolicy {
    /// Maximum number of times the trigger may be serviced. `None` is unlimited.
    pub load_count: Option<u32>,
    /// Client-side delay before firing, in milliseconds. Zero or negative fires
    /// immediately.
    pub delay_ms: i64,
}

impl LoadPolicy {
    /// The delay to apply, or `None` for "immediately".
    pub fn delay(&self) -> Option<Duration> {
        u64::try_from(self.delay_ms)
            .ok()
            .filter(|&ms| ms > 0)
            .map(Duration::from_millis)
    }

    /// Whether a trigger already serviced `fired` times may not fire again.
    pub fn is_exhausted(&self, fired: u32) -> bool {
        self.load_count.is_some_and(|limit| fired >= limit)
    }
}

// ---------------------------------------------------------------------------
// AjaxOperation
// ---------------------------------------------------------------------------

/// A registered partial-repaint operation.
///
/// Target ids are qualified component ids. Duplicates are dropped on
/// construction, keeping the first occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AjaxOperation {
    trigger_id: String,
    targets: Vec<String>,
    action: AjaxAction,
    policy: LoadPolicy,
}

impl AjaxOperation {
    /// Repaint `targets` when `trigger_id` fires. With no targets, the trigger
    /// repaints itself.
    pub fn repaint(
        trigger_id: impl Into<String>,
        targets: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        let trigger_id = trigger_id.into();
        let mut unique: Vec<String> = Vec::new();
        for target in targets {
            let target = target.into();
            if !unique.contains(&target) {
                unique.push(target);
            }
        }
        if unique.is_empty() {
            unique.push(trigger_id.clone());
        }
        Self {
            trigger_id,
            targets: unique,
            action: AjaxAction::Repaint,
            policy: LoadPolicy::default(),
        }
    }

    /// Replace the content of `container_id` with the output of `content_id`
    /// when `trigger_id` fires. The container need not be a component.
    pub fn replace_content(
        trigger_id: impl Into<String>,
        container_id: impl Into<String>,
        content_id: impl Into<String>,
    ) -> Self {
        let content_id = content_id.into();
        Self {
            trigger_id: trigger_id.into(),
            targets: vec![content_id.clone()],
            action: AjaxAction::ReplaceContent {
                container_id: container_id.into(),
                content_id,
            },
            policy: LoadPolicy::default(),
        }
    }

    /// Limit how many times the trigger may be serviced (builder).
    pub fn with_load_count(mut self, load_count: u32) -> Self {
        self.policy.load_count = Some(load_count);
        self
    }

    /// Set the client-side delay in milliseconds (builder).
    pub fn with_delay_ms(mut self, delay_ms: i64) -> Self {
        self.policy.delay_ms = delay_ms;
        self
    }

    pub fn trigger_id(&self) -> &str {
        &self.trigger_id
    }

    /// Ids to paint, in registration order.
    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    pub fn action(&self) -> &AjaxAction {
        &self.action
    }

    pub fn policy(&self) -> LoadPolicy {
        self.policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn repaint_dedups_targets_in_order() {
        let op = AjaxOperation::repaint("go", ["b", "a", "b", "a", "c"]);
        assert_eq!(op.targets(), &["b", "a", "c"]);
        assert_eq!(op.action(), &AjaxAction::Repaint);
    }

    #[test]
    fn repaint_without_targets_repaints_trigger() {
        let op = AjaxOperation::repaint("poll", Vec::<String>::new());
        assert_eq!(op.targets(), &["poll"]);
    }

    #[test]
    fn replace_content_targets_content() {
        let op = AjaxOperation::replace_content("tab2", "panel", "detail");
        assert_eq!(op.targets(), &["detail"]);
        assert_eq!(
            op.action(),
            &AjaxAction::ReplaceContent {
                container_id: "panel".into(),
                content_id: "detail".into(),
            }
        );
    }

    #[test]
    fn non_positive_delay_is_immediate() {
        assert_eq!(LoadPolicy { load_count: None, delay_ms: 0 }.delay(), None);
        assert_eq!(LoadPolicy { load_count: None, delay_ms: -50 }.delay(), None);
        assert_eq!(
            AjaxOperation::repaint("t", ["x"]).with_delay_ms(250).policy().delay(),
            Some(Duration::from_millis(250))
        );
    }

    #[test]
    fn load_count_exhaustion() {
        let policy = AjaxOperation::repaint("t", ["x"]).with_load_count(2).policy();
        assert!(!policy.is_exhausted(0));
        assert!(!policy.is_exhausted(1));
        assert!(policy.is_exhausted(2));
        assert!(!LoadPolicy::default().is_exhausted(u32::MAX));
    }

    #[test]
    fn serializes_for_session_replication() {
        let op = AjaxOperation::replace_content("t", "c", "d").with_load_count(1);
        let json = serde_json::to_string(&op).unwrap();
        let back: AjaxOperation = serde_json::from_str(&json).unwrap();
        assert_eq!(back, op);
    }
}
