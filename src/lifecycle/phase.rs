//! Request phases and the tracker that enforces their order.
//!
//! A request moves `Idle → Collecting → Handling → DeferredRunning → Preparing
//! → Painting → Idle`. Requests that skip handling go straight from `Idle` to
//! `Preparing`, and any phase may fall back to `Idle` when a request aborts.
//! The [`PhaseTracker`] rejects every other transition and records the phases a
//! request went through.

use crate::error::LifecycleError;

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// One step of request processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Phase {
    /// No request in flight.
    #[default]
    Idle,
    /// Gathering the visible components, children first.
    Collecting,
    /// Reconciling request data into session state.
    Handling,
    /// Draining the invoke-later queue.
    DeferredRunning,
    /// Parent-first pass before painting.
    Preparing,
    /// Handing the visible tree to the renderer.
    Painting,
}

impl Phase {
    /// Whether moving from `self` to `next` is a legal step.
    pub fn can_advance_to(self, next: Phase) -> bool {
        use Phase::*;
        matches!(
            (self, next),
            (Idle, Collecting)
                | (Collecting, Handling)
                | (Handling, DeferredRunning)
                | (DeferredRunning, Preparing)
                | (Idle, Preparing)
                | (Preparing, Painting)
                | (_, Idle)
        )
    }

    /// Whether invoke-later actions may still be queued in this phase.
    pub fn accepts_deferred(self) -> bool {
        matches!(
            self,
            Phase::Collecting | Phase::Handling | Phase::DeferredRunning
        )
    }
}

// ---------------------------------------------------------------------------
// PhaseTracker
// ---------------------------------------------------------------------------

/// Tracks the current phase of one request and the phases it has visited.
#[derive(Debug, Clone, Default)]
pub struct PhaseTracker {
    current: Phase,
    history: Vec<Phase>,
}

impl PhaseTracker {
    /// Create a tracker sitting in [`Phase::Idle`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Move to `next`, failing on an illegal transition.
    pub fn advance(&mut self, next: Phase) -> Result<(), LifecycleError> {
        if !self.current.can_advance_to(next) {
            return Err(LifecycleError::InvalidTransition {
                from: self.current,
                to: next,
            });
        }
        self.current = next;
        self.history.push(next);
        Ok(())
    }

    /// Return to [`Phase::Idle`] from wherever the request stopped.
    pub fn abort(&mut self) {
        if self.current != Phase::Idle {
            self.current = Phase::Idle;
            self.history.push(Phase::Idle);
        }
    }

    pub fn current(&self) -> Phase {
        self.current
    }

    /// Every phase entered so far, in order.
    pub fn history(&self) -> &[Phase] {
        &self.history
    }

    /// Take the history, leaving the tracker idle and empty.
    pub fn finish(&mut self) -> Vec<Phase> {
        self.current = Phase::Idle;
        std::mem::take(&mut self.history)
    }
}
