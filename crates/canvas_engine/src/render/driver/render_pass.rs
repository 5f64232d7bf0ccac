//! Render pass state machine
//!
//! `Idle -> Begin(target, params) -> [bind* -> draw]* -> End -> Idle`.
//! Beginning a pass while one is active, ending without one, or drawing
//! outside a pass are contract violations and panic.

use super::handle::RenderTargetHandle;
use super::types::RenderPassParams;

/// Current pass of a driver
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RenderPassState {
    /// No pass open
    Idle,
    /// A pass is recording into `target`
    Active {
        /// Bound target
        target: RenderTargetHandle,
        /// Parameters the pass began with
        params: RenderPassParams,
    },
}

/// Tracks the pass state for a backend
#[derive(Debug, Clone, Copy)]
pub struct RenderPassTracker {
    state: RenderPassState,
}

impl Default for RenderPassTracker {
    fn default() -> Self {
        Self {
            state: RenderPassState::Idle,
        }
    }
}

impl RenderPassTracker {
    /// Idle -> Active
    pub fn begin(&mut self, target: RenderTargetHandle, params: RenderPassParams) {
        assert!(
            matches!(self.state, RenderPassState::Idle),
            "begin_render_pass called while a render pass is already active"
        );
        self.state = RenderPassState::Active { target, params };
    }

    /// Active -> Idle, returning the target that was bound
    pub fn end(&mut self) -> RenderTargetHandle {
        match self.state {
            RenderPassState::Active { target, .. } => {
                self.state = RenderPassState::Idle;
                target
            }
            RenderPassState::Idle => panic!("end_render_pass called without an active render pass"),
        }
    }

    /// Current state
    pub fn state(&self) -> RenderPassState {
        self.state
    }

    /// Bound target, panicking with `operation` in the message when idle
    pub fn require_active(&self, operation: &str) -> (RenderTargetHandle, RenderPassParams) {
        match self.state {
            RenderPassState::Active { target, params } => (target, params),
            RenderPassState::Idle => panic!("{operation} called outside of a render pass"),
        }
    }

    /// True while a pass is open
    pub fn is_active(&self) -> bool {
        matches!(self.state, RenderPassState::Active { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_end_cycle() {
        let mut tracker = RenderPassTracker::default();
        let target = RenderTargetHandle::default();

        tracker.begin(target, RenderPassParams::default());
        assert!(tracker.is_active());
        assert_eq!(tracker.require_active("draw").0, target);
        assert_eq!(tracker.end(), target);
        assert_eq!(tracker.state(), RenderPassState::Idle);
    }

    #[test]
    #[should_panic(expected = "already active")]
    fn test_nested_begin_panics() {
        let mut tracker = RenderPassTracker::default();
        tracker.begin(RenderTargetHandle::default(), RenderPassParams::default());
        tracker.begin(RenderTargetHandle::default(), RenderPassParams::default());
    }

    #[test]
    #[should_panic(expected = "draw called outside of a render pass")]
    fn test_draw_outside_pass_panics() {
        RenderPassTracker::default().require_active("draw");
    }
}
