use std::time::Duration;

use tokio::time::Instant;

use crate::types::VisibilityState;

/// What the monitor should do after the page became visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reactivation {
    /// Page was already visible; nothing to do.
    AlreadyVisible,
    /// Short absence: a cheap probe is enough unless it fails.
    Probe { elapsed: Duration },
    /// Long absence: schedule a full reconnect.
    Reconnect { elapsed: Duration },
}

/// Tracks visibility and the last moment the page was known to be active.
#[derive(Debug, Clone)]
pub struct VisibilityTracker {
    state: VisibilityState,
    last_active: Instant,
}

impl VisibilityTracker {
    pub fn new(now: Instant) -> Self {
        Self {
            state: VisibilityState::Visible,
            last_active: now,
        }
    }

    pub fn state(&self) -> VisibilityState {
        self.state
    }

    pub fn is_visible(&self) -> bool {
        self.state == VisibilityState::Visible
    }

    pub fn last_active(&self) -> Instant {
        self.last_active
    }

    /// Record the page going to the background.
    ///
    /// Returns `true` if this was a Visible -> Hidden transition. Repeated
    /// hidden signals (blur after visibilitychange) still move the timestamp.
    pub fn on_hidden(&mut self, now: Instant) -> bool {
        let transitioned = self.state == VisibilityState::Visible;
        self.state = VisibilityState::Hidden;
        self.last_active = now;
        transitioned
    }

    /// Record the page coming to the foreground and decide how to recover.
    ///
    /// An absence strictly longer than `threshold` asks for a reconnect.
    pub fn on_visible(&mut self, now: Instant, threshold: Duration) -> Reactivation {
        let decision = match self.state {
            VisibilityState::Visible => Reactivation::AlreadyVisible,
            VisibilityState::Hidden => {
                let elapsed = now.saturating_duration_since(self.last_active);
                if elapsed > threshold {
                    Reactivation::Reconnect { elapsed }
                } else {
                    Reactivation::Probe { elapsed }
                }
            }
        };

        self.state = VisibilityState::Visible;
        self.last_active = now;
        decision
    }
}
