//! Reducer for the floating "reconnect" prompt shown by the marketplace pages.

use reconnect_core::MonitorEvent;
use tracing::{debug, trace};

/// Hide the prompt this long after a confirmed reconnect.
const HIDE_AFTER_RECONNECT_MS: u64 = 3_000;
/// Give up on the spinner if no reconnect is confirmed within this window.
const RECONNECTING_TIMEOUT_MS: u64 = 5_000;

/// Snapshot consumed by whatever renders the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSnapshot {
    pub visible: bool,
    pub label: &'static str,
    pub is_reconnecting: bool,
    pub is_online: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ReconnectPromptState {
    show_button: bool,
    is_reconnecting: bool,
    is_offline: bool,
    stuck_loading_detected: bool,
    hide_at_ms: Option<u64>,
    reconnecting_deadline_ms: Option<u64>,
}

impl ReconnectPromptState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> PromptSnapshot {
        PromptSnapshot {
            visible: self.show_button,
            label: self.label(),
            is_reconnecting: self.is_reconnecting,
            is_online: !self.is_offline,
        }
    }

    /// Fold one monitor broadcast into prompt state.
    pub fn apply_event(&mut self, event: &MonitorEvent, now_ms: u64) {
        trace!(?event, "prompt event");
        match event {
            MonitorEvent::ConnectivityChanged { online: false } => {
                self.is_offline = true;
                self.show();
            }
            MonitorEvent::ConnectivityChanged { online: true } => self.is_offline = false,
            MonitorEvent::NetworkErrorObserved { .. } => self.show(),
            MonitorEvent::StuckLoadingDetected { .. } => {
                self.stuck_loading_detected = true;
                self.show();
            }
            MonitorEvent::Reconnected { .. } => {
                self.is_reconnecting = false;
                self.reconnecting_deadline_ms = None;
                if self.show_button {
                    self.hide_at_ms = Some(now_ms + HIDE_AFTER_RECONNECT_MS);
                }
            }
            MonitorEvent::ReloadRequested { .. } => {
                *self = Self::default();
            }
            MonitorEvent::VisibilityChanged { .. } => {}
        }
    }

    /// The user pressed the prompt button.
    pub fn begin_manual_reconnect(&mut self, now_ms: u64) {
        debug!("manual reconnect pressed");
        self.is_reconnecting = true;
        self.reconnecting_deadline_ms = Some(now_ms + RECONNECTING_TIMEOUT_MS);
    }

    /// Advance prompt timers.
    pub fn tick(&mut self, now_ms: u64) {
        if self
            .reconnecting_deadline_ms
            .is_some_and(|deadline| now_ms >= deadline)
        {
            debug!("reconnect not confirmed in time; resetting spinner");
            self.is_reconnecting = false;
            self.reconnecting_deadline_ms = None;
        }

        if self.hide_at_ms.is_some_and(|deadline| now_ms >= deadline) {
            self.show_button = false;
            self.stuck_loading_detected = false;
            self.hide_at_ms = None;
        }
    }

    fn show(&mut self) {
        self.show_button = true;
        self.hide_at_ms = None;
    }

    fn label(&self) -> &'static str {
        if self.is_reconnecting {
            "Reconnecting..."
        } else if self.stuck_loading_detected {
            "Reload data"
        } else if self.is_offline {
            "No connection"
        } else {
            "Reconnect"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reconnect_core::{IndicatorId, ReasonCode};

    #[test]
    fn hidden_until_something_goes_wrong() {
        let state = ReconnectPromptState::new();
        let snapshot = state.snapshot();
        assert!(!snapshot.visible);
        assert!(snapshot.is_online);
        assert_eq!(snapshot.label, "Reconnect");
    }

    #[test]
    fn offline_shows_no_connection_prompt() {
        let mut state = ReconnectPromptState::new();
        state.apply_event(&MonitorEvent::ConnectivityChanged { online: false }, 0);

        let snapshot = state.snapshot();
        assert!(snapshot.visible);
        assert!(!snapshot.is_online);
        assert_eq!(snapshot.label, "No connection");
    }

    #[test]
    fn stuck_loading_asks_to_reload_data() {
        let mut state = ReconnectPromptState::new();
        state.apply_event(
            &MonitorEvent::StuckLoadingDetected {
                indicator: IndicatorId::new("listings"),
            },
            0,
        );
        assert_eq!(state.snapshot().label, "Reload data");
    }

    #[test]
    fn reconnect_hides_prompt_after_delay() {
        let mut state = ReconnectPromptState::new();
        state.apply_event(
            &MonitorEvent::NetworkErrorObserved {
                message: "Failed to fetch".to_owned(),
            },
            0,
        );
        state.begin_manual_reconnect(100);
        assert_eq!(state.snapshot().label, "Reconnecting...");

        state.apply_event(
            &MonitorEvent::Reconnected {
                reason: ReasonCode::Manual,
            },
            1_000,
        );
        assert!(!state.snapshot().is_reconnecting);

        state.tick(3_999);
        assert!(state.snapshot().visible);
        state.tick(4_000);
        assert!(!state.snapshot().visible);
    }

    #[test]
    fn spinner_resets_when_reconnect_never_arrives() {
        let mut state = ReconnectPromptState::new();
        state.apply_event(&MonitorEvent::ConnectivityChanged { online: false }, 0);
        state.begin_manual_reconnect(0);

        state.tick(4_999);
        assert!(state.snapshot().is_reconnecting);
        state.tick(5_000);
        let snapshot = state.snapshot();
        assert!(!snapshot.is_reconnecting);
        assert!(snapshot.visible);
    }

    #[test]
    fn reload_resets_everything() {
        let mut state = ReconnectPromptState::new();
        state.apply_event(&MonitorEvent::ConnectivityChanged { online: false }, 0);
        state.apply_event(
            &MonitorEvent::ReloadRequested {
                reason: ReasonCode::StuckLoading,
            },
            10,
        );
        assert_eq!(state.snapshot(), ReconnectPromptState::new().snapshot());
    }
}
