use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};

use crate::error::{ServiceError, ServiceErrorCategory};

const DEFAULT_INACTIVITY_THRESHOLD_MS: u64 = 3_000;
const DEFAULT_DEBOUNCE_MS: u64 = 500;
const DEFAULT_MAX_LOADING_MS: u64 = 8_000;
const DEFAULT_LOADING_SCAN_INTERVAL_MS: u64 = 2_000;
const DEFAULT_ONLINE_RECONNECT_DELAY_MS: u64 = 1_000;

/// Page visibility as seen by the monitor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum VisibilityState {
    /// Page is in the foreground (visible or focused).
    #[default]
    Visible,
    /// Page is backgrounded, minimized, or lost focus.
    Hidden,
}

/// Why a reconnect was requested. Also the de-duplication key.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum ReasonCode {
    /// Page came back after an absence longer than the inactivity threshold.
    Visibility,
    /// A loading indicator outlived the maximum loading duration.
    StuckLoading,
    /// Explicit request from the UI.
    Manual,
    /// Browser reported the network came back.
    Online,
}

impl ReasonCode {
    /// Stable string form used in logs and broadcast payloads.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Visibility => "visibility",
            Self::StuckLoading => "stuck-loading",
            Self::Manual => "manual",
            Self::Online => "online",
        }
    }

    /// Whether a settled attempt under this reason ends in a full page reload.
    pub fn forces_reload(self) -> bool {
        matches!(self, Self::StuckLoading)
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque identifier of a rendered loading indicator, assigned by the page host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndicatorId(pub String);

impl IndicatorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IndicatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Minimal view of an authenticated session held by the external service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    /// Account the session belongs to.
    pub user_id: String,
}

/// Lifecycle and connectivity input consumed by the monitor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum MonitorSignal {
    /// Document visibility changed.
    VisibilityChanged {
        /// `true` when the document became visible.
        visible: bool,
    },
    /// Window gained focus. Treated as becoming visible.
    Focus,
    /// Window lost focus. Treated as becoming hidden.
    Blur,
    /// Browser reports network connectivity.
    Online,
    /// Browser reports loss of network connectivity.
    Offline,
    /// Uncaught runtime error surfaced by the host page.
    RuntimeError {
        /// Raw error message; inspected for network-failure hints.
        message: String,
    },
    /// Manual reconnect request from the UI.
    ForceReconnect,
    /// Ask the monitor to reconcile loading indicators now.
    ScanLoading,
}

/// Broadcast notification produced by the monitor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MonitorEvent {
    /// Page visibility flipped, or a reconnect confirmed the page is live again.
    VisibilityChanged {
        visible: bool,
        /// What caused the notification (`"visibility"`, `"focus"`, a reason code, ...).
        reason: String,
    },
    /// A reconnect attempt completed successfully. Listeners should re-fetch.
    Reconnected { reason: ReasonCode },
    /// Browser connectivity flipped.
    ConnectivityChanged { online: bool },
    /// A runtime error looked like a network failure.
    NetworkErrorObserved { message: String },
    /// A loading indicator outlived its deadline.
    StuckLoadingDetected { indicator: IndicatorId },
    /// The monitor asked the host to reload the page.
    ReloadRequested { reason: ReasonCode },
}

/// Timing knobs for the monitor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Absence longer than this triggers a full reconnect on reactivation.
    pub inactivity_threshold_ms: u64,
    /// Delay used to coalesce bursts of reconnect requests per reason.
    pub debounce_ms: u64,
    /// Loading indicators older than this are considered stuck.
    pub max_loading_ms: u64,
    /// How often loading indicators are reconciled while visible.
    pub loading_scan_interval_ms: u64,
    /// Grace period between coming back online and reconnecting.
    pub online_reconnect_delay_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            inactivity_threshold_ms: DEFAULT_INACTIVITY_THRESHOLD_MS,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            max_loading_ms: DEFAULT_MAX_LOADING_MS,
            loading_scan_interval_ms: DEFAULT_LOADING_SCAN_INTERVAL_MS,
            online_reconnect_delay_ms: DEFAULT_ONLINE_RECONNECT_DELAY_MS,
        }
    }
}

impl MonitorConfig {
    pub fn inactivity_threshold(&self) -> Duration {
        Duration::from_millis(self.inactivity_threshold_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn max_loading(&self) -> Duration {
        Duration::from_millis(self.max_loading_ms)
    }

    pub fn loading_scan_interval(&self) -> Duration {
        Duration::from_millis(self.loading_scan_interval_ms)
    }

    pub fn online_reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.online_reconnect_delay_ms)
    }

    /// Reject values that would turn timers into busy loops.
    pub fn validate(&self) -> Result<(), ServiceError> {
        let checks = [
            ("debounce_ms", self.debounce_ms),
            ("max_loading_ms", self.max_loading_ms),
            ("loading_scan_interval_ms", self.loading_scan_interval_ms),
        ];

        for (field, value) in checks {
            if value == 0 {
                return Err(ServiceError::new(
                    ServiceErrorCategory::Config,
                    "invalid_monitor_config",
                    format!("{field} must be greater than 0"),
                ));
            }
        }

        Ok(())
    }
}

/// Point-in-time view of monitor state, published after every actor step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MonitorSnapshot {
    pub visibility: VisibilityState,
    pub online: bool,
    /// Reasons with a scheduled or running reconnect, sorted.
    pub pending_reasons: Vec<ReasonCode>,
    /// Loading indicators currently under watch.
    pub watched_indicators: usize,
    /// Whether any watched indicator has been declared stuck.
    pub stuck_detected: bool,
}

impl Default for MonitorSnapshot {
    fn default() -> Self {
        Self {
            visibility: VisibilityState::Visible,
            online: true,
            pending_reasons: Vec::new(),
            watched_indicators: 0,
            stuck_detected: false,
        }
    }
}
