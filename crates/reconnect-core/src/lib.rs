//! Core contract for the tab visibility reconnect monitor.
//!
//! This crate holds the signal/event protocol, the visibility state machine,
//! the per-reason single-flight gate, stuck-loading watch bookkeeping, and the
//! common error/channel abstractions. Nothing here owns a timer; the runtime
//! crate drives these types from its actor loop.

/// Signal/event channel primitives.
pub mod channel;
/// Stable service error types and reconnect failure taxonomy.
pub mod error;
/// Per-reason single-flight gate for debounced reconnect attempts.
pub mod gate;
/// Stuck-loading watch registry.
pub mod loading;
/// Runtime error classification and attempt outcome normalization.
pub mod normalization;
/// Visibility lifecycle state machine.
pub mod state_machine;
/// Monitor-facing protocol types (signals, events, config, snapshots).
pub mod types;

pub use channel::{EventStream, MonitorChannelError, MonitorChannels, SignalReceiver};
pub use error::{ReconnectError, ServiceError, ServiceErrorCategory, classify_http_status};
pub use gate::{ReasonGate, Ticket};
pub use loading::{LoadingWatch, WatchPlan};
pub use normalization::{is_network_error_message, normalize_attempt_outcome};
pub use state_machine::{Reactivation, VisibilityTracker};
pub use types::{
    IndicatorId, MonitorConfig, MonitorEvent, MonitorSignal, MonitorSnapshot, ReasonCode, Session,
    VisibilityState,
};
