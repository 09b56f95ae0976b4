use crate::{
    error::ReconnectError,
    types::{MonitorEvent, ReasonCode},
};

const NETWORK_ERROR_HINTS: [&str; 3] = ["network", "fetch", "connection"];

/// Whether an uncaught runtime error message looks like a network failure.
pub fn is_network_error_message(message: &str) -> bool {
    let lowered = message.to_ascii_lowercase();
    NETWORK_ERROR_HINTS
        .iter()
        .any(|hint| lowered.contains(hint))
}

/// Convert a settled reconnect attempt into the broadcast it should produce.
///
/// Failures produce nothing; they are only logged.
pub fn normalize_attempt_outcome(
    reason: ReasonCode,
    outcome: &Result<(), ReconnectError>,
) -> Option<MonitorEvent> {
    match outcome {
        Ok(()) => Some(MonitorEvent::Reconnected { reason }),
        Err(_) => None,
    }
}
