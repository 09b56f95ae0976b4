use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::ReasonCode;

/// Broad error category reported by the external session/data service.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ServiceErrorCategory {
    /// Session missing, expired, or rejected.
    Auth,
    /// Transport failure; the service could not be reached.
    Network,
    /// Service asked the client to slow down.
    RateLimited,
    /// Invalid input or monitor configuration.
    Config,
    /// Anything the client library could not classify.
    Internal,
}

/// Error payload returned by the external service client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Error)]
#[error("{category:?}:{code}: {message}")]
pub struct ServiceError {
    /// High-level error category.
    pub category: ServiceErrorCategory,
    /// Stable machine-readable error code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

impl ServiceError {
    pub fn new(
        category: ServiceErrorCategory,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            code: code.into(),
            message: message.into(),
        }
    }

    /// Shorthand for a transport failure.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorCategory::Network, "network_error", message)
    }
}

/// Why a reconnect attempt was abandoned.
///
/// These never cross the monitor boundary; they exist so failures are logged
/// with a stable code and the step that failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconnectError {
    #[error("session lookup failed: {0}")]
    SessionLookup(#[source] ServiceError),
    #[error("session refresh failed: {0}")]
    SessionRefresh(#[source] ServiceError),
    #[error("connectivity probe failed: {0}")]
    Probe(#[source] ServiceError),
    #[error("unexpected failure during {reason} reconnect: {message}")]
    Unexpected { reason: ReasonCode, message: String },
}

impl ReconnectError {
    /// Stable code for log fields.
    pub fn code(&self) -> &'static str {
        match self {
            Self::SessionLookup(_) => "session_lookup_failed",
            Self::SessionRefresh(_) => "session_refresh_failed",
            Self::Probe(_) => "probe_failed",
            Self::Unexpected { .. } => "unexpected_reconnect_failure",
        }
    }

    /// Underlying service error, when the failure came from the service.
    pub fn service_error(&self) -> Option<&ServiceError> {
        match self {
            Self::SessionLookup(err) | Self::SessionRefresh(err) | Self::Probe(err) => Some(err),
            Self::Unexpected { .. } => None,
        }
    }
}

/// Map HTTP status codes to service error categories.
pub fn classify_http_status(status: u16) -> ServiceErrorCategory {
    match status {
        401 | 403 => ServiceErrorCategory::Auth,
        408 | 429 => ServiceErrorCategory::RateLimited,
        400..=499 => ServiceErrorCategory::Config,
        500..=599 => ServiceErrorCategory::Network,
        _ => ServiceErrorCategory::Internal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_http_status_categories() {
        assert_eq!(classify_http_status(401), ServiceErrorCategory::Auth);
        assert_eq!(classify_http_status(429), ServiceErrorCategory::RateLimited);
        assert_eq!(classify_http_status(404), ServiceErrorCategory::Config);
        assert_eq!(classify_http_status(503), ServiceErrorCategory::Network);
        assert_eq!(classify_http_status(700), ServiceErrorCategory::Internal);
    }

    #[test]
    fn reconnect_errors_expose_stable_codes() {
        let cause = ServiceError::network("socket closed");
        assert_eq!(
            ReconnectError::SessionLookup(cause.clone()).code(),
            "session_lookup_failed"
        );
        assert_eq!(
            ReconnectError::SessionRefresh(cause.clone()).code(),
            "session_refresh_failed"
        );
        assert_eq!(ReconnectError::Probe(cause.clone()).code(), "probe_failed");

        let unexpected = ReconnectError::Unexpected {
            reason: ReasonCode::Manual,
            message: "task panicked".to_owned(),
        };
        assert_eq!(unexpected.code(), "unexpected_reconnect_failure");
        assert!(unexpected.service_error().is_none());
        assert_eq!(
            ReconnectError::Probe(cause.clone()).service_error(),
            Some(&cause)
        );
    }
}
