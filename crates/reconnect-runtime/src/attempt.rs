//! One reconnect attempt against the external service.

use std::sync::Arc;

use reconnect_core::{ReasonCode, ReconnectError, ServiceError};
use reconnect_platform::SessionService;
use tracing::{debug, info};

/// Validate/refresh the session, then confirm the data path with a probe.
///
/// A missing session is not a failure: anonymous visitors still need a live
/// data path, so the probe runs either way.
pub(crate) async fn run_attempt(
    service: Arc<dyn SessionService>,
    reason: ReasonCode,
) -> Result<(), ReconnectError> {
    debug!(reason = %reason, "checking session");
    let session = service
        .get_session()
        .await
        .map_err(ReconnectError::SessionLookup)?;

    match session {
        Some(session) => {
            service
                .refresh_session()
                .await
                .map_err(ReconnectError::SessionRefresh)?;
            info!(reason = %reason, user_id = %session.user_id, "session refreshed");
        }
        None => debug!(reason = %reason, "no active session; skipping refresh"),
    }

    probe(service.as_ref())
        .await
        .map_err(ReconnectError::Probe)?;
    Ok(())
}

/// Lightweight connectivity check.
pub(crate) async fn probe(service: &dyn SessionService) -> Result<(), ServiceError> {
    service.probe().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use reconnect_platform::{InMemorySessionService, ServiceOp};

    fn service() -> (InMemorySessionService, Arc<dyn SessionService>) {
        let service = InMemorySessionService::signed_in("rider@example.com");
        let shared: Arc<dyn SessionService> = Arc::new(service.clone());
        (service, shared)
    }

    #[tokio::test]
    async fn refreshes_existing_session_then_probes() {
        let (fake, shared) = service();
        run_attempt(shared, ReasonCode::Manual)
            .await
            .expect("attempt should succeed");

        assert_eq!(fake.calls(ServiceOp::GetSession), 1);
        assert_eq!(fake.calls(ServiceOp::RefreshSession), 1);
        assert_eq!(fake.calls(ServiceOp::Probe), 1);
    }

    #[tokio::test]
    async fn probes_without_refresh_when_signed_out() {
        let (fake, shared) = service();
        fake.set_session(None);

        run_attempt(shared, ReasonCode::Visibility)
            .await
            .expect("anonymous attempt should succeed");

        assert_eq!(fake.calls(ServiceOp::RefreshSession), 0);
        assert_eq!(fake.calls(ServiceOp::Probe), 1);
    }

    #[tokio::test]
    async fn session_lookup_failure_aborts_before_refresh() {
        let (fake, shared) = service();
        fake.fail_next(ServiceOp::GetSession, ServiceError::network("offline"));

        let err = run_attempt(shared, ReasonCode::Manual)
            .await
            .expect_err("lookup failure must abort");

        assert_eq!(err.code(), "session_lookup_failed");
        assert_eq!(fake.calls(ServiceOp::RefreshSession), 0);
        assert_eq!(fake.calls(ServiceOp::Probe), 0);
    }

    #[tokio::test]
    async fn refresh_failure_aborts_before_probe() {
        let (fake, shared) = service();
        fake.fail_next_with_status(ServiceOp::RefreshSession, 401);

        let err = run_attempt(shared, ReasonCode::Manual)
            .await
            .expect_err("refresh failure must abort");

        assert_eq!(err.code(), "session_refresh_failed");
        assert_eq!(fake.calls(ServiceOp::Probe), 0);
    }

    #[tokio::test]
    async fn probe_failure_is_reported() {
        let (fake, shared) = service();
        fake.fail_next_with_status(ServiceOp::Probe, 503);

        let err = run_attempt(shared, ReasonCode::StuckLoading)
            .await
            .expect_err("probe failure must fail the attempt");
        assert_eq!(err.code(), "probe_failed");
    }
}
