//! Capability seams between the monitor and the world around it.
//!
//! The monitor never touches a browser or a service SDK directly. The page
//! host enumerates loading indicators and reloads the page, the session
//! service wraps the hosted backend client, and the lifecycle listener is the
//! callback surface a platform adapter drives from real page events.

use std::{
    collections::{BTreeSet, HashMap, VecDeque},
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use async_trait::async_trait;
use reconnect_core::{
    IndicatorId, ServiceError, ServiceErrorCategory, Session, classify_http_status,
};

/// Session and data-path primitives of the external service.
///
/// Implementations are shared process-wide; every method must be safe to call
/// concurrently. Refreshing an already fresh session must be harmless.
#[async_trait]
pub trait SessionService: Send + Sync + 'static {
    /// Current session, or `None` when nobody is signed in.
    async fn get_session(&self) -> Result<Option<Session>, ServiceError>;

    /// Refresh the current session token.
    async fn refresh_session(&self) -> Result<(), ServiceError>;

    /// Cheapest possible read to confirm the data path is alive.
    async fn probe(&self) -> Result<(), ServiceError>;
}

/// Page-level capabilities the monitor needs from its host.
pub trait PageHost: Send + Sync + 'static {
    /// Loading indicators currently rendered, in any order.
    fn loading_indicators(&self) -> Vec<IndicatorId>;

    /// Unconditionally reload the whole page.
    fn reload(&self);
}

/// Callbacks a platform adapter invokes from page lifecycle events.
pub trait LifecycleListener {
    fn on_visibility_change(&self, visible: bool);
    fn on_focus(&self);
    fn on_blur(&self);
    fn on_online(&self);
    fn on_offline(&self);
    fn on_error(&self, message: &str);
}

/// Service operations, used to script and count calls on the in-memory service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceOp {
    GetSession,
    RefreshSession,
    Probe,
}

#[derive(Debug, Default)]
struct ServiceState {
    session: Option<Session>,
    failures: HashMap<ServiceOp, VecDeque<ServiceError>>,
    calls: HashMap<ServiceOp, usize>,
    latency: Option<Duration>,
}

/// Scriptable in-process stand-in for the hosted backend client.
#[derive(Clone, Debug, Default)]
pub struct InMemorySessionService {
    state: Arc<Mutex<ServiceState>>,
}

impl InMemorySessionService {
    /// Service with an active session for `user_id`.
    pub fn signed_in(user_id: impl Into<String>) -> Self {
        let service = Self::default();
        service.set_session(Some(Session {
            user_id: user_id.into(),
        }));
        service
    }

    pub fn set_session(&self, session: Option<Session>) {
        self.lock().session = session;
    }

    /// Delay every call by `latency`, to keep attempts in flight in tests.
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.lock().latency = latency;
    }

    /// Queue a failure returned by the next call of `op`.
    pub fn fail_next(&self, op: ServiceOp, error: ServiceError) {
        self.lock().failures.entry(op).or_default().push_back(error);
    }

    /// Queue a failure shaped like an HTTP error response.
    pub fn fail_next_with_status(&self, op: ServiceOp, status: u16) {
        self.fail_next(
            op,
            ServiceError::new(
                classify_http_status(status),
                "http_error",
                format!("service responded with status {status}"),
            ),
        );
    }

    /// Number of times `op` was called.
    pub fn calls(&self, op: ServiceOp) -> usize {
        self.lock().calls.get(&op).copied().unwrap_or(0)
    }

    async fn call(&self, op: ServiceOp) -> Result<Option<Session>, ServiceError> {
        let latency = {
            let mut state = self.lock();
            *state.calls.entry(op).or_default() += 1;
            state.latency
        };

        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.lock();
        if let Some(error) = state.failures.get_mut(&op).and_then(VecDeque::pop_front) {
            return Err(error);
        }

        match op {
            ServiceOp::RefreshSession if state.session.is_none() => Err(ServiceError::new(
                ServiceErrorCategory::Auth,
                "session_missing",
                "no session to refresh",
            )),
            _ => Ok(state.session.clone()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ServiceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl SessionService for InMemorySessionService {
    async fn get_session(&self) -> Result<Option<Session>, ServiceError> {
        self.call(ServiceOp::GetSession).await
    }

    async fn refresh_session(&self) -> Result<(), ServiceError> {
        self.call(ServiceOp::RefreshSession).await.map(|_| ())
    }

    async fn probe(&self) -> Result<(), ServiceError> {
        self.call(ServiceOp::Probe).await.map(|_| ())
    }
}

#[derive(Debug, Default)]
struct PageState {
    indicators: BTreeSet<IndicatorId>,
    reloads: usize,
}

/// In-process page host with a mutable set of rendered loading indicators.
#[derive(Clone, Debug, Default)]
pub struct InMemoryPageHost {
    state: Arc<Mutex<PageState>>,
}

impl InMemoryPageHost {
    /// Render a loading indicator.
    pub fn show_loading(&self, id: impl Into<String>) {
        self.lock().indicators.insert(IndicatorId::new(id));
    }

    /// Remove a loading indicator, as when its fetch resolves.
    pub fn hide_loading(&self, id: &str) {
        self.lock().indicators.remove(&IndicatorId::new(id));
    }

    pub fn reloads(&self) -> usize {
        self.lock().reloads
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PageState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PageHost for InMemoryPageHost {
    fn loading_indicators(&self) -> Vec<IndicatorId> {
        self.lock().indicators.iter().cloned().collect()
    }

    fn reload(&self) {
        let mut state = self.lock();
        state.reloads += 1;
        // A reload wipes the rendered page.
        state.indicators.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn signed_in_service_returns_session_and_counts_calls() {
        let service = InMemorySessionService::signed_in("rider@example.com");

        let session = service.get_session().await.expect("get session");
        assert_eq!(
            session.map(|session| session.user_id).as_deref(),
            Some("rider@example.com")
        );
        service.refresh_session().await.expect("refresh");
        service.probe().await.expect("probe");

        assert_eq!(service.calls(ServiceOp::GetSession), 1);
        assert_eq!(service.calls(ServiceOp::RefreshSession), 1);
        assert_eq!(service.calls(ServiceOp::Probe), 1);
    }

    #[tokio::test]
    async fn queued_failures_are_returned_once_in_order() {
        let service = InMemorySessionService::default();
        service.fail_next(ServiceOp::Probe, ServiceError::network("first"));
        service.fail_next_with_status(ServiceOp::Probe, 503);

        let first = service.probe().await.expect_err("first probe fails");
        assert_eq!(first.message, "first");
        let second = service.probe().await.expect_err("second probe fails");
        assert_eq!(second.category, ServiceErrorCategory::Network);
        assert_eq!(second.code, "http_error");
        service.probe().await.expect("third probe succeeds");
    }

    #[tokio::test]
    async fn refresh_without_session_is_an_auth_error() {
        let service = InMemorySessionService::default();
        assert_eq!(service.get_session().await.expect("get session"), None);
        let err = service
            .refresh_session()
            .await
            .expect_err("refresh needs a session");
        assert_eq!(err.category, ServiceErrorCategory::Auth);
    }

    #[tokio::test(start_paused = true)]
    async fn latency_delays_calls() {
        let service = InMemorySessionService::signed_in("rider@example.com");
        service.set_latency(Some(Duration::from_millis(250)));

        let started = tokio::time::Instant::now();
        service.probe().await.expect("probe");
        assert!(started.elapsed() >= Duration::from_millis(250));
    }

    #[test]
    fn page_host_tracks_indicators_and_reloads() {
        let host = InMemoryPageHost::default();
        host.show_loading("listings");
        host.show_loading("seller-card");
        host.hide_loading("listings");

        assert_eq!(
            host.loading_indicators(),
            vec![IndicatorId::new("seller-card")]
        );

        host.reload();
        assert_eq!(host.reloads(), 1);
        assert!(host.loading_indicators().is_empty());
    }
}
