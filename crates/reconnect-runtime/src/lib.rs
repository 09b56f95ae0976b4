//! Tokio runtime for the tab visibility reconnect monitor.
//!
//! [`spawn_monitor`] starts one actor that owns all monitor state and returns
//! a cloneable [`MonitorHandle`]. Platform adapters feed page lifecycle
//! signals through the handle; page components subscribe to its broadcast
//! events to decide when to re-fetch their data.

mod actor;
mod attempt;

use std::sync::Arc;

use reconnect_core::{
    EventStream, MonitorChannelError, MonitorChannels, MonitorConfig, MonitorSignal,
    MonitorSnapshot, ServiceError, VisibilityState,
};
use reconnect_platform::{LifecycleListener, PageHost, SessionService};
use tokio::sync::watch;
use tracing::debug;

use crate::actor::MonitorRuntime;

const EVENT_BUFFER: usize = 64;

/// Cloneable handle to a running monitor.
///
/// The monitor stops once every handle has been dropped.
#[derive(Clone, Debug)]
pub struct MonitorHandle {
    channels: MonitorChannels,
    snapshot_rx: watch::Receiver<MonitorSnapshot>,
}

impl MonitorHandle {
    /// Feed one lifecycle signal to the monitor.
    pub fn send(&self, signal: MonitorSignal) -> Result<(), MonitorChannelError> {
        self.channels.send_signal(signal)
    }

    /// Request a reconnect regardless of visibility or connectivity.
    pub fn force_reconnect(&self) -> Result<(), MonitorChannelError> {
        self.send(MonitorSignal::ForceReconnect)
    }

    /// Subscribe to broadcast notifications.
    pub fn subscribe(&self) -> EventStream {
        self.channels.subscribe()
    }

    /// Latest published monitor state.
    pub fn snapshot(&self) -> MonitorSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Watch receiver for monitor state changes.
    pub fn snapshots(&self) -> watch::Receiver<MonitorSnapshot> {
        self.snapshot_rx.clone()
    }

    pub fn is_visible(&self) -> bool {
        self.snapshot_rx.borrow().visibility == VisibilityState::Visible
    }

    fn forward(&self, signal: MonitorSignal) {
        if let Err(err) = self.send(signal) {
            debug!(error = %err, "dropping lifecycle signal; monitor stopped");
        }
    }
}

impl LifecycleListener for MonitorHandle {
    fn on_visibility_change(&self, visible: bool) {
        self.forward(MonitorSignal::VisibilityChanged { visible });
    }

    fn on_focus(&self) {
        self.forward(MonitorSignal::Focus);
    }

    fn on_blur(&self) {
        self.forward(MonitorSignal::Blur);
    }

    fn on_online(&self) {
        self.forward(MonitorSignal::Online);
    }

    fn on_offline(&self) {
        self.forward(MonitorSignal::Offline);
    }

    fn on_error(&self, message: &str) {
        self.forward(MonitorSignal::RuntimeError {
            message: message.to_owned(),
        });
    }
}

/// Validate `config` and start the monitor on the current tokio runtime.
pub fn spawn_monitor(
    config: MonitorConfig,
    service: Arc<dyn SessionService>,
    host: Arc<dyn PageHost>,
) -> Result<MonitorHandle, ServiceError> {
    config.validate()?;

    let (channels, signal_rx) = MonitorChannels::new(EVENT_BUFFER);
    let (snapshot_tx, snapshot_rx) = watch::channel(MonitorSnapshot::default());
    let runtime = MonitorRuntime::new(
        config,
        service,
        host,
        channels.event_sender(),
        signal_rx,
        snapshot_tx,
    );
    tokio::spawn(async move {
        runtime.run().await;
    });

    Ok(MonitorHandle {
        channels,
        snapshot_rx,
    })
}
