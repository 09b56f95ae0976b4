use thiserror::Error;
use tokio::sync::{broadcast, mpsc};

use crate::types::{MonitorEvent, MonitorSignal};

/// Broadcast event stream type used by page-level subscribers.
pub type EventStream = broadcast::Receiver<MonitorEvent>;

/// Receiving side of the signal queue, owned by the monitor actor.
pub type SignalReceiver = mpsc::UnboundedReceiver<MonitorSignal>;

/// Errors returned by monitor channel operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MonitorChannelError {
    /// The monitor actor has shut down.
    #[error("signal channel is closed")]
    SignalChannelClosed,
}

/// Signal/event channel pair shared by the monitor actor and its handles.
///
/// Signals use an unbounded queue because platform callbacks fire from
/// synchronous event handlers and must never block or be dropped.
#[derive(Clone, Debug)]
pub struct MonitorChannels {
    signal_tx: mpsc::UnboundedSender<MonitorSignal>,
    event_tx: broadcast::Sender<MonitorEvent>,
}

impl MonitorChannels {
    /// Create a new channel set and return it with the signal receiver.
    pub fn new(event_buffer: usize) -> (Self, SignalReceiver) {
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let (event_tx, _) = broadcast::channel(event_buffer.max(1));

        (
            Self {
                signal_tx,
                event_tx,
            },
            signal_rx,
        )
    }

    /// Enqueue one signal for the monitor.
    pub fn send_signal(&self, signal: MonitorSignal) -> Result<(), MonitorChannelError> {
        self.signal_tx
            .send(signal)
            .map_err(|_| MonitorChannelError::SignalChannelClosed)
    }

    /// Clone the event sender.
    pub fn event_sender(&self) -> broadcast::Sender<MonitorEvent> {
        self.event_tx.clone()
    }

    /// Subscribe to broadcast notifications.
    pub fn subscribe(&self) -> EventStream {
        self.event_tx.subscribe()
    }

    /// Emit an event to all subscribers.
    ///
    /// Emission is best-effort; having no subscribers is not an error.
    pub fn emit(&self, event: MonitorEvent) {
        let _ = self.event_tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ReasonCode;

    #[tokio::test]
    async fn delivers_signals_to_receiver() {
        let (channels, mut rx) = MonitorChannels::new(8);
        channels
            .send_signal(MonitorSignal::VisibilityChanged { visible: false })
            .expect("signal send should work");

        let signal = rx.recv().await.expect("receiver should have a signal");
        assert_eq!(signal, MonitorSignal::VisibilityChanged { visible: false });
    }

    #[tokio::test]
    async fn reports_closed_signal_channel() {
        let (channels, rx) = MonitorChannels::new(8);
        drop(rx);
        let err = channels
            .send_signal(MonitorSignal::ForceReconnect)
            .expect_err("send must fail once the actor is gone");
        assert_eq!(err, MonitorChannelError::SignalChannelClosed);
    }

    #[tokio::test]
    async fn fans_out_events_to_subscribers() {
        let (channels, _rx) = MonitorChannels::new(16);
        let mut a = channels.subscribe();
        let mut b = channels.subscribe();

        channels.emit(MonitorEvent::Reconnected {
            reason: ReasonCode::Visibility,
        });

        let event_a = a.recv().await.expect("subscriber a should receive event");
        let event_b = b.recv().await.expect("subscriber b should receive event");
        assert_eq!(event_a, event_b);
    }

    #[test]
    fn emit_without_subscribers_is_harmless() {
        let (channels, _rx) = MonitorChannels::new(1);
        channels.emit(MonitorEvent::ConnectivityChanged { online: false });
    }
}
