//! The monitor actor: sole owner of visibility, gate, and watch state.
//!
//! Timers run as spawned tasks that report back through `task_tx` with a
//! generation tag; the actor drops reports that no longer match its state.

use std::{collections::HashMap, sync::Arc, time::Duration};

use reconnect_core::{
    IndicatorId, LoadingWatch, MonitorConfig, MonitorEvent, MonitorSignal, MonitorSnapshot,
    Reactivation, ReasonCode, ReasonGate, ReconnectError, ServiceError, SignalReceiver, Ticket,
    VisibilityTracker, is_network_error_message, normalize_attempt_outcome,
};
use reconnect_platform::{PageHost, SessionService};
use tokio::{
    sync::{broadcast, mpsc, watch},
    time::{Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, trace, warn};
use uuid::Uuid;

use crate::attempt::{probe, run_attempt};

#[derive(Debug)]
enum TaskMessage {
    DebounceElapsed(Ticket),
    AttemptSettled {
        ticket: Ticket,
        outcome: Result<(), ReconnectError>,
    },
    ProbeSettled(Result<(), ServiceError>),
    OnlineGraceElapsed {
        generation: u64,
    },
    LoadingDeadline {
        id: IndicatorId,
        generation: u64,
    },
}

#[derive(Debug)]
struct PendingTimer {
    generation: u64,
    stop: CancellationToken,
}

pub(crate) struct MonitorRuntime {
    config: MonitorConfig,
    service: Arc<dyn SessionService>,
    host: Arc<dyn PageHost>,
    event_tx: broadcast::Sender<MonitorEvent>,
    signal_rx: SignalReceiver,
    task_tx: mpsc::UnboundedSender<TaskMessage>,
    task_rx: mpsc::UnboundedReceiver<TaskMessage>,
    snapshot_tx: watch::Sender<MonitorSnapshot>,
    shutdown: CancellationToken,
    tracker: VisibilityTracker,
    online: bool,
    gate: ReasonGate,
    debounce_timers: HashMap<ReasonCode, PendingTimer>,
    online_grace: Option<PendingTimer>,
    online_generation: u64,
    probe_in_flight: bool,
    loading: LoadingWatch,
    deadline_timers: HashMap<IndicatorId, PendingTimer>,
}

impl MonitorRuntime {
    pub(crate) fn new(
        config: MonitorConfig,
        service: Arc<dyn SessionService>,
        host: Arc<dyn PageHost>,
        event_tx: broadcast::Sender<MonitorEvent>,
        signal_rx: SignalReceiver,
        snapshot_tx: watch::Sender<MonitorSnapshot>,
    ) -> Self {
        let (task_tx, task_rx) = mpsc::unbounded_channel();
        Self {
            config,
            service,
            host,
            event_tx,
            signal_rx,
            task_tx,
            task_rx,
            snapshot_tx,
            shutdown: CancellationToken::new(),
            tracker: VisibilityTracker::new(Instant::now()),
            online: true,
            gate: ReasonGate::new(),
            debounce_timers: HashMap::new(),
            online_grace: None,
            online_generation: 0,
            probe_in_flight: false,
            loading: LoadingWatch::new(),
            deadline_timers: HashMap::new(),
        }
    }

    pub(crate) async fn run(mut self) {
        let period = self.config.loading_scan_interval();
        let mut scan = tokio::time::interval_at(Instant::now() + period, period);
        scan.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            inactivity_threshold_ms = self.config.inactivity_threshold_ms,
            max_loading_ms = self.config.max_loading_ms,
            "reconnect monitor started"
        );

        loop {
            tokio::select! {
                signal = self.signal_rx.recv() => {
                    let Some(signal) = signal else { break };
                    self.handle_signal(signal);
                }
                Some(message) = self.task_rx.recv() => self.handle_task_message(message),
                _ = scan.tick() => {
                    if self.tracker.is_visible() {
                        self.scan_loading();
                    }
                }
            }
            self.publish_snapshot();
        }

        self.shutdown.cancel();
        info!("reconnect monitor stopped");
    }

    fn handle_signal(&mut self, signal: MonitorSignal) {
        trace!(?signal, "monitor signal");
        match signal {
            MonitorSignal::VisibilityChanged { visible: true } => self.on_visible("visibility"),
            MonitorSignal::VisibilityChanged { visible: false } => self.on_hidden("visibility"),
            MonitorSignal::Focus => self.on_visible("focus"),
            MonitorSignal::Blur => self.on_hidden("blur"),
            MonitorSignal::Online => self.on_online(),
            MonitorSignal::Offline => self.on_offline(),
            MonitorSignal::RuntimeError { message } => self.on_runtime_error(message),
            MonitorSignal::ForceReconnect => {
                info!("manual reconnect requested");
                self.trigger_reconnect(ReasonCode::Manual);
            }
            MonitorSignal::ScanLoading => self.scan_loading(),
        }
    }

    fn handle_task_message(&mut self, message: TaskMessage) {
        match message {
            TaskMessage::DebounceElapsed(ticket) => self.on_debounce_elapsed(ticket),
            TaskMessage::AttemptSettled { ticket, outcome } => {
                self.on_attempt_settled(ticket, outcome)
            }
            TaskMessage::ProbeSettled(outcome) => self.on_probe_settled(outcome),
            TaskMessage::OnlineGraceElapsed { generation } => {
                if take_timer(&mut self.online_grace, generation) {
                    self.trigger_reconnect(ReasonCode::Online);
                }
            }
            TaskMessage::LoadingDeadline { id, generation } => {
                self.on_loading_deadline(id, generation)
            }
        }
    }

    fn on_hidden(&mut self, source: &str) {
        let transitioned = self.tracker.on_hidden(Instant::now());

        for ticket in self.gate.cancel_scheduled() {
            if let Some(timer) = self.debounce_timers.remove(&ticket.reason) {
                timer.stop.cancel();
            }
            debug!(reason = %ticket.reason, "cancelled scheduled reconnect; page hidden");

            if ticket.reason == ReasonCode::StuckLoading {
                for id in self.loading.release_fired() {
                    debug!(indicator = %id, "stuck indicator will be re-armed on next scan");
                }
            }
        }
        if let Some(timer) = self.online_grace.take() {
            timer.stop.cancel();
        }

        if transitioned {
            info!(source, "page hidden");
            self.emit(MonitorEvent::VisibilityChanged {
                visible: false,
                reason: source.to_owned(),
            });
        }
    }

    fn on_visible(&mut self, source: &str) {
        let decision = self
            .tracker
            .on_visible(Instant::now(), self.config.inactivity_threshold());

        match decision {
            Reactivation::AlreadyVisible => return,
            Reactivation::Reconnect { elapsed } => {
                info!(
                    source,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "page visible after long absence"
                );
                self.emit_visible(source);
                self.trigger_reconnect(ReasonCode::Visibility);
            }
            Reactivation::Probe { elapsed } => {
                debug!(
                    source,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "page visible after short absence; probing"
                );
                self.emit_visible(source);
                self.spawn_probe();
            }
        }

        self.scan_loading();
    }

    fn emit_visible(&self, source: &str) {
        self.emit(MonitorEvent::VisibilityChanged {
            visible: true,
            reason: source.to_owned(),
        });
    }

    fn on_online(&mut self) {
        info!("network online");
        self.online = true;
        self.emit(MonitorEvent::ConnectivityChanged { online: true });

        if self.online_grace.is_some() {
            return;
        }
        self.online_generation = self.online_generation.wrapping_add(1);
        let generation = self.online_generation;
        let stop = self.spawn_timer(
            self.config.online_reconnect_delay(),
            TaskMessage::OnlineGraceElapsed { generation },
        );
        self.online_grace = Some(PendingTimer { generation, stop });
    }

    fn on_offline(&mut self) {
        warn!("network offline");
        self.online = false;
        if let Some(timer) = self.online_grace.take() {
            timer.stop.cancel();
        }
        self.emit(MonitorEvent::ConnectivityChanged { online: false });
    }

    fn on_runtime_error(&mut self, message: String) {
        if is_network_error_message(&message) {
            warn!(message = %message, "runtime error looks like a network failure");
            self.emit(MonitorEvent::NetworkErrorObserved { message });
        } else {
            trace!(message = %message, "ignoring non-network runtime error");
        }
    }

    fn trigger_reconnect(&mut self, reason: ReasonCode) {
        let Some(ticket) = self.gate.try_schedule(reason) else {
            debug!(reason = %reason, "reconnect already pending; coalescing");
            return;
        };

        info!(reason = %reason, debounce_ms = self.config.debounce_ms, "scheduling reconnect");
        let stop = self.spawn_timer(self.config.debounce(), TaskMessage::DebounceElapsed(ticket));
        self.debounce_timers.insert(
            reason,
            PendingTimer {
                generation: ticket.generation,
                stop,
            },
        );
    }

    fn on_debounce_elapsed(&mut self, ticket: Ticket) {
        if self
            .debounce_timers
            .get(&ticket.reason)
            .is_some_and(|timer| timer.generation == ticket.generation)
        {
            self.debounce_timers.remove(&ticket.reason);
        }

        if !self.gate.begin(ticket) {
            debug!(reason = %ticket.reason, "dropping stale debounce expiry");
            return;
        }

        let attempt_id = Uuid::new_v4();
        let span = info_span!("reconnect_attempt", %attempt_id, reason = %ticket.reason);
        let service = Arc::clone(&self.service);
        let task_tx = self.task_tx.clone();

        tokio::spawn(
            async move {
                info!("reconnect attempt started");
                let outcome = match tokio::spawn(run_attempt(service, ticket.reason)).await {
                    Ok(outcome) => outcome,
                    Err(err) => Err(ReconnectError::Unexpected {
                        reason: ticket.reason,
                        message: err.to_string(),
                    }),
                };
                let _ = task_tx.send(TaskMessage::AttemptSettled { ticket, outcome });
            }
            .instrument(span),
        );
    }

    fn on_attempt_settled(&mut self, ticket: Ticket, outcome: Result<(), ReconnectError>) {
        self.gate.finish(ticket);
        let reason = ticket.reason;

        match &outcome {
            Ok(()) => info!(reason = %reason, "reconnected"),
            Err(err) => warn!(
                reason = %reason,
                code = err.code(),
                category = ?err.service_error().map(|cause| cause.category),
                error = %err,
                "reconnect attempt failed"
            ),
        }

        if let Some(event) = normalize_attempt_outcome(reason, &outcome) {
            self.emit(event);
            self.emit(MonitorEvent::VisibilityChanged {
                visible: true,
                reason: reason.as_str().to_owned(),
            });
        }

        if reason.forces_reload() {
            warn!(reason = %reason, "reloading page to clear stuck loading state");
            self.host.reload();
            self.emit(MonitorEvent::ReloadRequested { reason });
            for id in self.loading.clear() {
                if let Some(timer) = self.deadline_timers.remove(&id) {
                    timer.stop.cancel();
                }
            }
        }
    }

    fn spawn_probe(&mut self) {
        if self.probe_in_flight {
            debug!("probe already in flight");
            return;
        }
        self.probe_in_flight = true;

        let service = Arc::clone(&self.service);
        let task_tx = self.task_tx.clone();
        tokio::spawn(async move {
            let outcome = probe(service.as_ref()).await;
            let _ = task_tx.send(TaskMessage::ProbeSettled(outcome));
        });
    }

    fn on_probe_settled(&mut self, outcome: Result<(), ServiceError>) {
        self.probe_in_flight = false;
        match outcome {
            Ok(()) => debug!("connectivity probe succeeded"),
            Err(err) => {
                warn!(error = %err, "connectivity probe failed");
                if self.tracker.is_visible() {
                    self.trigger_reconnect(ReasonCode::Visibility);
                }
            }
        }
    }

    fn scan_loading(&mut self) {
        let present = self.host.loading_indicators();
        let plan = self.loading.reconcile(&present);

        for id in plan.disarm {
            if let Some(timer) = self.deadline_timers.remove(&id) {
                timer.stop.cancel();
            }
            trace!(indicator = %id, "loading indicator resolved");
        }

        for (id, generation) in plan.arm {
            trace!(indicator = %id, "watching loading indicator");
            let stop = self.spawn_timer(
                self.config.max_loading(),
                TaskMessage::LoadingDeadline {
                    id: id.clone(),
                    generation,
                },
            );
            self.deadline_timers
                .insert(id, PendingTimer { generation, stop });
        }
    }

    fn on_loading_deadline(&mut self, id: IndicatorId, generation: u64) {
        if self
            .deadline_timers
            .get(&id)
            .is_some_and(|timer| timer.generation == generation)
        {
            self.deadline_timers.remove(&id);
        }

        if !self.loading.expire(&id, generation) {
            return;
        }

        if !self.host.loading_indicators().contains(&id) {
            trace!(indicator = %id, "loading indicator vanished before deadline check");
            self.loading.forget(&id);
            return;
        }

        warn!(
            indicator = %id,
            max_loading_ms = self.config.max_loading_ms,
            "stuck loading indicator detected"
        );
        self.emit(MonitorEvent::StuckLoadingDetected { indicator: id });
        self.trigger_reconnect(ReasonCode::StuckLoading);
    }

    /// One-shot timer that reports `message` unless cancelled first.
    fn spawn_timer(&self, delay: Duration, message: TaskMessage) -> CancellationToken {
        let stop = self.shutdown.child_token();
        let stop_child = stop.clone();
        let task_tx = self.task_tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = stop_child.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    let _ = task_tx.send(message);
                }
            }
        });
        stop
    }

    fn emit(&self, event: MonitorEvent) {
        let _ = self.event_tx.send(event);
    }

    fn publish_snapshot(&self) {
        let snapshot = MonitorSnapshot {
            visibility: self.tracker.state(),
            online: self.online,
            pending_reasons: self.gate.pending(),
            watched_indicators: self.loading.len(),
            stuck_detected: self.loading.any_fired(),
        };
        self.snapshot_tx.send_if_modified(|current| {
            if *current == snapshot {
                return false;
            }
            *current = snapshot;
            true
        });
    }
}

fn take_timer(slot: &mut Option<PendingTimer>, generation: u64) -> bool {
    match slot {
        Some(timer) if timer.generation == generation => {
            *slot = None;
            true
        }
        _ => false,
    }
}
