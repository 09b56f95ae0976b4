mod config;
mod logging;
mod prompt;

use std::{sync::Arc, time::Duration};

use config::SmokeConfig;
use prompt::{PromptSnapshot, ReconnectPromptState};
use reconnect_core::{
    MonitorEvent, MonitorSignal, ReasonCode, ServiceError, ServiceErrorCategory,
};
use reconnect_platform::{
    InMemoryPageHost, InMemorySessionService, LifecycleListener, ServiceOp,
};
use reconnect_runtime::spawn_monitor;
use tokio::{
    sync::{broadcast::error::RecvError, mpsc},
    time::Instant,
};
use tracing::{error, info, warn};

const SETTLE_MARGIN: Duration = Duration::from_millis(500);

/// What happened during one scripted run.
#[derive(Debug)]
struct ScenarioReport {
    events: Vec<MonitorEvent>,
    prompt: PromptSnapshot,
    session_checks: usize,
    probes: usize,
    reloads: usize,
}

impl ScenarioReport {
    fn reconnects(&self) -> Vec<ReasonCode> {
        self.events
            .iter()
            .filter_map(|event| match event {
                MonitorEvent::Reconnected { reason } => Some(*reason),
                _ => None,
            })
            .collect()
    }
}

#[tokio::main]
async fn main() {
    logging::init();

    let config = match SmokeConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "invalid configuration");
            eprintln!("Invalid configuration: {err}");
            std::process::exit(2);
        }
    };
    info!(monitor = ?config.monitor, "starting reconnect smoke run");

    match run_scenario(&config).await {
        Ok(report) => {
            let summary = serde_json::json!({
                "summary": {
                    "events": report.events.len(),
                    "reconnects": report.reconnects(),
                    "session_checks": report.session_checks,
                    "probes": report.probes,
                    "reloads": report.reloads,
                    "prompt_visible": report.prompt.visible,
                    "prompt_label": report.prompt.label,
                }
            });
            println!("{summary}");
        }
        Err(err) => {
            error!(error = %err, "smoke run failed");
            eprintln!("Smoke run failed: {err}");
            std::process::exit(1);
        }
    }
}

async fn run_scenario(config: &SmokeConfig) -> Result<ScenarioReport, ServiceError> {
    let service = match &config.signed_in_user {
        Some(user) => InMemorySessionService::signed_in(user),
        None => InMemorySessionService::default(),
    };
    let host = InMemoryPageHost::default();
    let monitor = spawn_monitor(
        config.monitor,
        Arc::new(service.clone()),
        Arc::new(host.clone()),
    )?;

    let mut events = monitor.subscribe();
    let (press_tx, mut press_rx) = mpsc::unbounded_channel::<()>();
    let print_events = config.print_events;
    let started = Instant::now();
    let collector = tokio::spawn(async move {
        let mut seen = Vec::new();
        let mut prompt = ReconnectPromptState::new();
        loop {
            let received = tokio::select! {
                Some(()) = press_rx.recv() => {
                    prompt.begin_manual_reconnect(started.elapsed().as_millis() as u64);
                    continue;
                }
                received = events.recv() => received,
            };
            match received {
                Ok(event) => {
                    let now_ms = started.elapsed().as_millis() as u64;
                    prompt.tick(now_ms);
                    prompt.apply_event(&event, now_ms);
                    if print_events {
                        match serde_json::to_string(&event) {
                            Ok(line) => println!("{line}"),
                            Err(err) => warn!(error = %err, "failed to encode event"),
                        }
                    }
                    seen.push(event);
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event subscriber lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
        prompt.tick(started.elapsed().as_millis() as u64);
        (seen, prompt.snapshot())
    });

    let timings = config.monitor;
    let settle = timings.debounce() + SETTLE_MARGIN;

    info!("step: short absence");
    monitor.on_visibility_change(false);
    tokio::time::sleep(timings.inactivity_threshold() / 3).await;
    monitor.on_visibility_change(true);
    tokio::time::sleep(settle).await;

    info!("step: long absence");
    monitor.on_blur();
    tokio::time::sleep(timings.inactivity_threshold() + Duration::from_secs(1)).await;
    monitor.on_focus();
    tokio::time::sleep(settle).await;

    info!("step: network drop");
    monitor.on_offline();
    monitor.on_error("TypeError: Failed to fetch");
    tokio::time::sleep(Duration::from_millis(200)).await;
    monitor.on_online();
    tokio::time::sleep(timings.online_reconnect_delay() + settle).await;

    info!("step: manual reconnect");
    let _ = press_tx.send(());
    monitor.force_reconnect().map_err(channel_closed)?;
    tokio::time::sleep(settle).await;

    info!("step: stuck loading");
    host.show_loading("listing-grid");
    monitor
        .send(MonitorSignal::ScanLoading)
        .map_err(channel_closed)?;
    tokio::time::sleep(timings.max_loading() + settle).await;

    drop(monitor);
    let (events, prompt) = collector.await.map_err(|err| {
        ServiceError::new(
            ServiceErrorCategory::Internal,
            "collector_failed",
            err.to_string(),
        )
    })?;

    Ok(ScenarioReport {
        events,
        prompt,
        session_checks: service.calls(ServiceOp::GetSession),
        probes: service.calls(ServiceOp::Probe),
        reloads: host.reloads(),
    })
}

fn channel_closed(err: reconnect_core::MonitorChannelError) -> ServiceError {
    ServiceError::new(
        ServiceErrorCategory::Internal,
        "monitor_stopped",
        err.to_string(),
    )
}
