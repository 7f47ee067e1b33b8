//! Session orchestration -- assembly, read scheduling, and lifecycle management.
//!
//! The [`Orchestrator`] owns the single [`IngestSession`] of the daemon.
//! It converts the `[sysevent]` option table, builds the session, drives
//! `read()` on a fixed cadence, and forwards notifications to the logging
//! sink task until a shutdown signal arrives.
//!
//! # Lifecycle
//!
//! 1. `init()` binds the socket, allocates the ring and starts the listener
//! 2. `read()` every `general.interval_secs`
//! 3. On SIGTERM/SIGINT: session shutdown (forced listener cancellation),
//!    then the notification sink drains what is left and exits

use std::future::Future;
use std::net::SocketAddr;
use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use sysevent_core::config::DaemonConfig;
use sysevent_core::pipeline::HealthStatus;
use sysevent_core::plugin::{Plugin, PluginState};
use sysevent_ingest::{IngestSession, IngestSessionBuilder, NotificationEvent, SyseventConfig};

use crate::metrics_server;

/// Notification channel capacity.
const NOTIFICATION_CHANNEL_CAPACITY: usize = 1024;

/// Convert and validate the `[sysevent]` option table.
///
/// Rejected options are logged by the ingest config layer and skipped;
/// only a missing or invalid `Listen` fails the whole conversion.
pub fn sysevent_config(config: &DaemonConfig) -> Result<SyseventConfig> {
    let (sysevent, rejected) = SyseventConfig::from_table(&config.sysevent);
    if !rejected.is_empty() {
        tracing::warn!(
            rejected = rejected.len(),
            "some [sysevent] options were rejected and ignored"
        );
    }
    sysevent
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid [sysevent] configuration: {e}"))?;
    Ok(sysevent)
}

/// The main daemon orchestrator.
pub struct Orchestrator {
    /// Loaded and validated configuration.
    config: DaemonConfig,
    /// The ingestion session.
    session: IngestSession,
    /// Notification receiver, handed to the sink task on init.
    notification_rx: Option<mpsc::Receiver<NotificationEvent>>,
    /// Shutdown broadcast sender (signals background tasks).
    shutdown_tx: broadcast::Sender<()>,
    /// Notification sink task.
    sink_task: Option<JoinHandle<u64>>,
    /// Daemon start time (for uptime reporting).
    start_time: Instant,
}

impl Orchestrator {
    /// Load configuration and build the orchestrator.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file cannot be read, parsed,
    /// or validated, or if the session cannot be built.
    pub async fn build(config_path: &Path) -> Result<Self> {
        let config = DaemonConfig::load(config_path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {e}"))?;
        Self::build_from_config(config)
    }

    /// Build from an already-loaded configuration.
    pub fn build_from_config(config: DaemonConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {e}"))?;

        let sysevent = sysevent_config(&config)?;

        // Install metrics recorder before the session starts counting
        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
        }

        let (session, notification_rx) = IngestSessionBuilder::new()
            .config(sysevent)
            .hostname(config.general.hostname.clone())
            .notification_capacity(NOTIFICATION_CHANNEL_CAPACITY)
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build ingest session: {e}"))?;

        let (shutdown_tx, _) = broadcast::channel(4);

        tracing::info!(
            interval_secs = config.general.interval_secs,
            hostname = %config.general.hostname,
            "orchestrator initialized"
        );

        Ok(Self {
            config,
            session,
            notification_rx,
            shutdown_tx,
            sink_task: None,
            start_time: Instant::now(),
        })
    }

    /// Initialize the session and start the notification sink.
    ///
    /// Called implicitly by [`run`](Self::run) when not done before.
    pub async fn init(&mut self) -> Result<()> {
        self.session
            .init()
            .await
            .map_err(|e| anyhow::anyhow!("failed to initialize ingest session: {e}"))?;

        if let Some(rx) = self.notification_rx.take() {
            let shutdown_rx = self.shutdown_tx.subscribe();
            self.sink_task = Some(spawn_notification_sink(rx, shutdown_rx));
        }
        Ok(())
    }

    /// Run until SIGTERM or SIGINT, then shut down.
    pub async fn run(&mut self) -> Result<()> {
        let signal = shutdown_signal()?;
        self.run_until(async move {
            let name = signal.await;
            tracing::info!(signal = name, "shutdown signal received");
        })
        .await
    }

    /// Drive the read cadence until `shutdown` completes, then shut down.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        if self.session.state() == PluginState::Created {
            self.init().await?;
        }

        let period = Duration::from_secs(self.config.general.interval_secs);
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        tokio::pin!(shutdown);

        tracing::info!("entering read loop");
        loop {
            tokio::select! {
                () = &mut shutdown => break,
                _ = interval.tick() => self.read_once().await,
            }
        }

        self.shutdown().await
    }

    /// Perform one read cycle. Failures only affect this cycle.
    async fn read_once(&mut self) {
        if let Err(e) = self.session.read().await {
            tracing::warn!(
                error = %e,
                restarts = self.session.restarts(),
                "read cycle failed"
            );
        }
    }

    /// Stop the session, then let the sink drain and exit.
    async fn shutdown(&mut self) -> Result<()> {
        tracing::info!("stopping ingest session");
        let result = self.session.shutdown().await;

        let _ = self.shutdown_tx.send(());
        if let Some(task) = self.sink_task.take() {
            match task.await {
                Ok(count) => tracing::info!(notifications = count, "notification sink stopped"),
                Err(e) => tracing::warn!(error = %e, "notification sink task failed"),
            }
        }

        tracing::info!(
            uptime_secs = self.start_time.elapsed().as_secs(),
            "sysevent-daemon shut down"
        );
        result.map_err(|e| anyhow::anyhow!("failed to shut down ingest session: {e}"))
    }

    /// Get the current session health.
    pub async fn health(&self) -> HealthStatus {
        self.session.health_check().await
    }

    /// Bound address of the listen socket (after init).
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.session.local_addr()
    }

    /// Get a reference to the ingestion session.
    pub fn session(&self) -> &IngestSession {
        &self.session
    }

    /// Get a reference to the loaded configuration.
    pub fn config(&self) -> &DaemonConfig {
        &self.config
    }
}

/// Install signal handlers and return a future resolving to the signal name.
///
/// Handlers are installed eagerly so installation errors surface before the
/// read loop starts.
#[cfg(unix)]
fn shutdown_signal() -> Result<impl Future<Output = &'static str>> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {e}"))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {e}"))?;

    Ok(async move {
        tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        }
    })
}

#[cfg(not(unix))]
fn shutdown_signal() -> Result<impl Future<Output = &'static str>> {
    Ok(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
        }
        "SIGINT"
    })
}

/// Spawn the notification sink.
///
/// Each notification is written as one JSON line on the
/// `sysevent::notification` log target. On shutdown the remaining queued
/// notifications are flushed before the task exits. Returns the number of
/// notifications written.
fn spawn_notification_sink(
    mut rx: mpsc::Receiver<NotificationEvent>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> JoinHandle<u64> {
    tokio::spawn(async move {
        let mut written = 0u64;
        loop {
            tokio::select! {
                received = rx.recv() => match received {
                    Some(event) => {
                        write_notification(&event);
                        written += 1;
                    }
                    None => {
                        tracing::debug!("notification channel closed, exiting sink");
                        return written;
                    }
                },
                _ = shutdown_rx.recv() => {
                    while let Ok(event) = rx.try_recv() {
                        write_notification(&event);
                        written += 1;
                    }
                    tracing::debug!("notification sink shutting down");
                    return written;
                }
            }
        }
    })
}

fn write_notification(event: &NotificationEvent) {
    match serde_json::to_string(event) {
        Ok(line) => tracing::info!(
            target: "sysevent::notification",
            event_id = event.ves.event_id,
            severity = ?event.severity,
            notification = %line,
            "notification"
        ),
        Err(e) => tracing::error!(error = %e, "failed to serialize notification"),
    }
}
