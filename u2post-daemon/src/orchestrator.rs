//! Daemon orchestration -- assembly, lifecycle, and cooperative shutdown.
//!
//! The [`Orchestrator`] loads configuration, builds the publisher and the
//! ingest pipeline, and runs the main loop until a shutdown signal arrives.
//!
//! # Startup Order
//!
//! 1. Metrics recorder (so startup counters are captured)
//! 2. Publisher (output file opened before anything is read)
//! 3. PID file
//! 4. Ingest pipeline (rule index, registrar probe, spool seek, tasks)
//!
//! # Shutdown Order
//!
//! 1. Background tasks (uptime updater)
//! 2. Ingest pipeline (reader finishes its record, final flush, final checkpoint)
//! 3. PID file removal

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio::sync::broadcast;

use u2post_core::config::U2PostConfig;
use u2post_core::metrics as m;
use u2post_core::pipeline::Pipeline;
use u2post_ingest::{IngestConfig, IngestPipeline, IngestPipelineBuilder};

use crate::health::{DaemonHealth, HealthTracker};
use crate::{metrics_server, output, pid_file};

/// Interval between pipeline health polls.
const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(10);

/// The main daemon orchestrator.
pub struct Orchestrator {
    /// Loaded and validated configuration.
    config: U2PostConfig,
    /// The ingest pipeline.
    pipeline: IngestPipeline,
    /// Shutdown broadcast sender (signals background tasks).
    shutdown_tx: broadcast::Sender<()>,
    /// Daemon start time (for uptime reporting).
    start_time: Instant,
}

impl Orchestrator {
    /// Load configuration and build the orchestrator.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be loaded or validated,
    /// or if the publisher or pipeline cannot be built.
    pub async fn build(config_path: &Path) -> Result<Self> {
        let config = U2PostConfig::load(config_path)
            .await
            .context("failed to load config")?;
        Self::build_from_config(config).await
    }

    /// Build from an already-loaded configuration.
    pub async fn build_from_config(config: U2PostConfig) -> Result<Self> {
        config.validate().context("config validation failed")?;

        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
            record_build_info();
        }

        let publisher = output::build_publisher(&config.output).await?;
        tracing::info!(publisher = publisher.name(), "publisher initialized");

        let ingest_config = IngestConfig::from_core(&config);
        let (pipeline, _) = IngestPipelineBuilder::new()
            .config(ingest_config)
            .publisher(publisher)
            .build()
            .context("failed to build ingest pipeline")?;

        let (shutdown_tx, _) = broadcast::channel(4);

        Ok(Self {
            config,
            pipeline,
            shutdown_tx,
            start_time: Instant::now(),
        })
    }

    /// Start the pipeline and run until SIGTERM or SIGINT.
    pub async fn run(&mut self) -> Result<()> {
        let signal = shutdown_signal()?;
        self.run_until(signal).await
    }

    /// Start the pipeline and run until `shutdown` resolves.
    ///
    /// The future's output names the trigger for logging.
    pub async fn run_until(&mut self, shutdown: impl Future<Output = &'static str>) -> Result<()> {
        let pid_path = self.pid_path();
        if let Some(path) = &pid_path {
            pid_file::write_pid_file(path)?;
        }

        tracing::info!("starting ingest pipeline");
        if let Err(e) = self.pipeline.start().await {
            if let Some(path) = &pid_path {
                pid_file::remove_pid_file(path);
            }
            return Err(e).context("failed to start ingest pipeline");
        }

        let uptime_task = self
            .config
            .metrics
            .enabled
            .then(|| spawn_uptime_updater(self.start_time, self.shutdown_tx.subscribe()));

        tracing::info!(
            spool = %self.config.spool.directory,
            prefix = %self.config.spool.prefix,
            "u2post-daemon running"
        );

        let mut tracker = HealthTracker::new();
        let mut health_interval = tokio::time::interval(HEALTH_CHECK_INTERVAL);
        health_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        tokio::pin!(shutdown);
        let trigger = loop {
            tokio::select! {
                trigger = &mut shutdown => break trigger,
                _ = health_interval.tick() => {
                    tracker.observe(self.pipeline.health_check().await);
                }
            }
        };
        tracing::info!(signal = trigger, "shutdown signal received");

        let _ = self.shutdown_tx.send(());
        if let Some(task) = uptime_task {
            let _ = task.await;
        }

        let stopped = self.pipeline.stop().await;

        if let Some(path) = &pid_path {
            pid_file::remove_pid_file(path);
        }

        stopped.context("failed to stop ingest pipeline")?;
        tracing::info!("u2post-daemon shut down");
        Ok(())
    }

    /// Current health report.
    pub async fn health(&self) -> DaemonHealth {
        let uptime_secs = self.start_time.elapsed().as_secs();
        if self.config.metrics.enabled {
            metrics::gauge!(m::DAEMON_UPTIME_SECONDS).set(uptime_secs as f64);
        }

        DaemonHealth {
            status: self.pipeline.health_check().await,
            uptime_secs,
            alerts_published: self.pipeline.alerts_published(),
            publish_failures: self.pipeline.publish_failures(),
            decode_errors: self.pipeline.decode_errors(),
        }
    }

    /// The loaded configuration.
    pub fn config(&self) -> &U2PostConfig {
        &self.config
    }

    /// The ingest pipeline.
    pub fn pipeline(&self) -> &IngestPipeline {
        &self.pipeline
    }

    fn pid_path(&self) -> Option<PathBuf> {
        let pid_file = &self.config.general.pid_file;
        (!pid_file.is_empty()).then(|| PathBuf::from(pid_file))
    }
}

/// Install SIGTERM and SIGINT handlers and return a future that resolves
/// with the name of whichever arrives first.
///
/// # Errors
///
/// Returns an error if signal handlers cannot be installed.
fn shutdown_signal() -> Result<impl Future<Output = &'static str>> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(async move {
        tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        }
    })
}

/// Record the build info gauge (always 1, labeled by version).
fn record_build_info() {
    metrics::gauge!(m::DAEMON_BUILD_INFO, "version" => env!("CARGO_PKG_VERSION")).set(1.0);
    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "daemon metrics recorded");
}

/// Spawn a background task that periodically updates the uptime metric.
fn spawn_uptime_updater(
    start_time: Instant,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(10));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let uptime_secs = start_time.elapsed().as_secs();
                    metrics::gauge!(m::DAEMON_UPTIME_SECONDS).set(uptime_secs as f64);
                }
                _ = shutdown_rx.recv() => {
                    tracing::debug!("uptime updater shutting down");
                    break;
                }
            }
        }
    })
}
