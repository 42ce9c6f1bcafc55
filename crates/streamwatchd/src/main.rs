// # streamwatchd - Streaming Availability Daemon
//
// Thin integration layer: reads configuration from the environment, wires
// the core components to their HTTP collaborators and runs until
// SIGTERM/SIGINT. All detection and fan-out logic lives in streamwatch-core.
//
// The daemon runs:
// 1. The change detector, triggered by a cron schedule (and optionally once
//    at startup)
// 2. The fan-out consumer group, notifying users of provider changes
//
// Movies to watch are seeded from the environment. Nothing in the daemon
// publishes user watch-list events, so no tracking group is started.
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### Detector
// - `STREAMWATCH_SCHEDULE`: 6-field cron expression (default `0 0 1 * * *`)
// - `STREAMWATCH_REGION`: Two-letter region code (default `GR`)
// - `STREAMWATCH_LOOKUP_TIMEOUT_SECS`: Per-movie lookup bound (default 10)
// - `STREAMWATCH_RUN_ON_STARTUP`: Sweep once immediately (default false)
// - `STREAMWATCH_TRACKED_MOVIES`: Comma-separated movie ids to seed tracking
//
// ### Collaborators
// - `STREAMWATCH_TMDB_API_KEY`: TMDB API key (required)
// - `STREAMWATCH_TMDB_BASE_URL`: TMDB API base URL (optional)
// - `STREAMWATCH_NOTIFY_URL`: Notification service base URL (required)
// - `STREAMWATCH_WATCHLIST_URL`: Watch-list service base URL (required)
// - `STREAMWATCH_NOTIFY_TIMEOUT_SECS`: Per-call bound (default 10)
//
// ### Bus
// - `STREAMWATCH_TOPIC`: Topic name (default `movie-events`)
// - `STREAMWATCH_PARTITIONS`: Partition count (default 8)
// - `STREAMWATCH_CONSUMER_GROUP`: Fan-out group (default `movie-service`)
// - `STREAMWATCH_WORKERS`: Fan-out workers (default 2)
// - `STREAMWATCH_BUS_LOG_PATH`: Event log file. Defaults to
//   `<state store path>.events.json` with the file store; setting it with the
//   memory store also keeps the log on disk
//
// ### State Store
// - `STREAMWATCH_STATE_STORE_TYPE`: Type of snapshot store (memory, file)
// - `STREAMWATCH_STATE_STORE_PATH`: Path to snapshot file (for file store)
//
// With the file store the event log is always on disk as well: a change
// committed to the snapshot file must still be on the bus after a restart.
//
// ## Example
//
// ```bash
// export STREAMWATCH_TMDB_API_KEY=...
// export STREAMWATCH_NOTIFY_URL=http://notification-service:8080
// export STREAMWATCH_WATCHLIST_URL=http://movie-service:8080
// export STREAMWATCH_TRACKED_MOVIES=550,680
// export STREAMWATCH_STATE_STORE_TYPE=file
// export STREAMWATCH_STATE_STORE_PATH=/var/lib/streamwatch/snapshots.json
//
// streamwatchd
// ```

use anyhow::{Context, Result};
use std::env;
use std::fmt::Display;
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use std::path::Path;
use streamwatch_core::config::{BusLogConfig, SnapshotStoreConfig};
use streamwatch_core::{
    ChangeDetector, ConsumerGroup, DetectorEvent, EventBus, EventPublisher, FanoutDispatcher,
    FileEventBus, FileSnapshotStore, MemoryEventBus, MemorySnapshotStore, MovieId, SnapshotStore,
    StreamwatchConfig,
};
use streamwatch_http::{HttpNotificationSink, HttpWatchListClient};
use streamwatch_provider_tmdb::{TMDB_API_BASE, TmdbProviderLookup};
use tokio::sync::{mpsc, watch};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// How long consumer workers get to finish their current batch
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum StreamwatchExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<StreamwatchExitCode> for ExitCode {
    fn from(code: StreamwatchExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
struct Config {
    schedule: String,
    region: String,
    tmdb_api_key: String,
    tmdb_base_url: Option<String>,
    notify_url: String,
    watchlist_url: String,
    tracked_movies: Vec<MovieId>,
    state_store_type: String,
    state_store_path: Option<String>,
    bus_log_path: Option<String>,
    topic: Option<String>,
    partitions: Option<usize>,
    consumer_group: Option<String>,
    workers: Option<usize>,
    lookup_timeout_secs: Option<u64>,
    notify_timeout_secs: Option<u64>,
    run_on_startup: bool,
    log_level: String,
}

/// Parse an optional numeric/boolean variable, naming it on failure
fn parse_var<T>(name: &str, value: Option<String>) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    value
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| anyhow::anyhow!("{} has an invalid value '{}': {}", name, raw, e))
        })
        .transpose()
}

fn parse_flag(name: &str, value: Option<String>) -> Result<bool> {
    match value.as_deref().map(|v| v.trim().to_lowercase()) {
        None => Ok(false),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" | "" => Ok(false),
            _ => anyhow::bail!("{} must be true or false. Got: {}", name, v),
        },
    }
}

fn parse_movie_ids(raw: &str) -> Result<Vec<MovieId>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>().map(MovieId).map_err(|_| {
                anyhow::anyhow!("STREAMWATCH_TRACKED_MOVIES contains a non-numeric id: '{}'", s)
            })
        })
        .collect()
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        Ok(Self {
            schedule: var("STREAMWATCH_SCHEDULE").unwrap_or_else(|| "0 0 1 * * *".to_string()),
            region: var("STREAMWATCH_REGION").unwrap_or_else(|| "GR".to_string()),
            tmdb_api_key: var("STREAMWATCH_TMDB_API_KEY").context(
                "STREAMWATCH_TMDB_API_KEY is required. \
                Set it via: export STREAMWATCH_TMDB_API_KEY=your_key",
            )?,
            tmdb_base_url: var("STREAMWATCH_TMDB_BASE_URL"),
            notify_url: var("STREAMWATCH_NOTIFY_URL")
                .context("STREAMWATCH_NOTIFY_URL is required")?,
            watchlist_url: var("STREAMWATCH_WATCHLIST_URL")
                .context("STREAMWATCH_WATCHLIST_URL is required")?,
            tracked_movies: parse_movie_ids(&var("STREAMWATCH_TRACKED_MOVIES").unwrap_or_default())?,
            state_store_type: var("STREAMWATCH_STATE_STORE_TYPE")
                .unwrap_or_else(|| "memory".to_string()),
            state_store_path: var("STREAMWATCH_STATE_STORE_PATH"),
            bus_log_path: var("STREAMWATCH_BUS_LOG_PATH"),
            topic: var("STREAMWATCH_TOPIC"),
            partitions: parse_var("STREAMWATCH_PARTITIONS", var("STREAMWATCH_PARTITIONS"))?,
            consumer_group: var("STREAMWATCH_CONSUMER_GROUP"),
            workers: parse_var("STREAMWATCH_WORKERS", var("STREAMWATCH_WORKERS"))?,
            lookup_timeout_secs: parse_var(
                "STREAMWATCH_LOOKUP_TIMEOUT_SECS",
                var("STREAMWATCH_LOOKUP_TIMEOUT_SECS"),
            )?,
            notify_timeout_secs: parse_var(
                "STREAMWATCH_NOTIFY_TIMEOUT_SECS",
                var("STREAMWATCH_NOTIFY_TIMEOUT_SECS"),
            )?,
            run_on_startup: parse_flag("STREAMWATCH_RUN_ON_STARTUP", var("STREAMWATCH_RUN_ON_STARTUP"))?,
            log_level: var("STREAMWATCH_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Core configuration with the environment overrides applied
    fn core_config(&self) -> StreamwatchConfig {
        let mut core = StreamwatchConfig::new();

        core.detector.schedule = self.schedule.clone();
        core.detector.region = self.region.clone();
        core.detector.run_on_startup = self.run_on_startup;
        if let Some(secs) = self.lookup_timeout_secs {
            core.detector.lookup_timeout_secs = secs;
        }

        if let Some(topic) = &self.topic {
            core.bus.topic = topic.clone();
        }
        if let Some(partitions) = self.partitions {
            core.bus.partitions = partitions;
        }

        if let Some(group) = &self.consumer_group {
            core.dispatcher.group_id = group.clone();
        }
        if let Some(workers) = self.workers {
            core.dispatcher.workers = workers;
        }
        if let Some(secs) = self.notify_timeout_secs {
            core.dispatcher.notify_timeout_secs = secs;
        }

        core.snapshot_store = match self.state_store_type.as_str() {
            "file" => SnapshotStoreConfig::File {
                path: self.state_store_path.clone().unwrap_or_default(),
            },
            _ => SnapshotStoreConfig::Memory,
        };
        core.bus.log = match self.bus_log_path() {
            Some(path) => BusLogConfig::File { path },
            None => BusLogConfig::Memory,
        };

        core
    }

    /// Event log location, if the log is kept on disk
    fn bus_log_path(&self) -> Option<String> {
        if let Some(path) = &self.bus_log_path {
            return Some(path.clone());
        }
        if self.state_store_type != "file" {
            return None;
        }
        let state_path = self.state_store_path.as_deref()?;
        Some(
            Path::new(state_path)
                .with_extension("events.json")
                .to_string_lossy()
                .into_owned(),
        )
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        let key_lower = self.tmdb_api_key.to_lowercase();
        if key_lower.contains("your_key") || key_lower.contains("replace_me") || key_lower == "key"
        {
            anyhow::bail!(
                "STREAMWATCH_TMDB_API_KEY appears to be a placeholder. \
                Use an actual API key from your TMDB account."
            );
        }

        for (name, url) in [
            ("STREAMWATCH_NOTIFY_URL", Some(&self.notify_url)),
            ("STREAMWATCH_WATCHLIST_URL", Some(&self.watchlist_url)),
            ("STREAMWATCH_TMDB_BASE_URL", self.tmdb_base_url.as_ref()),
        ] {
            if let Some(url) = url
                && !url.starts_with("https://")
                && !url.starts_with("http://")
            {
                anyhow::bail!("{} must use HTTP or HTTPS scheme. Got: {}", name, url);
            }
        }

        match self.state_store_type.as_str() {
            "file" | "memory" => {}
            _ => anyhow::bail!(
                "STREAMWATCH_STATE_STORE_TYPE '{}' is not supported. \
                Supported types: file, memory",
                self.state_store_type
            ),
        }

        if self.state_store_type == "file" {
            let Some(path) = &self.state_store_path else {
                anyhow::bail!(
                    "STREAMWATCH_STATE_STORE_PATH is required when STREAMWATCH_STATE_STORE_TYPE=file. \
                    Set it via: export STREAMWATCH_STATE_STORE_PATH=/var/lib/streamwatch/snapshots.json"
                );
            };

            if let Some(parent) = Path::new(path).parent()
                && !parent.as_os_str().is_empty()
                && !parent.exists()
            {
                anyhow::bail!(
                    "STREAMWATCH_STATE_STORE_PATH parent directory does not exist: {}. \
                    Create it first: sudo mkdir -p {}",
                    parent.display(),
                    parent.display()
                );
            }
        }

        if let Some(path) = &self.bus_log_path
            && let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            anyhow::bail!(
                "STREAMWATCH_BUS_LOG_PATH parent directory does not exist: {}",
                parent.display()
            );
        }

        if let Some(id) = self.tracked_movies.iter().find(|id| id.0 <= 0) {
            anyhow::bail!("STREAMWATCH_TRACKED_MOVIES ids must be positive. Got: {}", id);
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "STREAMWATCH_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        self.core_config().validate()?;
        Ok(())
    }
}

fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return StreamwatchExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return StreamwatchExitCode::ConfigError.into();
    }

    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return StreamwatchExitCode::ConfigError.into();
    }

    info!("Starting streamwatchd daemon");
    info!(
        "Configuration loaded: {} seeded movie(s), region {}",
        config.tracked_movies.len(),
        config.region
    );

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return StreamwatchExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run_daemon(config).await {
            error!("Daemon error: {:#}", e);
            StreamwatchExitCode::RuntimeError
        } else {
            StreamwatchExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Run the daemon
async fn run_daemon(config: Config) -> Result<()> {
    let core = config.core_config();

    let store: Arc<dyn SnapshotStore> = match &core.snapshot_store {
        SnapshotStoreConfig::File { path } => Arc::new(
            FileSnapshotStore::open(path)
                .await
                .with_context(|| format!("failed to open snapshot store at {}", path))?,
        ),
        SnapshotStoreConfig::Memory => Arc::new(MemorySnapshotStore::new()),
    };
    info!("State store type: {}", core.snapshot_store.type_name());

    for movie_id in &config.tracked_movies {
        if store.track(*movie_id).await? {
            info!(movie_id = %movie_id, "Tracking movie");
        }
    }

    let bus: Arc<dyn EventBus> = match &core.bus.log {
        BusLogConfig::File { path } => Arc::new(
            FileEventBus::open(path, core.bus.partitions)
                .await
                .with_context(|| format!("failed to open event log at {}", path))?,
        ),
        BusLogConfig::Memory => Arc::new(MemoryEventBus::new(core.bus.partitions)),
    };
    info!("Event log type: {}", core.bus.log.type_name());
    let publisher = EventPublisher::new(bus.clone(), core.bus.topic.clone());

    let lookup = build_lookup(&config, &core)?;

    let (detector, detector_events) =
        ChangeDetector::new(Arc::new(lookup), store.clone(), publisher, core.detector.clone())?;
    let detector = Arc::new(detector);
    let event_logger = tokio::spawn(log_detector_events(detector_events));

    // Collaborator calls
    let groups = consumer_groups(&config, &core, bus.clone())?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut workers = Vec::new();
    for group in &groups {
        workers.extend(group.spawn(shutdown_rx.clone()));
        info!(
            "Consumer group {} started with {} worker(s)",
            group.group(),
            group.workers().len()
        );
    }

    let mut scheduler = JobScheduler::new().await?;
    let job_detector = detector.clone();
    let job = Job::new_async(core.detector.schedule.as_str(), move |_uuid, _lock| {
        let detector = job_detector.clone();
        Box::pin(async move {
            if let Err(e) = detector.sweep().await {
                error!(error = %e, "Scheduled sweep failed");
            }
        })
    })?;
    scheduler.add(job).await?;
    scheduler.start().await?;
    info!(
        schedule = %core.detector.schedule,
        region = %core.detector.region,
        "Change detector scheduled"
    );

    if core.detector.run_on_startup {
        let detector = detector.clone();
        tokio::spawn(async move {
            info!("Running startup sweep");
            if let Err(e) = detector.sweep().await {
                error!(error = %e, "Startup sweep failed");
            }
        });
    }

    let signal = wait_for_shutdown().await?;
    info!("Received shutdown signal: {}", signal);
    info!("Shutting down daemon");

    if let Err(e) = scheduler.shutdown().await {
        warn!("Scheduler shutdown failed: {}", e);
    }

    if shutdown_tx.send(true).is_err() {
        debug!("Consumer workers already stopped");
    }
    let drain = async {
        for worker in workers {
            if let Err(e) = worker.await {
                error!("Consumer worker panicked: {}", e);
            }
        }
    };
    if tokio::time::timeout(SHUTDOWN_GRACE, drain).await.is_err() {
        warn!("Consumer workers did not stop within {:?}", SHUTDOWN_GRACE);
    }

    event_logger.abort();
    store.flush().await?;

    info!("Shutdown complete");
    Ok(())
}

/// Consumer groups the daemon runs on `bus`
///
/// Only the fan-out group: the tracker reacts to user events, and no
/// producer of those runs in this process.
fn consumer_groups(
    config: &Config,
    core: &StreamwatchConfig,
    bus: Arc<dyn EventBus>,
) -> Result<Vec<ConsumerGroup>> {
    let notify_timeout = core.dispatcher.notify_timeout();
    let dispatcher = FanoutDispatcher::new(
        Arc::new(HttpWatchListClient::with_timeout(config.watchlist_url.as_str(), notify_timeout)?),
        Arc::new(HttpNotificationSink::with_timeout(config.notify_url.as_str(), notify_timeout)?),
        notify_timeout,
    );

    let fanout = ConsumerGroup::with_settings(
        bus,
        Arc::new(dispatcher),
        &core.bus.topic,
        &core.dispatcher.group_id,
        core.dispatcher.workers,
        core.bus.poll_batch,
        core.bus.poll_interval(),
    );
    Ok(vec![fanout])
}

/// TMDB lookup honouring the configured per-request bound
fn build_lookup(config: &Config, core: &StreamwatchConfig) -> Result<TmdbProviderLookup> {
    let base = config.tmdb_base_url.as_deref().unwrap_or(TMDB_API_BASE);
    Ok(TmdbProviderLookup::with_base_url(
        config.tmdb_api_key.as_str(),
        base,
        core.detector.lookup_timeout(),
    )?)
}

/// Log detector observer events until the detector goes away
async fn log_detector_events(mut events: mpsc::Receiver<DetectorEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            DetectorEvent::SweepStarted { tracked } => {
                debug!(tracked, "Sweep started");
            }
            DetectorEvent::SnapshotChanged { movie_id, diff } => {
                debug!(movie_id = %movie_id, ?diff, "Availability changed");
            }
            DetectorEvent::LookupFailed { movie_id, error } => {
                debug!(movie_id = %movie_id, %error, "Lookup failed");
            }
            DetectorEvent::SweepCompleted { report } => {
                info!(
                    checked = report.checked,
                    changed = report.changed,
                    unchanged = report.unchanged,
                    failed = report.failed,
                    "Sweep report"
                );
            }
            DetectorEvent::SweepSkipped => {
                debug!("Sweep skipped");
            }
        }
    }
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
