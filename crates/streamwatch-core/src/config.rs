//! Configuration types for the streamwatch system
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::token::{SessionKey, TokenSigner, TokenVerifier};

/// Main streamwatch configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamwatchConfig {
    /// Change detector settings
    #[serde(default)]
    pub detector: DetectorConfig,

    /// Event bus settings
    #[serde(default)]
    pub bus: BusConfig,

    /// Fan-out dispatcher settings
    #[serde(default)]
    pub dispatcher: DispatcherConfig,

    /// Movie tracking consumer settings
    #[serde(default)]
    pub tracker: TrackerConfig,

    /// Session token settings (only needed by callers that authenticate)
    #[serde(default)]
    pub auth: Option<AuthConfig>,

    /// Snapshot store configuration
    #[serde(default)]
    pub snapshot_store: SnapshotStoreConfig,
}

impl StreamwatchConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.detector.validate()?;
        self.bus.validate()?;
        self.dispatcher.validate(&self.bus)?;
        self.tracker.validate()?;
        if let Some(auth) = &self.auth {
            auth.validate()?;
        }
        self.snapshot_store.validate()?;

        // A persisted snapshot with a lost announcement is never re-detected
        if matches!(self.snapshot_store, SnapshotStoreConfig::File { .. })
            && matches!(self.bus.log, BusLogConfig::Memory)
        {
            return Err(crate::Error::config(
                "a file snapshot store needs a file event log (bus.log)",
            ));
        }

        if self.dispatcher.group_id == self.tracker.group_id {
            return Err(crate::Error::config(format!(
                "dispatcher and tracker must use different consumer groups (both are '{}')",
                self.tracker.group_id
            )));
        }

        Ok(())
    }
}

/// Change detector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Six-field cron expression (sec min hour day month weekday)
    #[serde(default = "default_schedule")]
    pub schedule: String,

    /// Two-letter region code passed to every provider lookup
    #[serde(default = "default_region")]
    pub region: String,

    /// Upper bound on a single provider lookup (in seconds)
    #[serde(default = "default_lookup_timeout_secs")]
    pub lookup_timeout_secs: u64,

    /// Capacity of the detector's observer channel
    ///
    /// When full, new detector events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// Run one sweep immediately when the daemon starts
    #[serde(default)]
    pub run_on_startup: bool,
}

impl DetectorConfig {
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.schedule.split_whitespace().count() != 6 {
            return Err(crate::Error::config(format!(
                "detector schedule must be a six-field cron expression, got '{}'",
                self.schedule
            )));
        }
        if self.region.len() != 2 || !self.region.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(crate::Error::config(format!(
                "region must be two uppercase letters (e.g. GR), got '{}'",
                self.region
            )));
        }
        if self.lookup_timeout_secs == 0 {
            return Err(crate::Error::config("lookup timeout must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("event channel capacity must be > 0"));
        }
        Ok(())
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_secs(self.lookup_timeout_secs)
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            schedule: default_schedule(),
            region: default_region(),
            lookup_timeout_secs: default_lookup_timeout_secs(),
            event_channel_capacity: default_event_channel_capacity(),
            run_on_startup: false,
        }
    }
}

/// Event bus configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    /// Topic carrying movie events
    #[serde(default = "default_topic")]
    pub topic: String,

    /// Partitions per topic
    #[serde(default = "default_partitions")]
    pub partitions: usize,

    /// Maximum records fetched per poll
    #[serde(default = "default_poll_batch")]
    pub poll_batch: usize,

    /// How long an idle worker waits before polling again (in milliseconds)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Where the partition logs and committed offsets live
    #[serde(default)]
    pub log: BusLogConfig,
}

impl BusConfig {
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.topic.trim().is_empty() {
            return Err(crate::Error::config("bus topic cannot be empty"));
        }
        if self.partitions == 0 {
            return Err(crate::Error::config("bus partitions must be > 0"));
        }
        if self.poll_batch == 0 {
            return Err(crate::Error::config("bus poll batch must be > 0"));
        }
        self.log.validate()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            topic: default_topic(),
            partitions: default_partitions(),
            poll_batch: default_poll_batch(),
            poll_interval_ms: default_poll_interval_ms(),
            log: BusLogConfig::default(),
        }
    }
}

/// Fan-out dispatcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Consumer group id
    #[serde(default = "default_dispatcher_group")]
    pub group_id: String,

    /// Worker tasks; partitions are split between them
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Upper bound on a single watch-list query or notification call (in seconds)
    #[serde(default = "default_notify_timeout_secs")]
    pub notify_timeout_secs: u64,
}

impl DispatcherConfig {
    pub fn validate(&self, bus: &BusConfig) -> Result<(), crate::Error> {
        if self.group_id.trim().is_empty() {
            return Err(crate::Error::config("dispatcher consumer group cannot be empty"));
        }
        if self.workers == 0 {
            return Err(crate::Error::config("dispatcher workers must be > 0"));
        }
        if self.workers > bus.partitions {
            return Err(crate::Error::config(format!(
                "dispatcher workers ({}) cannot exceed bus partitions ({})",
                self.workers, bus.partitions
            )));
        }
        if self.notify_timeout_secs == 0 {
            return Err(crate::Error::config("notify timeout must be > 0"));
        }
        Ok(())
    }

    pub fn notify_timeout(&self) -> Duration {
        Duration::from_secs(self.notify_timeout_secs)
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            group_id: default_dispatcher_group(),
            workers: default_workers(),
            notify_timeout_secs: default_notify_timeout_secs(),
        }
    }
}

/// Movie tracking consumer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Consumer group id
    #[serde(default = "default_tracker_group")]
    pub group_id: String,
}

impl TrackerConfig {
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.group_id.trim().is_empty() {
            return Err(crate::Error::config("tracker consumer group cannot be empty"));
        }
        Ok(())
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            group_id: default_tracker_group(),
        }
    }
}

/// Session token configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Base64-encoded HMAC key
    pub secret: String,

    /// Token lifetime (in milliseconds)
    #[serde(default = "default_expiration_ms")]
    pub expiration_ms: u64,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("secret", &"<REDACTED>")
            .field("expiration_ms", &self.expiration_ms)
            .finish()
    }
}

impl AuthConfig {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            expiration_ms: default_expiration_ms(),
        }
    }

    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.expiration_ms == 0 {
            return Err(crate::Error::config("token expiration must be > 0"));
        }
        self.session_key().map(|_| ())
    }

    /// Decode the configured secret
    pub fn session_key(&self) -> Result<SessionKey, crate::Error> {
        SessionKey::from_base64(&self.secret)
    }

    pub fn verifier(&self) -> Result<TokenVerifier, crate::Error> {
        Ok(TokenVerifier::new(self.session_key()?))
    }

    pub fn signer(&self) -> Result<TokenSigner, crate::Error> {
        let ttl = i64::try_from(self.expiration_ms)
            .map(chrono::Duration::milliseconds)
            .map_err(|_| crate::Error::config("token expiration is too large"))?;
        Ok(TokenSigner::new(self.session_key()?, ttl))
    }
}

/// Snapshot store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SnapshotStoreConfig {
    /// File-based snapshot store
    File {
        /// Path to the snapshot file
        path: String,
    },

    /// In-memory snapshot store (not persistent)
    #[default]
    Memory,
}

impl SnapshotStoreConfig {
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            SnapshotStoreConfig::File { path } if path.trim().is_empty() => Err(
                crate::Error::config("file snapshot store requires a path"),
            ),
            _ => Ok(()),
        }
    }

    /// Store type name for logging
    pub fn type_name(&self) -> &'static str {
        match self {
            SnapshotStoreConfig::File { .. } => "file",
            SnapshotStoreConfig::Memory => "memory",
        }
    }
}

/// Event log storage
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusLogConfig {
    /// Log file shared by restarts of the process
    File {
        /// Path to the log file
        path: String,
    },

    /// In-process log (lost on exit)
    #[default]
    Memory,
}

impl BusLogConfig {
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            BusLogConfig::File { path } if path.trim().is_empty() => {
                Err(crate::Error::config("file event log requires a path"))
            }
            _ => Ok(()),
        }
    }

    /// Log type name for logging
    pub fn type_name(&self) -> &'static str {
        match self {
            BusLogConfig::File { .. } => "file",
            BusLogConfig::Memory => "memory",
        }
    }
}

fn default_schedule() -> String {
    // 01:00:00 every day
    "0 0 1 * * *".to_string()
}

fn default_region() -> String {
    "GR".to_string()
}

fn default_lookup_timeout_secs() -> u64 {
    10
}

fn default_event_channel_capacity() -> usize {
    1000
}

fn default_topic() -> String {
    "movie-events".to_string()
}

fn default_partitions() -> usize {
    8
}

fn default_poll_batch() -> usize {
    64
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_dispatcher_group() -> String {
    "movie-service".to_string()
}

fn default_workers() -> usize {
    2
}

fn default_notify_timeout_secs() -> u64 {
    10
}

fn default_tracker_group() -> String {
    "tmdb-service".to_string()
}

fn default_expiration_ms() -> u64 {
    36_000_000
}
