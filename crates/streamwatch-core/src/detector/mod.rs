//! Provider change detector
//!
//! The ChangeDetector is responsible for:
//! - Polling the provider lookup for every tracked movie
//! - Diffing the result against the stored snapshot
//! - Announcing changes on the event bus
//! - Persisting the new snapshot once the change is announced
//!
//! ## Architecture
//!
//! ```text
//!                         ┌────────────────┐
//!   cron trigger ───────► │ ChangeDetector │ ───► DetectorEvent (observers)
//!                         └────────────────┘
//!                                 │
//!         ┌───────────────────────┼───────────────────────┐
//!         ▼                       ▼                       ▼
//! ┌───────────────┐     ┌────────────────┐      ┌────────────────┐
//! │ProviderLookup │     │ SnapshotStore  │      │ EventPublisher │
//! │ (fetch)       │     │ (diff, commit) │      │ (announce)     │
//! └───────────────┘     └────────────────┘      └────────────────┘
//! ```
//!
//! ## Sweep Flow (per movie)
//!
//! 1. Fetch providers, bounded by the lookup timeout
//! 2. Normalize (all-empty becomes absent)
//! 3. Diff against the stored snapshot
//! 4. On change: publish PROVIDERS_CHANGED, then write the snapshot
//!
//! Publishing before writing means a crash between the two re-detects the
//! same change on the next sweep and announces it again; the change is
//! never lost. A movie whose lookup fails or times out is skipped for this
//! sweep only.
//!
//! ## Single Flight
//!
//! Sweeps never overlap. A sweep requested while another is running
//! returns [`SweepOutcome::Skipped`] immediately.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, trace, warn};

use crate::bus::EventPublisher;
use crate::config::DetectorConfig;
use crate::error::{Error, Result};
use crate::events::MovieId;
use crate::snapshot::{self, ProviderSnapshot, SnapshotDiff};
use crate::traits::{ProviderLookup, SnapshotStore};

/// Events emitted by the ChangeDetector
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectorEvent {
    /// A sweep began
    SweepStarted { tracked: usize },

    /// A movie's availability changed and was announced
    SnapshotChanged { movie_id: MovieId, diff: SnapshotDiff },

    /// A movie was skipped because its lookup failed or timed out
    LookupFailed { movie_id: MovieId, error: String },

    /// A sweep finished
    SweepCompleted { report: SweepReport },

    /// A sweep was requested while another was still running
    SweepSkipped,
}

/// Per-sweep counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Movies looked up
    pub checked: usize,
    /// Movies whose change was announced and stored
    pub changed: usize,
    /// Movies whose availability matched the stored snapshot
    pub unchanged: usize,
    /// Movies skipped (lookup, publish or store failure)
    pub failed: usize,
}

/// Result of a sweep request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepOutcome {
    Completed(SweepReport),
    Skipped,
}

enum MovieOutcome {
    Changed,
    Unchanged,
    Failed,
}

/// Scheduled provider-availability sweeper
pub struct ChangeDetector {
    lookup: Arc<dyn ProviderLookup>,
    store: Arc<dyn SnapshotStore>,
    publisher: EventPublisher,
    region: String,
    lookup_timeout: Duration,
    sweep_lock: Mutex<()>,
    event_tx: mpsc::Sender<DetectorEvent>,
}

impl ChangeDetector {
    /// Create a new change detector
    ///
    /// # Returns
    ///
    /// A tuple of (detector, event_receiver) where event_receiver yields
    /// detector events
    pub fn new(
        lookup: Arc<dyn ProviderLookup>,
        store: Arc<dyn SnapshotStore>,
        publisher: EventPublisher,
        config: DetectorConfig,
    ) -> Result<(Self, mpsc::Receiver<DetectorEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);
        let detector = Self {
            lookup,
            store,
            publisher,
            lookup_timeout: config.lookup_timeout(),
            region: config.region,
            sweep_lock: Mutex::new(()),
            event_tx: tx,
        };

        Ok((detector, rx))
    }

    /// Run one full sweep over the tracked movies
    ///
    /// Per-movie failures are logged and counted, never returned. The only
    /// error is failing to list the tracked movies at all.
    pub async fn sweep(&self) -> Result<SweepOutcome> {
        let Ok(_guard) = self.sweep_lock.try_lock() else {
            warn!("Previous sweep still running, skipping this trigger");
            self.emit_event(DetectorEvent::SweepSkipped);
            return Ok(SweepOutcome::Skipped);
        };

        let started = Instant::now();
        let movies = self.store.tracked_movies().await?;
        info!(
            tracked = movies.len(),
            region = %self.region,
            lookup = self.lookup.lookup_name(),
            "Starting provider sweep"
        );
        self.emit_event(DetectorEvent::SweepStarted {
            tracked: movies.len(),
        });

        let mut report = SweepReport::default();
        for movie_id in movies {
            report.checked += 1;
            match self.check_movie(movie_id).await {
                MovieOutcome::Changed => report.changed += 1,
                MovieOutcome::Unchanged => report.unchanged += 1,
                MovieOutcome::Failed => report.failed += 1,
            }
        }

        info!(
            checked = report.checked,
            changed = report.changed,
            unchanged = report.unchanged,
            failed = report.failed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Provider sweep finished"
        );
        self.emit_event(DetectorEvent::SweepCompleted { report });

        Ok(SweepOutcome::Completed(report))
    }

    async fn check_movie(&self, movie_id: MovieId) -> MovieOutcome {
        let fetched = match self.fetch(movie_id).await {
            Ok(snapshot) => snapshot.normalize(),
            Err(e) => {
                warn!(
                    movie_id = %movie_id,
                    error = %e,
                    transient = e.is_transient(),
                    "Provider lookup failed, skipping movie"
                );
                self.emit_event(DetectorEvent::LookupFailed {
                    movie_id,
                    error: e.to_string(),
                });
                return MovieOutcome::Failed;
            }
        };

        let stored = match self.store.get_snapshot(movie_id).await {
            Ok(stored) => stored,
            Err(e) => {
                warn!(movie_id = %movie_id, error = %e, "Failed to read stored snapshot, skipping movie");
                return MovieOutcome::Failed;
            }
        };

        let diff = snapshot::diff(stored.as_ref(), fetched.as_ref());
        debug!(movie_id = %movie_id, ?diff, "Compared provider snapshot");
        if !diff.is_change() {
            return MovieOutcome::Unchanged;
        }

        match self.commit_change(movie_id, fetched).await {
            Ok(()) => {
                info!(movie_id = %movie_id, ?diff, "Provider availability changed");
                self.emit_event(DetectorEvent::SnapshotChanged { movie_id, diff });
                MovieOutcome::Changed
            }
            Err(e) => {
                warn!(movie_id = %movie_id, error = %e, "Failed to record provider change, will retry next sweep");
                MovieOutcome::Failed
            }
        }
    }

    async fn fetch(&self, movie_id: MovieId) -> Result<ProviderSnapshot> {
        tokio::time::timeout(
            self.lookup_timeout,
            self.lookup.get_providers(movie_id, &self.region),
        )
        .await
        .map_err(|_| Error::Timeout(self.lookup_timeout))?
    }

    /// Announce first, then store
    async fn commit_change(
        &self,
        movie_id: MovieId,
        snapshot: Option<ProviderSnapshot>,
    ) -> Result<()> {
        self.publisher.publish_providers_changed(movie_id).await?;
        self.store.put_snapshot(movie_id, snapshot).await
    }

    /// Send event without blocking the sweep
    fn emit_event(&self, event: DetectorEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("Detector event channel full, dropping event");
            }
            Err(TrySendError::Closed(_)) => {
                trace!("Detector event receiver dropped, discarding event");
            }
        }
    }

    /// Sweep on every tick of `interval` until `shutdown` fires
    ///
    /// The daemon drives sweeps from a cron schedule; this loop is for
    /// embedders that just want a fixed period.
    pub async fn run_every(
        &self,
        interval: Duration,
        mut shutdown: tokio::sync::oneshot::Receiver<()>,
    ) -> Result<()> {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep().await {
                        warn!(error = %e, "Sweep failed");
                    }
                }
                _ = &mut shutdown => {
                    info!("Detector loop stopping");
                    break;
                }
            }
        }

        self.store.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_defaults_to_zero() {
        let report = SweepReport::default();
        assert_eq!(report.checked + report.changed + report.unchanged + report.failed, 0);
        assert_eq!(SweepOutcome::Completed(report), SweepOutcome::Completed(SweepReport::default()));
    }
}
