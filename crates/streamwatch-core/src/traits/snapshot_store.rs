// # Snapshot Store Trait
//
// Defines the keyed store mapping a movie to its last known provider
// snapshot.
//
// ## Purpose
//
// The store is what makes change detection idempotent: a sweep only emits
// an event when the fetched snapshot differs from the stored one. It also
// defines which movies are tracked; a tracked movie may have an absent
// snapshot (tracked, but no provider offers it yet).
//
// ## Implementations
//
// - Memory: `MemorySnapshotStore` (tests, ephemeral deployments)
// - File: `FileSnapshotStore` (JSON with atomic writes and backup)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::events::MovieId;
use crate::snapshot::ProviderSnapshot;

/// Stored state for one tracked movie
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    /// Last known availability; `None` means no provider offers the movie
    pub snapshot: Option<ProviderSnapshot>,
    /// When the movie started being tracked
    pub tracked_since: DateTime<Utc>,
    /// When the snapshot last changed, if ever
    pub last_changed: Option<DateTime<Utc>>,
}

impl SnapshotRecord {
    /// A freshly tracked movie with no snapshot yet
    pub(crate) fn tracked_now() -> Self {
        Self {
            snapshot: None,
            tracked_since: Utc::now(),
            last_changed: None,
        }
    }

    /// Replace the snapshot, stamping the change time
    pub(crate) fn replace(&mut self, snapshot: Option<ProviderSnapshot>) {
        self.snapshot = snapshot.and_then(ProviderSnapshot::normalize);
        self.last_changed = Some(Utc::now());
    }
}

/// Trait for snapshot store implementations
///
/// All methods must be safe to call concurrently. Each `put_snapshot` is a
/// single commit for one movie: after a crash the store holds either the
/// old or the new snapshot for that movie, never a mix.
///
/// Movies are never removed once tracked.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Register a movie for polling
    ///
    /// # Returns
    ///
    /// - `Ok(true)`: The movie was not tracked before
    /// - `Ok(false)`: Already tracked (no change)
    async fn track(&self, movie_id: MovieId) -> Result<bool, crate::Error>;

    /// All tracked movie ids
    async fn tracked_movies(&self) -> Result<Vec<MovieId>, crate::Error>;

    /// Last known snapshot (`None` if absent or untracked)
    async fn get_snapshot(&self, movie_id: MovieId)
    -> Result<Option<ProviderSnapshot>, crate::Error>;

    /// Full record for a movie
    async fn get_record(&self, movie_id: MovieId) -> Result<Option<SnapshotRecord>, crate::Error>;

    /// Overwrite the snapshot for a movie, tracking it if necessary
    ///
    /// Implementations must apply the empty-to-absent rule to `snapshot`.
    async fn put_snapshot(
        &self,
        movie_id: MovieId,
        snapshot: Option<ProviderSnapshot>,
    ) -> Result<(), crate::Error>;

    /// Persist any pending changes
    async fn flush(&self) -> Result<(), crate::Error>;
}
