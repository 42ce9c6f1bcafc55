// # Memory Snapshot Store
//
// In-memory implementation of SnapshotStore.
//
// ## Crash Behavior
//
// - All snapshots and the tracked set are lost on restart
// - The first sweep after a restart sees every re-seeded movie as absent,
//   so any movie with providers emits one PROVIDERS_CHANGED
//
// ## When to Use
//
// - Tests
// - Deployments where one extra notification per restart is acceptable

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::events::MovieId;
use crate::snapshot::ProviderSnapshot;
use crate::traits::snapshot_store::{SnapshotRecord, SnapshotStore};

/// In-memory snapshot store
///
/// Records live in a `BTreeMap` behind a `RwLock`, so `tracked_movies`
/// returns ids in ascending order.
///
/// # Example
///
/// ```rust,no_run
/// use streamwatch_core::{MemorySnapshotStore, MovieId, SnapshotStore};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemorySnapshotStore::new();
///     store.track(MovieId(42)).await?;
///
///     assert_eq!(store.get_snapshot(MovieId(42)).await?, None);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshotStore {
    inner: Arc<RwLock<BTreeMap<MovieId, SnapshotRecord>>>,
}

impl MemorySnapshotStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store tracking `movies`, all with absent snapshots
    pub fn tracking(movies: impl IntoIterator<Item = MovieId>) -> Self {
        let records = movies
            .into_iter()
            .map(|id| (id, SnapshotRecord::tracked_now()))
            .collect();
        Self {
            inner: Arc::new(RwLock::new(records)),
        }
    }

    /// Number of tracked movies
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn track(&self, movie_id: MovieId) -> Result<bool, Error> {
        let mut guard = self.inner.write().await;
        if guard.contains_key(&movie_id) {
            return Ok(false);
        }
        guard.insert(movie_id, SnapshotRecord::tracked_now());
        Ok(true)
    }

    async fn tracked_movies(&self) -> Result<Vec<MovieId>, Error> {
        Ok(self.inner.read().await.keys().copied().collect())
    }

    async fn get_snapshot(&self, movie_id: MovieId) -> Result<Option<ProviderSnapshot>, Error> {
        let guard = self.inner.read().await;
        Ok(guard.get(&movie_id).and_then(|r| r.snapshot.clone()))
    }

    async fn get_record(&self, movie_id: MovieId) -> Result<Option<SnapshotRecord>, Error> {
        Ok(self.inner.read().await.get(&movie_id).cloned())
    }

    async fn put_snapshot(
        &self,
        movie_id: MovieId,
        snapshot: Option<ProviderSnapshot>,
    ) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        guard
            .entry(movie_id)
            .or_insert_with(SnapshotRecord::tracked_now)
            .replace(snapshot);
        Ok(())
    }

    async fn flush(&self) -> Result<(), Error> {
        Ok(())
    }
}
