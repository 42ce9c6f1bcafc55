// # File Snapshot Store
//
// File-backed implementation of SnapshotStore.
//
// ## Commit Model
//
// Every `track` and `put_snapshot` rewrites the whole file before
// returning: the new state goes to `<path>.tmp`, the current file is copied
// to `<path>.backup`, then the temp file is renamed over the original.
// A crash at any point leaves either the old or the new file in place, so
// each per-movie update is a single commit.
//
// Writes are serialized by holding the state lock for the whole commit.
//
// ## Recovery
//
// On load, a file that is not valid JSON (or not the expected shape) is
// treated as corrupt and the `.backup` is used instead. If the backup is
// also unusable the store starts empty; the next sweep then re-reports
// every movie that has providers.
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "records": {
//     "42": {
//       "snapshot": { "rent": [], "buy": [], "flatrate": [ ... ] },
//       "tracked_since": "2025-01-09T12:00:00Z",
//       "last_changed": "2025-01-10T01:00:03Z"
//     }
//   }
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

use crate::Error;
use crate::events::MovieId;
use crate::persist;
use crate::snapshot::ProviderSnapshot;
use crate::traits::snapshot_store::{SnapshotRecord, SnapshotStore};

const SNAPSHOT_FILE_VERSION: &str = "1.0";

type Records = BTreeMap<MovieId, SnapshotRecord>;

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotFile {
    version: String,
    records: Records,
}

fn store_error(msg: String) -> Error {
    Error::store(msg)
}

/// File-backed snapshot store
///
/// # Example
///
/// ```rust,no_run
/// use streamwatch_core::{FileSnapshotStore, MovieId, SnapshotStore};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileSnapshotStore::open("/var/lib/streamwatch/snapshots.json").await?;
///     store.track(MovieId(550)).await?;
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileSnapshotStore {
    path: PathBuf,
    records: RwLock<Records>,
}

impl FileSnapshotStore {
    /// Open the store at `path`, creating parent directories as needed
    ///
    /// A missing file is an empty store. A corrupt file falls back to the
    /// backup. Only an unreadable file is an error.
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        persist::ensure_parent(&path, store_error).await?;

        let records = match persist::load_with_recovery::<SnapshotFile>(&path, store_error).await? {
            Some(file) => {
                if file.version != SNAPSHOT_FILE_VERSION {
                    tracing::warn!(
                        expected = SNAPSHOT_FILE_VERSION,
                        found = %file.version,
                        "Snapshot file version mismatch, loading anyway"
                    );
                }
                file.records
            }
            None => Records::new(),
        };
        tracing::info!(
            path = %path.display(),
            tracked = records.len(),
            "Opened snapshot file"
        );

        Ok(Self {
            path,
            records: RwLock::new(records),
        })
    }

    /// Write `records` to disk with temp-file + rename
    async fn commit(&self, records: &Records) -> Result<(), Error> {
        let file = SnapshotFile {
            version: SNAPSHOT_FILE_VERSION.to_string(),
            records: records.clone(),
        };
        persist::write_atomic(&self.path, &file, store_error).await
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn track(&self, movie_id: MovieId) -> Result<bool, Error> {
        let mut guard = self.records.write().await;
        if guard.contains_key(&movie_id) {
            return Ok(false);
        }

        let mut next = guard.clone();
        next.insert(movie_id, SnapshotRecord::tracked_now());
        self.commit(&next).await?;
        *guard = next;
        Ok(true)
    }

    async fn tracked_movies(&self) -> Result<Vec<MovieId>, Error> {
        Ok(self.records.read().await.keys().copied().collect())
    }

    async fn get_snapshot(&self, movie_id: MovieId) -> Result<Option<ProviderSnapshot>, Error> {
        let guard = self.records.read().await;
        Ok(guard.get(&movie_id).and_then(|r| r.snapshot.clone()))
    }

    async fn get_record(&self, movie_id: MovieId) -> Result<Option<SnapshotRecord>, Error> {
        Ok(self.records.read().await.get(&movie_id).cloned())
    }

    async fn put_snapshot(
        &self,
        movie_id: MovieId,
        snapshot: Option<ProviderSnapshot>,
    ) -> Result<(), Error> {
        let mut guard = self.records.write().await;

        // Only swap in memory once the file holds the new state
        let mut next = guard.clone();
        next.entry(movie_id)
            .or_insert_with(SnapshotRecord::tracked_now)
            .replace(snapshot);
        self.commit(&next).await?;
        *guard = next;
        Ok(())
    }

    async fn flush(&self) -> Result<(), Error> {
        // Every mutation is already on disk
        Ok(())
    }
}
