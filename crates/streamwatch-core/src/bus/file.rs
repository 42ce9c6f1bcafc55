// # File Event Bus
//
// Durable implementation of EventBus.
//
// Same partition logs and per-group offsets as the memory bus, kept in one
// JSON file. Every `publish` and every offset-advancing `commit` rewrites
// the file (temp + rename, previous state kept as `.backup`) before it
// returns, so a published record and a committed offset both survive a
// restart. A change the detector announced before a crash is still waiting
// for every consumer group after it.
//
// The partition count is fixed for the life of the file: reopening with a
// different count is a configuration error, since it would move keys to
// other partitions and break per-key ordering.
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "partitions": 8,
//   "log": {
//     "topics": { "movie-events": [[{"key": 42, "payload": "eyJldmVudFR5cGUi..."}], [], ...] },
//     "committed": { "movie-events": { "movie-service": { "2": 1 } } }
//   }
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

use super::log::{PartitionLog, StoredRecord};
use super::memory::check_partition;
use crate::Error;
use crate::events::MovieId;
use crate::persist;
use crate::traits::event_bus::{BusRecord, EventBus, RecordPosition};

const BUS_FILE_VERSION: &str = "1.0";

#[derive(Debug, Deserialize)]
struct BusFile {
    version: String,
    partitions: usize,
    log: PartitionLog,
}

#[derive(Serialize)]
struct BusFileRef<'a> {
    version: &'a str,
    partitions: usize,
    log: &'a PartitionLog,
}

fn bus_error(msg: String) -> Error {
    Error::bus(msg)
}

/// File-backed partitioned event log
#[derive(Debug)]
pub struct FileEventBus {
    path: PathBuf,
    partitions: usize,
    state: RwLock<PartitionLog>,
}

impl FileEventBus {
    /// Open the log at `path` with `partitions` partitions per topic
    ///
    /// A missing file is an empty log. A corrupt file falls back to the
    /// backup.
    pub async fn open<P: AsRef<Path>>(path: P, partitions: usize) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let partitions = partitions.max(1);
        persist::ensure_parent(&path, bus_error).await?;

        let log = match persist::load_with_recovery::<BusFile>(&path, bus_error).await? {
            Some(file) => {
                if file.version != BUS_FILE_VERSION {
                    tracing::warn!(
                        expected = BUS_FILE_VERSION,
                        found = %file.version,
                        "Event log version mismatch, loading anyway"
                    );
                }
                let stored = file.log.partition_count().unwrap_or(file.partitions);
                if file.partitions != partitions || stored != partitions {
                    return Err(Error::config(format!(
                        "event log at {} has {} partitions but {} are configured",
                        path.display(),
                        file.partitions,
                        partitions
                    )));
                }
                file.log
            }
            None => PartitionLog::default(),
        };

        tracing::info!(
            path = %path.display(),
            partitions,
            records = log.record_count(),
            "Opened event log"
        );

        Ok(Self {
            path,
            partitions,
            state: RwLock::new(log),
        })
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records in `partition` not yet committed by `group`
    pub async fn lag(&self, topic: &str, group: &str, partition: usize) -> u64 {
        self.state.read().await.lag(topic, group, partition)
    }

    async fn persist(&self, log: &PartitionLog) -> Result<(), Error> {
        let file = BusFileRef {
            version: BUS_FILE_VERSION,
            partitions: self.partitions,
            log,
        };
        persist::write_atomic(&self.path, &file, bus_error).await
    }
}

#[async_trait]
impl EventBus for FileEventBus {
    async fn publish(
        &self,
        topic: &str,
        key: MovieId,
        payload: Vec<u8>,
    ) -> Result<RecordPosition, Error> {
        let partition = self.partition_for(key);
        let mut guard = self.state.write().await;

        // Only swap in memory once the file holds the record
        let mut next = guard.clone();
        let offset = next.append(topic, self.partitions, partition, StoredRecord { key, payload })?;
        self.persist(&next).await?;
        *guard = next;

        tracing::trace!(topic, partition, offset, key = %key, "Published durable record");
        Ok(RecordPosition { partition, offset })
    }

    async fn poll(
        &self,
        topic: &str,
        group: &str,
        partition: usize,
        max: usize,
    ) -> Result<Vec<BusRecord>, Error> {
        check_partition(partition, self.partitions)?;
        Ok(self.state.read().await.read(topic, group, partition, max))
    }

    async fn commit(
        &self,
        topic: &str,
        group: &str,
        partition: usize,
        next_offset: u64,
    ) -> Result<(), Error> {
        check_partition(partition, self.partitions)?;
        let mut guard = self.state.write().await;

        let mut next = guard.clone();
        if !next.commit(topic, group, partition, next_offset) {
            return Ok(());
        }
        self.persist(&next).await?;
        *guard = next;
        Ok(())
    }

    fn partition_count(&self) -> usize {
        self.partitions
    }
}
