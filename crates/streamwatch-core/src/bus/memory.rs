// # Memory Event Bus
//
// In-process implementation of EventBus.
//
// Each topic is a fixed number of append-only partition logs. Every
// consumer group keeps its own committed offset per (topic, partition);
// `poll` reads from that offset without advancing it, so anything a worker
// polled but did not commit is handed out again on the next poll.
//
// Logs are never truncated. They live for the life of the process, which
// is what lets a restarted consumer worker resume from its group's last
// commit. `FileEventBus` keeps the same log on disk for deployments that
// must survive a restart.

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

use super::log::{PartitionLog, StoredRecord};
use crate::Error;
use crate::events::MovieId;
use crate::traits::event_bus::{BusRecord, EventBus, RecordPosition};

/// In-process partitioned event log
#[derive(Debug, Clone)]
pub struct MemoryEventBus {
    partitions: usize,
    state: Arc<RwLock<PartitionLog>>,
    published: Arc<AtomicU64>,
}

impl MemoryEventBus {
    /// Create a bus with `partitions` partitions per topic (at least one)
    pub fn new(partitions: usize) -> Self {
        Self {
            partitions: partitions.max(1),
            state: Arc::new(RwLock::new(PartitionLog::default())),
            published: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Total records published since creation
    pub fn published_count(&self) -> u64 {
        self.published.load(Ordering::SeqCst)
    }

    /// Records in `partition` not yet committed by `group`
    pub async fn lag(&self, topic: &str, group: &str, partition: usize) -> u64 {
        self.state.read().await.lag(topic, group, partition)
    }
}

/// Reject partitions outside `0..partitions`
pub(crate) fn check_partition(partition: usize, partitions: usize) -> Result<(), Error> {
    if partition >= partitions {
        return Err(Error::bus(format!(
            "partition {} out of range (topic has {})",
            partition, partitions
        )));
    }
    Ok(())
}

#[async_trait]
impl EventBus for MemoryEventBus {
    async fn publish(
        &self,
        topic: &str,
        key: MovieId,
        payload: Vec<u8>,
    ) -> Result<RecordPosition, Error> {
        let partition = self.partition_for(key);
        let offset = self.state.write().await.append(
            topic,
            self.partitions,
            partition,
            StoredRecord { key, payload },
        )?;
        self.published.fetch_add(1, Ordering::SeqCst);

        tracing::trace!(topic, partition, offset, key = %key, "Published record");
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
        self.state
            .write()
            .await
            .commit(topic, group, partition, next_offset);
        Ok(())
    }

    fn partition_count(&self) -> usize {
        self.partitions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOPIC: &str = "movie-events";

    #[tokio::test]
    async fn same_key_same_partition_in_order() {
        let bus = MemoryEventBus::new(4);

        let a = bus.publish(TOPIC, MovieId(42), b"first".to_vec()).await.unwrap();
        let b = bus.publish(TOPIC, MovieId(42), b"second".to_vec()).await.unwrap();

        assert_eq!(a.partition, b.partition);
        assert_eq!((a.offset, b.offset), (0, 1));

        let records = bus.poll(TOPIC, "g", a.partition, 10).await.unwrap();
        let payloads: Vec<_> = records.iter().map(|r| r.payload.as_slice()).collect();
        assert_eq!(payloads, vec![&b"first"[..], &b"second"[..]]);
    }

    #[tokio::test]
    async fn negative_ids_map_to_valid_partitions() {
        let bus = MemoryEventBus::new(8);
        assert!(bus.partition_for(MovieId(-3)) < 8);
        assert!(bus.publish(TOPIC, MovieId(-3), vec![]).await.is_ok());
    }

    #[tokio::test]
    async fn uncommitted_records_are_redelivered() {
        let bus = MemoryEventBus::new(1);
        bus.publish(TOPIC, MovieId(1), b"x".to_vec()).await.unwrap();

        assert_eq!(bus.poll(TOPIC, "g", 0, 10).await.unwrap().len(), 1);
        assert_eq!(bus.poll(TOPIC, "g", 0, 10).await.unwrap().len(), 1);

        bus.commit(TOPIC, "g", 0, 1).await.unwrap();
        assert!(bus.poll(TOPIC, "g", 0, 10).await.unwrap().is_empty());
        assert_eq!(bus.lag(TOPIC, "g", 0).await, 0);
    }

    #[tokio::test]
    async fn groups_have_independent_offsets() {
        let bus = MemoryEventBus::new(1);
        bus.publish(TOPIC, MovieId(1), b"x".to_vec()).await.unwrap();

        bus.commit(TOPIC, "notifier", 0, 1).await.unwrap();
        assert!(bus.poll(TOPIC, "notifier", 0, 10).await.unwrap().is_empty());
        assert_eq!(bus.poll(TOPIC, "tracker", 0, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn commit_never_moves_backwards() {
        let bus = MemoryEventBus::new(1);
        for i in 0..3 {
            bus.publish(TOPIC, MovieId(i), vec![]).await.unwrap();
        }

        bus.commit(TOPIC, "g", 0, 3).await.unwrap();
        bus.commit(TOPIC, "g", 0, 1).await.unwrap();
        assert_eq!(bus.lag(TOPIC, "g", 0).await, 0);
    }

    #[tokio::test]
    async fn out_of_range_partition_is_an_error() {
        let bus = MemoryEventBus::new(2);
        assert!(matches!(bus.poll(TOPIC, "g", 2, 1).await, Err(Error::Bus(_))));
        assert!(matches!(bus.commit(TOPIC, "g", 5, 1).await, Err(Error::Bus(_))));
    }
}
