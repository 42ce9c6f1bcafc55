// # Event Bus Trait
//
// Defines the partitioned event log shared by the detector (producer) and
// the consumer groups.
//
// ## Delivery Contract
//
// - Records with the same key land on the same partition and are read in
//   publish order. There is no ordering across partitions.
// - Each consumer group keeps its own committed offset per partition.
//   `poll` always starts at the committed offset, so a record that was
//   polled but not committed is delivered again (at-least-once).
// - Consumers commit only after handling a record.

use async_trait::async_trait;

use crate::events::MovieId;

/// Where a published record landed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordPosition {
    pub partition: usize,
    pub offset: u64,
}

/// A record read from a partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusRecord {
    pub partition: usize,
    pub offset: u64,
    pub key: MovieId,
    pub payload: Vec<u8>,
}

/// Trait for event bus implementations
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Append a record to `topic` on the partition owned by `key`
    async fn publish(
        &self,
        topic: &str,
        key: MovieId,
        payload: Vec<u8>,
    ) -> Result<RecordPosition, crate::Error>;

    /// Read up to `max` records for `group` from its committed offset
    async fn poll(
        &self,
        topic: &str,
        group: &str,
        partition: usize,
        max: usize,
    ) -> Result<Vec<BusRecord>, crate::Error>;

    /// Mark every record before `next_offset` as handled for `group`
    ///
    /// Committing an offset lower than the current one is a no-op.
    async fn commit(
        &self,
        topic: &str,
        group: &str,
        partition: usize,
        next_offset: u64,
    ) -> Result<(), crate::Error>;

    /// Number of partitions per topic
    fn partition_count(&self) -> usize;

    /// Partition owning `key`
    fn partition_for(&self, key: MovieId) -> usize {
        let partitions = self.partition_count().max(1) as i64;
        key.0.rem_euclid(partitions) as usize
    }
}
