// # Consumer Workers
//
// Subscribe-and-poll loop over the event bus for one consumer group.
//
// A worker owns a fixed set of partitions. For each record it decodes the
// payload, hands the event to its handler, and only then commits the
// record's offset. A payload that does not decode is logged and committed
// (dropped); it never stops the worker. Records of one partition are
// handled strictly in offset order, which keeps a movie's events in
// publish order.
//
// Shutdown is cooperative: a worker finishes the record it is handling,
// then exits on the next check of the shutdown flag.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::error::Result;
use crate::events::MovieEvent;
use crate::traits::{BusRecord, EventBus, EventHandler};

const DEFAULT_BATCH: usize = 64;
const DEFAULT_IDLE_WAIT: Duration = Duration::from_millis(500);

/// One polling task of a consumer group
pub struct ConsumerWorker {
    id: usize,
    bus: Arc<dyn EventBus>,
    handler: Arc<dyn EventHandler>,
    topic: String,
    group: String,
    partitions: Vec<usize>,
    batch: usize,
    idle_wait: Duration,
}

impl ConsumerWorker {
    pub fn new(
        bus: Arc<dyn EventBus>,
        handler: Arc<dyn EventHandler>,
        topic: impl Into<String>,
        group: impl Into<String>,
        partitions: Vec<usize>,
    ) -> Self {
        Self {
            id: 0,
            bus,
            handler,
            topic: topic.into(),
            group: group.into(),
            partitions,
            batch: DEFAULT_BATCH,
            idle_wait: DEFAULT_IDLE_WAIT,
        }
    }

    pub fn with_batch(mut self, batch: usize) -> Self {
        self.batch = batch.max(1);
        self
    }

    pub fn with_idle_wait(mut self, idle_wait: Duration) -> Self {
        self.idle_wait = idle_wait;
        self
    }

    fn with_id(mut self, id: usize) -> Self {
        self.id = id;
        self
    }

    /// Partitions this worker reads
    pub fn partitions(&self) -> &[usize] {
        &self.partitions
    }

    /// Poll every owned partition once and process what is there
    ///
    /// Returns the number of records consumed (including dropped ones).
    pub async fn drain_once(&self) -> Result<usize> {
        let mut consumed = 0;
        for &partition in &self.partitions {
            let records = self
                .bus
                .poll(&self.topic, &self.group, partition, self.batch)
                .await?;

            for record in records {
                let next_offset = record.offset + 1;
                self.process(record).await;
                self.bus
                    .commit(&self.topic, &self.group, partition, next_offset)
                    .await?;
                consumed += 1;
            }
        }
        Ok(consumed)
    }

    async fn process(&self, record: BusRecord) {
        let event = match MovieEvent::decode(&record.payload) {
            Ok(event) => event,
            Err(e) => {
                error!(
                    group = %self.group,
                    partition = record.partition,
                    offset = record.offset,
                    key = %record.key,
                    error = %e,
                    "Dropping malformed event"
                );
                return;
            }
        };

        debug!(
            group = %self.group,
            handler = self.handler.handler_name(),
            event_type = %event.kind(),
            movie_id = %event.movie_id(),
            partition = record.partition,
            offset = record.offset,
            "Handling event"
        );
        self.handler.handle(event).await;
    }

    /// Poll until `shutdown` becomes true
    pub async fn run_with_shutdown(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            group = %self.group,
            worker = self.id,
            partitions = ?self.partitions,
            "Consumer worker started"
        );

        while !*shutdown.borrow() {
            let idle = match self.drain_once().await {
                Ok(0) => true,
                Ok(_) => false,
                Err(e) => {
                    error!(group = %self.group, worker = self.id, error = %e, "Polling failed");
                    true
                }
            };

            if idle {
                tokio::select! {
                    _ = tokio::time::sleep(self.idle_wait) => {}
                    changed = shutdown.changed() => {
                        // Sender gone counts as shutdown
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
        }

        info!(group = %self.group, worker = self.id, "Consumer worker stopped");
    }
}

/// The workers of one consumer group, sharing a topic's partitions
///
/// Partition `p` is read by worker `p % workers`, so every partition has
/// exactly one reader within the group.
pub struct ConsumerGroup {
    group: String,
    workers: Vec<Arc<ConsumerWorker>>,
}

impl ConsumerGroup {
    pub fn new(
        bus: Arc<dyn EventBus>,
        handler: Arc<dyn EventHandler>,
        topic: &str,
        group: &str,
        workers: usize,
    ) -> Self {
        Self::with_settings(bus, handler, topic, group, workers, DEFAULT_BATCH, DEFAULT_IDLE_WAIT)
    }

    pub fn with_settings(
        bus: Arc<dyn EventBus>,
        handler: Arc<dyn EventHandler>,
        topic: &str,
        group: &str,
        workers: usize,
        batch: usize,
        idle_wait: Duration,
    ) -> Self {
        let partitions = bus.partition_count().max(1);
        let workers = workers.clamp(1, partitions);

        let mut assignments = vec![Vec::new(); workers];
        for partition in 0..partitions {
            assignments[partition % workers].push(partition);
        }

        let workers = assignments
            .into_iter()
            .enumerate()
            .map(|(id, owned)| {
                Arc::new(
                    ConsumerWorker::new(bus.clone(), handler.clone(), topic, group, owned)
                        .with_batch(batch)
                        .with_idle_wait(idle_wait)
                        .with_id(id),
                )
            })
            .collect();

        Self {
            group: group.to_string(),
            workers,
        }
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn workers(&self) -> &[Arc<ConsumerWorker>] {
        &self.workers
    }

    /// Drain every worker once, in worker order
    pub async fn drain_once(&self) -> Result<usize> {
        let mut consumed = 0;
        for worker in &self.workers {
            consumed += worker.drain_once().await?;
        }
        Ok(consumed)
    }

    /// Spawn one task per worker
    pub fn spawn(&self, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        self.workers
            .iter()
            .map(|worker| {
                let worker = worker.clone();
                let shutdown = shutdown.clone();
                tokio::spawn(async move { worker.run_with_shutdown(shutdown).await })
            })
            .collect()
    }
}
