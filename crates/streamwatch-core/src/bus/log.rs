// # Partition Log
//
// The state behind both bus implementations: per-topic partition logs and
// per-group committed offsets. Serializable so the file bus can persist it
// as one document.
//
// Payloads are stored base64-encoded in JSON; they are opaque bytes to the
// bus and a malformed payload must survive a reload unchanged.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

use crate::Error;
use crate::events::MovieId;
use crate::traits::event_bus::BusRecord;

mod payload_base64 {
    use super::*;
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(d)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct StoredRecord {
    pub key: MovieId,
    #[serde(with = "payload_base64")]
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct PartitionLog {
    /// topic -> partition -> records
    #[serde(default)]
    topics: BTreeMap<String, Vec<Vec<StoredRecord>>>,
    /// topic -> group -> partition -> next offset to deliver
    #[serde(default)]
    committed: BTreeMap<String, BTreeMap<String, BTreeMap<usize, u64>>>,
}

impl PartitionLog {
    /// Append to `partition` of `topic`, creating the topic with
    /// `partitions` empty logs on first use
    pub fn append(
        &mut self,
        topic: &str,
        partitions: usize,
        partition: usize,
        record: StoredRecord,
    ) -> Result<u64, Error> {
        let log = self
            .topics
            .entry(topic.to_string())
            .or_insert_with(|| vec![Vec::new(); partitions])
            .get_mut(partition)
            .ok_or_else(|| Error::bus(format!("partition {} missing", partition)))?;

        log.push(record);
        Ok(log.len() as u64 - 1)
    }

    pub fn committed(&self, topic: &str, group: &str, partition: usize) -> u64 {
        self.committed
            .get(topic)
            .and_then(|groups| groups.get(group))
            .and_then(|offsets| offsets.get(&partition))
            .copied()
            .unwrap_or(0)
    }

    /// Up to `max` records from the group's committed offset
    pub fn read(&self, topic: &str, group: &str, partition: usize, max: usize) -> Vec<BusRecord> {
        let Some(log) = self.topics.get(topic).and_then(|parts| parts.get(partition)) else {
            return Vec::new();
        };
        let start = self.committed(topic, group, partition);

        log.iter()
            .enumerate()
            .skip(start as usize)
            .take(max)
            .map(|(offset, record)| BusRecord {
                partition,
                offset: offset as u64,
                key: record.key,
                payload: record.payload.clone(),
            })
            .collect()
    }

    /// Advance the group's offset; returns false when it would move backwards
    pub fn commit(&mut self, topic: &str, group: &str, partition: usize, next_offset: u64) -> bool {
        let committed = self
            .committed
            .entry(topic.to_string())
            .or_default()
            .entry(group.to_string())
            .or_default()
            .entry(partition)
            .or_insert(0);
        if next_offset > *committed {
            *committed = next_offset;
            true
        } else {
            false
        }
    }

    pub fn lag(&self, topic: &str, group: &str, partition: usize) -> u64 {
        let end = self
            .topics
            .get(topic)
            .and_then(|parts| parts.get(partition))
            .map_or(0, |log| log.len() as u64);
        end.saturating_sub(self.committed(topic, group, partition))
    }

    /// Partition count of the stored topics, if any topic exists
    pub fn partition_count(&self) -> Option<usize> {
        self.topics.values().map(Vec::len).max()
    }

    /// Records across all topics and partitions
    pub fn record_count(&self) -> u64 {
        self.topics
            .values()
            .flat_map(|parts| parts.iter())
            .map(|log| log.len() as u64)
            .sum()
    }
}
