//! Core traits for the streamwatch system
//!
//! This module defines the seams between the core and its collaborators.
//!
//! - [`ProviderLookup`]: Fetch current provider availability for a movie
//! - [`SnapshotStore`]: Last known availability per tracked movie
//! - [`WatchListStore`]: Resolve who still wants to watch a movie
//! - [`NotificationSink`]: Deliver one fan-out request
//! - [`EventBus`]: Partitioned, at-least-once event log
//! - [`EventHandler`]: What consumer workers run per event

pub mod event_bus;
pub mod event_handler;
pub mod notification_sink;
pub mod provider_lookup;
pub mod snapshot_store;
pub mod watch_list;

pub use event_bus::{BusRecord, EventBus, RecordPosition};
pub use event_handler::EventHandler;
pub use notification_sink::{MovieNotifyRequest, NotificationSink};
pub use provider_lookup::ProviderLookup;
pub use snapshot_store::{SnapshotRecord, SnapshotStore};
pub use watch_list::{WatchListEntry, WatchListMatch, WatchListStore};
