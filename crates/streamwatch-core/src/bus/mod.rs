//! Event bus implementations and the typed producer
//!
//! - [`MemoryEventBus`]: in-process partitioned log with per-group offsets
//! - [`FileEventBus`]: the same log persisted to a JSON file
//! - [`EventPublisher`]: encodes [`MovieEvent`](crate::events::MovieEvent)s
//!   and publishes them keyed by movie id

pub mod file;
mod log;
pub mod memory;
pub mod publisher;

pub use file::FileEventBus;
pub use memory::MemoryEventBus;
pub use publisher::{EventPublisher, WatchListChange};
