// # streamwatch-core
//
// Core library for tracking which streaming providers offer a movie and
// notifying the users who still want to watch it when that changes.
//
// ## Architecture Overview
//
// - **ProviderLookup**: Trait for fetching current provider availability
// - **SnapshotStore**: Last known availability per tracked movie
// - **WatchListStore**: Read-only view of who has a movie unwatched
// - **NotificationSink**: Outbound fan-out request delivery
// - **EventBus**: Partitioned, at-least-once event log keyed by movie id
// - **ChangeDetector**: Sweeps tracked movies, diffs, persists and emits
// - **FanoutDispatcher**: Resolves watchers for a change and notifies once
// - **MovieTracker**: Registers newly added movies for polling
// - **TokenVerifier** / **identity**: Session token checks and the per-call
//   subject scope
//
// ## Data Flow
//
// ```text
// ChangeDetector ──► SnapshotStore (read/write)
//        │
//        └──► EventBus ──► ConsumerWorker ──► FanoutDispatcher ──► WatchListStore
//                                                     │
//                                                     └──► NotificationSink
// ```

pub mod bus;
pub mod config;
pub mod detector;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod identity;
mod persist;
pub mod snapshot;
pub mod state;
pub mod token;
pub mod tracker;
pub mod traits;

// Re-export core types for convenience
pub use bus::{EventPublisher, FileEventBus, MemoryEventBus};
pub use config::StreamwatchConfig;
pub use detector::{ChangeDetector, DetectorEvent, SweepOutcome, SweepReport};
pub use dispatcher::{ConsumerGroup, ConsumerWorker, DispatchOutcome, FanoutDispatcher};
pub use error::{Error, Result};
pub use events::{EventKind, MovieEvent, MovieId, Rating};
pub use identity::Subject;
pub use snapshot::{ProviderEntry, ProviderSnapshot, SnapshotDiff};
pub use state::{FileSnapshotStore, MemorySnapshotStore, MemoryWatchListStore};
pub use token::{InvalidToken, SessionKey, TokenSigner, TokenVerifier};
pub use tracker::MovieTracker;
pub use traits::{EventBus, NotificationSink, ProviderLookup, SnapshotStore, WatchListStore};
