// # Store Implementations
//
// Snapshot stores for the change detector and an in-memory watch-list for
// tests and single-process deployments.

pub mod file;
pub mod memory;
pub mod watch_list;

pub use file::FileSnapshotStore;
pub use memory::MemorySnapshotStore;
pub use watch_list::MemoryWatchListStore;
