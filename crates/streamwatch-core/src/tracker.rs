//! Movie tracking consumer
//!
//! Runs as its own consumer group on the movie topic. When a user adds a
//! movie to their watch-list, the movie becomes tracked (with an absent
//! snapshot) so the next sweep starts polling it. Movies are never
//! untracked, so DELETE is ignored like RATE and PROVIDERS_CHANGED.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info};

use crate::events::MovieEvent;
use crate::traits::{EventHandler, SnapshotStore};

/// What the tracker did with one event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackOutcome {
    NewlyTracked,
    AlreadyTracked,
    Ignored,
    Failed,
}

pub struct MovieTracker {
    store: Arc<dyn SnapshotStore>,
}

impl MovieTracker {
    pub fn new(store: Arc<dyn SnapshotStore>) -> Self {
        Self { store }
    }

    pub async fn track(&self, event: &MovieEvent) -> TrackOutcome {
        let MovieEvent::Added { movie_id, .. } = event else {
            return TrackOutcome::Ignored;
        };

        match self.store.track(*movie_id).await {
            Ok(true) => {
                info!(movie_id = %movie_id, "Now tracking movie");
                TrackOutcome::NewlyTracked
            }
            Ok(false) => TrackOutcome::AlreadyTracked,
            Err(e) => {
                error!(movie_id = %movie_id, error = %e, "Failed to track movie");
                TrackOutcome::Failed
            }
        }
    }
}

#[async_trait]
impl EventHandler for MovieTracker {
    async fn handle(&self, event: MovieEvent) {
        self.track(&event).await;
    }

    fn handler_name(&self) -> &'static str {
        "tracker"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::MovieId;
    use crate::state::MemorySnapshotStore;

    fn added(movie: i64) -> MovieEvent {
        MovieEvent::Added {
            user_id: "alice".to_string(),
            movie_id: MovieId(movie),
            rating: None,
        }
    }

    #[tokio::test]
    async fn add_tracks_once() {
        let store = Arc::new(MemorySnapshotStore::new());
        let tracker = MovieTracker::new(store.clone());

        assert_eq!(tracker.track(&added(42)).await, TrackOutcome::NewlyTracked);
        assert_eq!(tracker.track(&added(42)).await, TrackOutcome::AlreadyTracked);
        assert_eq!(store.tracked_movies().await.unwrap(), vec![MovieId(42)]);
    }

    #[tokio::test]
    async fn other_kinds_are_ignored() {
        let store = Arc::new(MemorySnapshotStore::new());
        let tracker = MovieTracker::new(store.clone());

        let deleted = MovieEvent::Deleted {
            user_id: "alice".to_string(),
            movie_id: MovieId(1),
            rating: None,
        };
        assert_eq!(tracker.track(&deleted).await, TrackOutcome::Ignored);
        assert_eq!(
            tracker.track(&MovieEvent::providers_changed(MovieId(2))).await,
            TrackOutcome::Ignored
        );
        assert!(store.is_empty().await);
    }
}
