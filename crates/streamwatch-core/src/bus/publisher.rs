//! Typed producer for the movie event topic

use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::events::{MovieEvent, MovieId, Rating};
use crate::identity;
use crate::traits::event_bus::{EventBus, RecordPosition};

/// A user-initiated watch-list change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchListChange {
    Add,
    Rate,
    Delete,
}

/// Publishes [`MovieEvent`]s on one topic, keyed by movie id
#[derive(Clone)]
pub struct EventPublisher {
    bus: Arc<dyn EventBus>,
    topic: String,
}

impl fmt::Debug for EventPublisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventPublisher")
            .field("topic", &self.topic)
            .finish_non_exhaustive()
    }
}

impl EventPublisher {
    pub fn new(bus: Arc<dyn EventBus>, topic: impl Into<String>) -> Self {
        Self {
            bus,
            topic: topic.into(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Encode and publish `event` on the partition of its movie id
    pub async fn publish(&self, event: &MovieEvent) -> Result<RecordPosition> {
        let payload = event.encode()?;
        let position = self
            .bus
            .publish(&self.topic, event.movie_id(), payload)
            .await?;

        tracing::debug!(
            topic = %self.topic,
            event_type = %event.kind(),
            movie_id = %event.movie_id(),
            partition = position.partition,
            offset = position.offset,
            "Published event"
        );
        Ok(position)
    }

    /// Publish a movie-scoped provider change (no subject, no rating)
    pub async fn publish_providers_changed(&self, movie_id: MovieId) -> Result<RecordPosition> {
        self.publish(&MovieEvent::providers_changed(movie_id)).await
    }

    /// Publish a user-scoped watch-list event for the current caller
    ///
    /// The subject comes from the call's identity scope. Outside a scope
    /// this fails with `Error::Authentication` and nothing is published.
    pub async fn publish_watchlist_event(
        &self,
        change: WatchListChange,
        movie_id: MovieId,
        rating: Option<Rating>,
    ) -> Result<RecordPosition> {
        let user_id = identity::current_subject()
            .ok_or_else(|| Error::auth("no authenticated subject for this call"))?
            .into_inner();

        let event = match change {
            WatchListChange::Add => MovieEvent::Added { user_id, movie_id, rating },
            WatchListChange::Rate => MovieEvent::Rated { user_id, movie_id, rating },
            WatchListChange::Delete => MovieEvent::Deleted { user_id, movie_id, rating },
        };
        self.publish(&event).await
    }
}
