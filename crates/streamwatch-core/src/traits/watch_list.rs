// # Watch-List Store Trait
//
// Read-only view of the watch-list collaborator. The core never writes
// watch-list entries; it only asks which users still have a movie
// unwatched so it can address a notification.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::events::{MovieId, Rating};

/// A user's watch-list entry for one movie
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchListEntry {
    pub user_id: String,
    pub movie_id: MovieId,
    pub title: String,
    #[serde(default)]
    pub poster: Option<String>,
    /// `None` is treated the same as `Some(false)`
    #[serde(default)]
    pub watched: Option<bool>,
    #[serde(default)]
    pub rating: Option<Rating>,
}

impl WatchListEntry {
    pub fn new(user_id: impl Into<String>, movie_id: MovieId, title: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            movie_id,
            title: title.into(),
            poster: None,
            watched: None,
            rating: None,
        }
    }

    pub fn with_poster(mut self, poster: impl Into<String>) -> Self {
        self.poster = Some(poster.into());
        self
    }

    pub fn with_watched(mut self, watched: bool) -> Self {
        self.watched = Some(watched);
        self
    }

    /// Watched is false or unset
    pub fn is_unwatched(&self) -> bool {
        self.watched != Some(true)
    }

    /// Project to the query result shape
    pub fn to_match(&self) -> WatchListMatch {
        WatchListMatch {
            user_id: self.user_id.clone(),
            movie_id: self.movie_id,
            title: self.title.clone(),
            poster: self.poster.clone(),
        }
    }
}

/// One result of the "unwatched by movie" query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchListMatch {
    pub user_id: String,
    pub movie_id: MovieId,
    pub title: String,
    #[serde(default)]
    pub poster: Option<String>,
}

/// Trait for watch-list query implementations
#[async_trait]
pub trait WatchListStore: Send + Sync {
    /// Entries for `movie_id` whose watched flag is false or unset
    async fn find_unwatched(&self, movie_id: MovieId) -> Result<Vec<WatchListMatch>, crate::Error>;
}
