// # Memory Watch-List Store
//
// In-memory watch-list keyed by (user, movie). Used by tests and by
// single-process deployments that keep the watch-list alongside the core.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::events::{MovieId, Rating};
use crate::traits::watch_list::{WatchListEntry, WatchListMatch, WatchListStore};

#[derive(Debug, Clone, Default)]
pub struct MemoryWatchListStore {
    entries: Arc<RwLock<BTreeMap<(String, MovieId), WatchListEntry>>>,
}

impl MemoryWatchListStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry for (user, movie)
    pub async fn upsert(&self, entry: WatchListEntry) {
        let key = (entry.user_id.clone(), entry.movie_id);
        self.entries.write().await.insert(key, entry);
    }

    /// Set the watched flag; returns false if the entry does not exist
    pub async fn mark_watched(&self, user_id: &str, movie_id: MovieId, watched: bool) -> bool {
        let mut guard = self.entries.write().await;
        match guard.get_mut(&(user_id.to_string(), movie_id)) {
            Some(entry) => {
                entry.watched = Some(watched);
                true
            }
            None => false,
        }
    }

    /// Set the rating; returns false if the entry does not exist
    pub async fn rate(&self, user_id: &str, movie_id: MovieId, rating: Rating) -> bool {
        let mut guard = self.entries.write().await;
        match guard.get_mut(&(user_id.to_string(), movie_id)) {
            Some(entry) => {
                entry.rating = Some(rating);
                true
            }
            None => false,
        }
    }

    pub async fn remove(&self, user_id: &str, movie_id: MovieId) -> Option<WatchListEntry> {
        self.entries
            .write()
            .await
            .remove(&(user_id.to_string(), movie_id))
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl WatchListStore for MemoryWatchListStore {
    async fn find_unwatched(&self, movie_id: MovieId) -> Result<Vec<WatchListMatch>, Error> {
        let guard = self.entries.read().await;
        Ok(guard
            .values()
            .filter(|e| e.movie_id == movie_id && e.is_unwatched())
            .map(WatchListEntry::to_match)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unset_watched_counts_as_unwatched() {
        let store = MemoryWatchListStore::new();
        store
            .upsert(WatchListEntry::new("alice", MovieId(42), "Fight Club"))
            .await;
        store
            .upsert(WatchListEntry::new("bob", MovieId(42), "Fight Club").with_watched(true))
            .await;
        store
            .upsert(WatchListEntry::new("carol", MovieId(42), "Fight Club").with_watched(false))
            .await;
        store
            .upsert(WatchListEntry::new("alice", MovieId(7), "Se7en"))
            .await;

        let users: Vec<String> = store
            .find_unwatched(MovieId(42))
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.user_id)
            .collect();
        assert_eq!(users, vec!["alice".to_string(), "carol".to_string()]);
    }

    #[tokio::test]
    async fn mark_watched_removes_from_results() {
        let store = MemoryWatchListStore::new();
        store
            .upsert(WatchListEntry::new("alice", MovieId(42), "Fight Club"))
            .await;

        assert!(store.mark_watched("alice", MovieId(42), true).await);
        assert!(!store.mark_watched("nobody", MovieId(42), true).await);
        assert!(store.find_unwatched(MovieId(42)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rate_and_remove() {
        let store = MemoryWatchListStore::new();
        store
            .upsert(WatchListEntry::new("alice", MovieId(42), "Fight Club"))
            .await;

        assert!(store.rate("alice", MovieId(42), Rating::new(5).unwrap()).await);
        let removed = store.remove("alice", MovieId(42)).await.unwrap();
        assert_eq!(removed.rating.map(Rating::value), Some(5));
        assert!(store.is_empty().await);
    }
}
