//! Fan-out dispatcher
//!
//! Turns one PROVIDERS_CHANGED event into at most one notification call:
//!
//! 1. Ask the watch-list who still has the movie unwatched
//! 2. Nobody: log and stop
//! 3. Otherwise collect the distinct user ids, take title and poster from
//!    the first match, and call the notification sink once
//!
//! Recipients are always resolved at consumption time. A failed call is
//! logged and dropped; there is no retry and the event is not republished.
//! ADD, RATE and DELETE are ignored here.
//!
//! Replaying an event repeats the whole resolution and notifies again.

pub mod consumer;

pub use consumer::{ConsumerGroup, ConsumerWorker};

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::events::{EventKind, MovieEvent, MovieId};
use crate::traits::{EventHandler, MovieNotifyRequest, NotificationSink, WatchListStore};

/// What the dispatcher did with one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Not a provider change
    Ignored(EventKind),
    /// Nobody has the movie unwatched
    NoWatchers,
    /// One notification call succeeded
    Notified { recipients: usize },
    /// The notification call failed or timed out
    NotifyFailed,
    /// The watch-list query failed or timed out
    WatchListUnavailable,
}

/// Resolves watchers for a provider change and notifies them once
pub struct FanoutDispatcher {
    watch_list: Arc<dyn WatchListStore>,
    sink: Arc<dyn NotificationSink>,
    call_timeout: Duration,
}

impl FanoutDispatcher {
    /// `call_timeout` bounds both the watch-list query and the notify call
    pub fn new(
        watch_list: Arc<dyn WatchListStore>,
        sink: Arc<dyn NotificationSink>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            watch_list,
            sink,
            call_timeout,
        }
    }

    pub async fn dispatch(&self, event: &MovieEvent) -> DispatchOutcome {
        match event {
            MovieEvent::ProvidersChanged { movie_id } => self.fan_out(*movie_id).await,
            MovieEvent::Added { .. } | MovieEvent::Rated { .. } | MovieEvent::Deleted { .. } => {
                DispatchOutcome::Ignored(event.kind())
            }
        }
    }

    async fn fan_out(&self, movie_id: MovieId) -> DispatchOutcome {
        let matches = match tokio::time::timeout(
            self.call_timeout,
            self.watch_list.find_unwatched(movie_id),
        )
        .await
        {
            Ok(Ok(matches)) => matches,
            Ok(Err(e)) => {
                error!(movie_id = %movie_id, error = %e, "Watch-list query failed, dropping change");
                return DispatchOutcome::WatchListUnavailable;
            }
            Err(_) => {
                error!(movie_id = %movie_id, timeout = ?self.call_timeout, "Watch-list query timed out, dropping change");
                return DispatchOutcome::WatchListUnavailable;
            }
        };

        let Some(first) = matches.first() else {
            warn!(movie_id = %movie_id, "No unwatched entries for movie, nothing to notify");
            return DispatchOutcome::NoWatchers;
        };

        let mut seen = HashSet::new();
        let user_ids: Vec<String> = matches
            .iter()
            .filter(|m| seen.insert(m.user_id.as_str()))
            .map(|m| m.user_id.clone())
            .collect();

        let request = MovieNotifyRequest {
            user_ids,
            movie_title: first.title.clone(),
            movie_poster: first.poster.clone().unwrap_or_default(),
        };
        let recipients = request.user_ids.len();

        match tokio::time::timeout(self.call_timeout, self.sink.notify(&request)).await {
            Ok(Ok(())) => {
                info!(
                    movie_id = %movie_id,
                    recipients,
                    sink = self.sink.sink_name(),
                    "Sent provider change notification"
                );
                DispatchOutcome::Notified { recipients }
            }
            Ok(Err(e)) => {
                error!(movie_id = %movie_id, recipients, error = %e, "Notification call failed");
                DispatchOutcome::NotifyFailed
            }
            Err(_) => {
                error!(movie_id = %movie_id, recipients, timeout = ?self.call_timeout, "Notification call timed out");
                DispatchOutcome::NotifyFailed
            }
        }
    }
}

#[async_trait]
impl EventHandler for FanoutDispatcher {
    async fn handle(&self, event: MovieEvent) {
        self.dispatch(&event).await;
    }

    fn handler_name(&self) -> &'static str {
        "fanout"
    }
}
