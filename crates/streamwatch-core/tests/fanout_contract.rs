//! Contract Test: Fan-out Dispatch
//!
//! Constraints verified:
//! - Only users with the movie unwatched are notified
//! - Exactly one notification call per provider change, zero when nobody
//!   is watching
//! - Replaying a change notifies again without error
//! - A failing sink is not retried
//! - User-scoped event kinds never notify

mod common;

use common::*;
use std::sync::Arc;
use std::time::Duration;
use streamwatch_core::dispatcher::DispatchOutcome;
use streamwatch_core::traits::WatchListEntry;
use streamwatch_core::{EventKind, FanoutDispatcher, MemoryWatchListStore, MovieEvent, MovieId};

fn dispatcher(watch_list: &MemoryWatchListStore, sink: &RecordingSink) -> FanoutDispatcher {
    FanoutDispatcher::new(
        Arc::new(watch_list.clone()),
        Arc::new(RecordingSink::sharing_counters_with(sink)),
        Duration::from_secs(1),
    )
}

#[tokio::test]
async fn notifies_only_unwatched_users() {
    let watch_list = MemoryWatchListStore::new();
    watch_list
        .upsert(
            WatchListEntry::new("userA", MovieId(42), "Fight Club")
                .with_poster("/fc.jpg")
                .with_watched(false),
        )
        .await;
    watch_list
        .upsert(
            WatchListEntry::new("userB", MovieId(42), "Fight Club")
                .with_poster("/fc.jpg")
                .with_watched(true),
        )
        .await;
    let sink = RecordingSink::new();

    let outcome = dispatcher(&watch_list, &sink)
        .dispatch(&MovieEvent::providers_changed(MovieId(42)))
        .await;

    assert_eq!(outcome, DispatchOutcome::Notified { recipients: 1 });
    assert_eq!(sink.call_count(), 1);
    let request = &sink.requests()[0];
    assert_eq!(request.user_ids, vec!["userA".to_string()]);
    assert_eq!(request.movie_title, "Fight Club");
    assert_eq!(request.movie_poster, "/fc.jpg");
}

#[tokio::test]
async fn no_watchers_means_no_call() {
    let watch_list = MemoryWatchListStore::new();
    watch_list
        .upsert(WatchListEntry::new("userB", MovieId(42), "Fight Club").with_watched(true))
        .await;
    let sink = RecordingSink::new();

    let outcome = dispatcher(&watch_list, &sink)
        .dispatch(&MovieEvent::providers_changed(MovieId(42)))
        .await;

    assert_eq!(outcome, DispatchOutcome::NoWatchers);
    assert_eq!(sink.call_count(), 0);
}

#[tokio::test]
async fn one_call_for_many_users() {
    let watch_list = MemoryWatchListStore::new();
    for user in ["ann", "ben", "cat"] {
        watch_list
            .upsert(WatchListEntry::new(user, MovieId(550), "Fight Club"))
            .await;
    }
    let sink = RecordingSink::new();

    dispatcher(&watch_list, &sink)
        .dispatch(&MovieEvent::providers_changed(MovieId(550)))
        .await;

    assert_eq!(sink.call_count(), 1);
    let request = &sink.requests()[0];
    assert_eq!(request.user_ids.len(), 3);
    // Missing poster is sent as an empty string
    assert_eq!(request.movie_poster, "");
}

#[tokio::test]
async fn replay_notifies_again() {
    let watch_list = MemoryWatchListStore::new();
    watch_list
        .upsert(WatchListEntry::new("userA", MovieId(42), "Fight Club"))
        .await;
    let sink = RecordingSink::new();
    let dispatcher = dispatcher(&watch_list, &sink);
    let event = MovieEvent::providers_changed(MovieId(42));

    assert_eq!(
        dispatcher.dispatch(&event).await,
        DispatchOutcome::Notified { recipients: 1 }
    );
    assert_eq!(
        dispatcher.dispatch(&event).await,
        DispatchOutcome::Notified { recipients: 1 }
    );
    assert_eq!(sink.call_count(), 2);
}

#[tokio::test]
async fn failed_notification_is_not_retried() {
    let watch_list = MemoryWatchListStore::new();
    watch_list
        .upsert(WatchListEntry::new("userA", MovieId(42), "Fight Club"))
        .await;
    let sink = RecordingSink::failing();

    let outcome = dispatcher(&watch_list, &sink)
        .dispatch(&MovieEvent::providers_changed(MovieId(42)))
        .await;

    assert_eq!(outcome, DispatchOutcome::NotifyFailed);
    assert_eq!(sink.call_count(), 1);
}

#[tokio::test]
async fn unavailable_watch_list_skips_notification() {
    let sink = RecordingSink::new();
    let dispatcher = FanoutDispatcher::new(
        Arc::new(UnavailableWatchList),
        Arc::new(RecordingSink::sharing_counters_with(&sink)),
        Duration::from_secs(1),
    );

    let outcome = dispatcher
        .dispatch(&MovieEvent::providers_changed(MovieId(42)))
        .await;

    assert_eq!(outcome, DispatchOutcome::WatchListUnavailable);
    assert_eq!(sink.call_count(), 0);
}

#[tokio::test]
async fn user_scoped_events_are_ignored() {
    let watch_list = MemoryWatchListStore::new();
    watch_list
        .upsert(WatchListEntry::new("userA", MovieId(42), "Fight Club"))
        .await;
    let sink = RecordingSink::new();
    let dispatcher = dispatcher(&watch_list, &sink);

    let added = MovieEvent::Added {
        user_id: "userA".to_string(),
        movie_id: MovieId(42),
        rating: None,
    };
    assert_eq!(
        dispatcher.dispatch(&added).await,
        DispatchOutcome::Ignored(EventKind::Add)
    );
    assert_eq!(sink.call_count(), 0);
}
