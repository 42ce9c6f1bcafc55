//! Contract Test: Session Identity
//!
//! Constraints verified:
//! - A signed token is accepted before its expiry and rejected at or after it
//! - A token is rejected under any other key
//! - Rejected calls never run their handler
//! - Concurrent calls see only their own subject
//! - The subject is gone once the call ends, including on error

mod common;

use chrono::{Duration, TimeZone, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use streamwatch_core::bus::WatchListChange;
use streamwatch_core::identity::{self, authenticate, current_subject};
use streamwatch_core::{
    Error, EventPublisher, MemoryEventBus, MovieEvent, MovieId, SessionKey, Subject,
    TokenSigner, TokenVerifier,
};

fn signer_with_key(byte: u8) -> TokenSigner {
    TokenSigner::new(
        SessionKey::from_bytes(vec![byte; 32]).unwrap(),
        Duration::hours(10),
    )
}

fn t0() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap()
}

#[test]
fn token_round_trip_respects_expiry_and_key() {
    let signer = signer_with_key(3);
    let token = signer.sign("alice", t0()).unwrap();
    let expiry = t0() + Duration::hours(10);

    let verifier = signer.verifier();
    assert!(verifier.verify(&token, t0()).is_ok());
    assert!(verifier.verify(&token, expiry - Duration::seconds(1)).is_ok());
    assert!(verifier.verify(&token, expiry).is_err());

    for other in [0u8, 4, 255] {
        let other_verifier = TokenVerifier::new(SessionKey::from_bytes(vec![other; 32]).unwrap());
        assert!(other_verifier.verify(&token, t0()).is_err());
    }
}

#[tokio::test]
async fn valid_bearer_runs_handler_with_subject() {
    let signer = signer_with_key(1);
    let header = format!("Bearer {}", signer.sign("alice", t0()).unwrap());

    let seen = authenticate(Some(&header), &signer.verifier(), t0(), async {
        current_subject()
    })
    .await
    .unwrap();

    assert_eq!(seen, Some(Subject::new("alice")));
    assert_eq!(current_subject(), None);
}

#[tokio::test]
async fn rejected_calls_never_run_handler() {
    let signer = signer_with_key(1);
    let verifier = signer.verifier();
    let token = signer.sign("alice", t0()).unwrap();
    let forged = signer_with_key(2).sign("alice", t0()).unwrap();
    let ran = Arc::new(AtomicUsize::new(0));

    let headers = [
        None,
        Some(token.clone()),                    // missing "Bearer "
        Some(format!("Bearer {}", forged)),     // wrong key
        Some("Bearer not.a.token".to_string()), // garbage
    ];

    for header in &headers {
        let ran = ran.clone();
        let result = authenticate(header.as_deref(), &verifier, t0(), async move {
            ran.fetch_add(1, Ordering::SeqCst);
        })
        .await;
        assert!(
            matches!(result, Err(Error::Authentication(_))),
            "header {:?} should be rejected",
            header
        );
    }

    // Expired
    let expired = format!("Bearer {}", token);
    let result = authenticate(Some(&expired), &verifier, t0() + Duration::hours(11), async {})
        .await;
    assert!(matches!(result, Err(Error::Authentication(_))));

    assert_eq!(ran.load(Ordering::SeqCst), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_calls_have_independent_scopes() {
    let signer = signer_with_key(1);
    let verifier = Arc::new(signer.verifier());

    let mut calls = Vec::new();
    for i in 0..32 {
        let user = format!("user-{}", i);
        let header = format!("Bearer {}", signer.sign(&user, t0()).unwrap());
        let verifier = verifier.clone();
        calls.push(tokio::spawn(async move {
            authenticate(Some(&header), &verifier, t0(), async {
                // Interleave with the other calls
                for _ in 0..5 {
                    tokio::task::yield_now().await;
                    assert_eq!(current_subject().map(Subject::into_inner), Some(user.clone()));
                }
                user.clone()
            })
            .await
            .unwrap()
        }));
    }

    for (i, call) in calls.into_iter().enumerate() {
        assert_eq!(call.await.unwrap(), format!("user-{}", i));
    }
}

#[tokio::test]
async fn scope_is_torn_down_after_failing_handler() {
    let result: Result<Result<(), Error>, Error> =
        identity::scope(Subject::new("alice"), async { Err(Error::store("boom")) }).await;

    assert!(matches!(result, Ok(Err(Error::Store(_)))));
    assert_eq!(current_subject(), None);
}

#[tokio::test]
async fn authenticated_call_publishes_with_its_subject() {
    let bus = MemoryEventBus::new(2);
    let publisher = EventPublisher::new(Arc::new(bus.clone()), common::TOPIC);
    let signer = signer_with_key(9);
    let header = format!("Bearer {}", signer.sign("bob", t0()).unwrap());

    authenticate(Some(&header), &signer.verifier(), t0(), async {
        publisher
            .publish_watchlist_event(WatchListChange::Add, MovieId(550), None)
            .await
    })
    .await
    .unwrap()
    .unwrap();

    let events = common::published_events(&bus).await;
    assert_eq!(
        events,
        vec![MovieEvent::Added {
            user_id: "bob".to_string(),
            movie_id: MovieId(550),
            rating: None,
        }]
    );
}
