//! Test doubles and common utilities for contract tests
//!
//! These doubles stand in for the external collaborators (provider lookup,
//! watch-list, notification sink) and count how often they are called.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use streamwatch_core::config::DetectorConfig;
use streamwatch_core::error::{Error, Result};
use streamwatch_core::traits::{
    EventBus, MovieNotifyRequest, NotificationSink, ProviderLookup, WatchListMatch,
    WatchListStore,
};
use streamwatch_core::{
    ChangeDetector, DetectorEvent, EventPublisher, MemoryEventBus, MovieEvent, MovieId,
    ProviderEntry, ProviderSnapshot, SnapshotStore,
};
use tokio::sync::{Notify, mpsc};

pub const TOPIC: &str = "movie-events";

pub fn netflix() -> ProviderEntry {
    ProviderEntry::new(8, "Netflix")
}

pub fn apple_tv() -> ProviderEntry {
    ProviderEntry::new(2, "Apple TV").with_logo("/apple.jpg")
}

pub fn detector_config() -> DetectorConfig {
    DetectorConfig {
        lookup_timeout_secs: 1,
        ..DetectorConfig::default()
    }
}

/// Wire a detector over an in-memory bus
pub fn build_detector(
    lookup: Arc<dyn ProviderLookup>,
    store: Arc<dyn SnapshotStore>,
) -> (
    ChangeDetector,
    mpsc::Receiver<DetectorEvent>,
    MemoryEventBus,
) {
    let bus = MemoryEventBus::new(4);
    let (detector, events) = build_detector_on(lookup, store, Arc::new(bus.clone()));
    (detector, events, bus)
}

/// Wire a detector publishing to `bus`
pub fn build_detector_on(
    lookup: Arc<dyn ProviderLookup>,
    store: Arc<dyn SnapshotStore>,
    bus: Arc<dyn EventBus>,
) -> (ChangeDetector, mpsc::Receiver<DetectorEvent>) {
    let publisher = EventPublisher::new(bus, TOPIC);
    ChangeDetector::new(lookup, store, publisher, detector_config())
        .expect("default detector config is valid")
}

/// Every event on the topic, read with a throwaway group
pub async fn published_events(bus: &impl EventBus) -> Vec<MovieEvent> {
    let mut events = Vec::new();
    for partition in 0..bus.partition_count() {
        for record in bus
            .poll(TOPIC, "test-reader", partition, usize::MAX)
            .await
            .unwrap()
        {
            events.push(MovieEvent::decode(&record.payload).unwrap());
        }
    }
    events
}

/// Drain the detector's observer channel without waiting
pub fn drain_events(rx: &mut mpsc::Receiver<DetectorEvent>) -> Vec<DetectorEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

enum Scripted {
    Snapshot(ProviderSnapshot),
    Fail(String),
    Hang,
}

/// A lookup that answers from a per-movie script
///
/// Movies without a script answer with an empty snapshot.
pub struct ScriptedLookup {
    script: Mutex<HashMap<MovieId, Scripted>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedLookup {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(HashMap::new()),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn answer(&self, movie: i64, snapshot: ProviderSnapshot) {
        self.script
            .lock()
            .unwrap()
            .insert(MovieId(movie), Scripted::Snapshot(snapshot));
    }

    pub fn fail(&self, movie: i64, reason: &str) {
        self.script
            .lock()
            .unwrap()
            .insert(MovieId(movie), Scripted::Fail(reason.to_string()));
    }

    /// Never answer for `movie` (exercises the lookup timeout)
    pub fn hang(&self, movie: i64) {
        self.script
            .lock()
            .unwrap()
            .insert(MovieId(movie), Scripted::Hang);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderLookup for ScriptedLookup {
    async fn get_providers(&self, movie_id: MovieId, _region: &str) -> Result<ProviderSnapshot> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let answer = {
            let script = self.script.lock().unwrap();
            match script.get(&movie_id) {
                Some(Scripted::Snapshot(s)) => Some(Ok(s.clone())),
                Some(Scripted::Fail(reason)) => Some(Err(Error::lookup(reason.clone()))),
                Some(Scripted::Hang) => None,
                None => Some(Ok(ProviderSnapshot::default())),
            }
        };

        match answer {
            Some(answer) => answer,
            None => std::future::pending().await,
        }
    }

    fn lookup_name(&self) -> &'static str {
        "scripted"
    }
}

/// A lookup that blocks every call until released
pub struct GatedLookup {
    gate: Arc<Notify>,
    entered: Arc<Notify>,
    calls: Arc<AtomicUsize>,
}

impl GatedLookup {
    pub fn new() -> Self {
        Self {
            gate: Arc::new(Notify::new()),
            entered: Arc::new(Notify::new()),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Resolves once a lookup is blocked on the gate
    pub async fn wait_until_entered(&self) {
        self.entered.notified().await;
    }

    pub fn release_all(&self) {
        self.gate.notify_waiters();
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderLookup for GatedLookup {
    async fn get_providers(&self, _movie_id: MovieId, _region: &str) -> Result<ProviderSnapshot> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let released = self.gate.notified();
        self.entered.notify_one();
        released.await;
        Ok(ProviderSnapshot::flatrate(vec![netflix()]))
    }

    fn lookup_name(&self) -> &'static str {
        "gated"
    }
}

/// A sink that records every request
pub struct RecordingSink {
    requests: Arc<Mutex<Vec<MovieNotifyRequest>>>,
    calls: Arc<AtomicUsize>,
    fail: bool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self {
            requests: Arc::new(Mutex::new(Vec::new())),
            calls: Arc::new(AtomicUsize::new(0)),
            fail: false,
        }
    }

    /// A sink whose every call fails (after being recorded)
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    /// Create a sink that shares counters with an existing one
    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            requests: Arc::clone(&other.requests),
            calls: Arc::clone(&other.calls),
            fail: other.fail,
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<MovieNotifyRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn notify(&self, request: &MovieNotifyRequest) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        if self.fail {
            return Err(Error::notification("503 Service Unavailable"));
        }
        Ok(())
    }

    fn sink_name(&self) -> &'static str {
        "recording"
    }
}

/// A watch-list whose query always fails
pub struct UnavailableWatchList;

#[async_trait]
impl WatchListStore for UnavailableWatchList {
    async fn find_unwatched(&self, _movie_id: MovieId) -> Result<Vec<WatchListMatch>> {
        Err(Error::http("connection refused"))
    }
}

/// Give spawned workers a moment to run
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}
