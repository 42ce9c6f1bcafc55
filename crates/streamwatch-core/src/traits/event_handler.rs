// # Event Handler Trait
//
// What a consumer worker calls for each decoded record. The worker commits
// the record's offset after `handle` returns, whatever the handler decided,
// so handlers must absorb their own failures (log and move on).

use async_trait::async_trait;

use crate::events::MovieEvent;

/// Trait for consumer-side event handlers
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Process one event; may be called more than once for the same event
    async fn handle(&self, event: MovieEvent);

    /// Handler name for logging (e.g. "fanout")
    fn handler_name(&self) -> &'static str;
}
