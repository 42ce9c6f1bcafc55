// # Notification Sink Trait
//
// Defines the outbound fan-out call made once per provider change.
//
// ## Wire Format
//
// ```json
// {"userIds": ["alice", "bob"], "movieTitle": "Fight Club", "moviePoster": "/poster.jpg"}
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Body of a fan-out request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieNotifyRequest {
    /// Distinct recipients
    pub user_ids: Vec<String>,
    /// Movie display title
    pub movie_title: String,
    /// Poster path, relative to the metadata source's image base URL
    pub movie_poster: String,
}

/// Trait for notification sink implementations
///
/// Delivery is fire-and-forget from the core's perspective: only success
/// or failure of the call matters. Implementations must not retry; the
/// dispatcher logs failures and moves on.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Issue one fan-out request
    async fn notify(&self, request: &MovieNotifyRequest) -> Result<(), crate::Error>;

    /// Sink name for logging (e.g. "http")
    fn sink_name(&self) -> &'static str;
}
