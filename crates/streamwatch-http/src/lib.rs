// # HTTP Collaborators
//
// Clients for the two services the fan-out dispatcher talks to.
//
// - `HttpNotificationSink`: POST `{base}/notify` with a `MovieNotifyRequest`
//   body; only the status matters, the response body is ignored
// - `HttpWatchListClient`: GET `{base}/watchlist/unwatched?movieId={id}`
//   returning `[{userId, movieId, title, poster}]`
//
// Both make exactly one request per call and never retry. The dispatcher
// bounds each call with its own timeout in addition to the client timeout
// configured here.

use async_trait::async_trait;
use std::time::Duration;
use streamwatch_core::traits::{
    MovieNotifyRequest, NotificationSink, WatchListMatch, WatchListStore,
};
use streamwatch_core::{Error, MovieId, Result};

const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| Error::http(format!("failed to build HTTP client: {}", e)))
}

fn trim_base(base_url: impl Into<String>) -> String {
    base_url.into().trim_end_matches('/').to_string()
}

/// Map a non-success status to an error message suffix
fn describe_status(status: reqwest::StatusCode) -> String {
    match status.as_u16() {
        401 | 403 => format!("rejected credentials (status {})", status),
        404 => format!("endpoint not found (status {})", status),
        429 => format!("rate limited (status {})", status),
        500..=599 => format!("server error (transient): {}", status),
        _ => format!("unexpected status {}", status),
    }
}

/// Notification sink over the notification service's HTTP API
#[derive(Debug, Clone)]
pub struct HttpNotificationSink {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpNotificationSink {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_HTTP_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base = trim_base(base_url);
        if base.is_empty() {
            return Err(Error::config("notification service URL cannot be empty"));
        }
        Ok(Self {
            endpoint: format!("{}/notify", base),
            client: build_client(timeout)?,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl NotificationSink for HttpNotificationSink {
    async fn notify(&self, request: &MovieNotifyRequest) -> Result<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| Error::notification(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::notification(describe_status(status)));
        }

        tracing::debug!(
            endpoint = %self.endpoint,
            recipients = request.user_ids.len(),
            "Notification accepted"
        );
        Ok(())
    }

    fn sink_name(&self) -> &'static str {
        "http"
    }
}

/// Read-only client for the watch-list service
#[derive(Debug, Clone)]
pub struct HttpWatchListClient {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpWatchListClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_HTTP_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base = trim_base(base_url);
        if base.is_empty() {
            return Err(Error::config("watch-list service URL cannot be empty"));
        }
        Ok(Self {
            endpoint: format!("{}/watchlist/unwatched", base),
            client: build_client(timeout)?,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Decode a watch-list query response body
pub fn parse_unwatched(body: &str) -> Result<Vec<WatchListMatch>> {
    serde_json::from_str(body)
        .map_err(|e| Error::http(format!("invalid watch-list response: {}", e)))
}

#[async_trait]
impl WatchListStore for HttpWatchListClient {
    async fn find_unwatched(&self, movie_id: MovieId) -> Result<Vec<WatchListMatch>> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("movieId", movie_id.0)])
            .send()
            .await
            .map_err(|e| Error::http(format!("watch-list request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::http(format!("watch-list query: {}", describe_status(status))));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::http(format!("failed to read watch-list response: {}", e)))?;
        parse_unwatched(&body)
    }
}
