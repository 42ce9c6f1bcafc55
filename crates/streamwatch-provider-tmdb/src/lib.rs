// # TMDB Provider Lookup
//
// `ProviderLookup` over The Movie Database v3 API.
//
// ## Behaviour
//
// - One HTTP request per lookup; no retries, no caching
// - HTTP client timeout configured (default 10 seconds); the detector adds
//   its own bound on top
// - Status codes mapped to specific errors (401/403, 404, 429, 5xx)
// - A region TMDB has no data for is an empty snapshot, not an error
//
// ## Security
//
// - The API key never appears in logs, errors or `Debug` output
//
// ## API Reference
//
// - Watch providers: GET `/movie/{movie_id}/watch/providers?api_key=...`
//
// ```json
// {
//   "id": 550,
//   "results": {
//     "GR": {
//       "link": "https://www.themoviedb.org/movie/550/watch?locale=GR",
//       "flatrate": [{"provider_id": 8, "provider_name": "Netflix", "logo_path": "/n.jpg", "display_priority": 0}],
//       "rent": [ ... ],
//       "buy": [ ... ]
//     }
//   }
// }
// ```

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use streamwatch_core::traits::ProviderLookup;
use streamwatch_core::{Error, MovieId, ProviderEntry, ProviderSnapshot, Result};

/// TMDB v3 API base URL
pub const TMDB_API_BASE: &str = "https://api.themoviedb.org/3";

const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct WatchProvidersResponse {
    #[serde(default)]
    results: HashMap<String, RegionProviders>,
}

#[derive(Debug, Default, Deserialize)]
struct RegionProviders {
    #[serde(default)]
    rent: Vec<TmdbProvider>,
    #[serde(default)]
    buy: Vec<TmdbProvider>,
    #[serde(default)]
    flatrate: Vec<TmdbProvider>,
}

#[derive(Debug, Deserialize)]
struct TmdbProvider {
    provider_id: i64,
    provider_name: String,
    #[serde(default)]
    logo_path: Option<String>,
}

impl From<TmdbProvider> for ProviderEntry {
    fn from(p: TmdbProvider) -> Self {
        ProviderEntry {
            provider_id: p.provider_id,
            provider_name: p.provider_name,
            logo_path: p.logo_path,
        }
    }
}

fn convert(list: Vec<TmdbProvider>) -> Vec<ProviderEntry> {
    list.into_iter().map(ProviderEntry::from).collect()
}

/// Extract one region's providers from a watch-providers response body
pub fn parse_watch_providers(body: &str, region: &str) -> Result<ProviderSnapshot> {
    let mut response: WatchProvidersResponse = serde_json::from_str(body)
        .map_err(|e| Error::lookup(format!("tmdb: invalid watch-providers response: {}", e)))?;

    let providers = response.results.remove(region).unwrap_or_default();
    Ok(ProviderSnapshot {
        rent: convert(providers.rent),
        buy: convert(providers.buy),
        flatrate: convert(providers.flatrate),
    })
}

/// TMDB watch-provider lookup
pub struct TmdbProviderLookup {
    /// ⚠️ NEVER log this value
    api_key: String,
    base_url: String,
    timeout: Duration,
    client: reqwest::Client,
}

// Keep the API key out of Debug output
impl fmt::Debug for TmdbProviderLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TmdbProviderLookup")
            .field("api_key", &"<REDACTED>")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl TmdbProviderLookup {
    /// Create a lookup against the public TMDB API
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_base_url(api_key, TMDB_API_BASE, DEFAULT_HTTP_TIMEOUT)
    }

    /// Create a lookup against `base_url` (mirrors, tests)
    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(Error::config("TMDB API key cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::http(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
            client,
        })
    }

    /// Bound applied to every HTTP request
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn providers_url(&self, movie_id: MovieId) -> String {
        format!("{}/movie/{}/watch/providers", self.base_url, movie_id)
    }
}

#[async_trait]
impl ProviderLookup for TmdbProviderLookup {
    async fn get_providers(&self, movie_id: MovieId, region: &str) -> Result<ProviderSnapshot> {
        tracing::debug!(movie_id = %movie_id, region, "Fetching watch providers");

        let response = self
            .client
            .get(self.providers_url(movie_id))
            .query(&[("api_key", self.api_key.as_str())])
            .send()
            .await
            // Strip the URL: it carries the key
            .map_err(|e| Error::lookup(format!("tmdb: request failed: {}", e.without_url())))?;

        let status = response.status();
        if !status.is_success() {
            return Err(match status.as_u16() {
                401 | 403 => Error::lookup(format!(
                    "tmdb: authentication failed, check the API key (status {})",
                    status
                )),
                404 => Error::lookup(format!("tmdb: movie {} not found", movie_id)),
                429 => Error::lookup(format!("tmdb: rate limit exceeded (status {})", status)),
                500..=599 => Error::lookup(format!("tmdb: server error (transient): {}", status)),
                _ => Error::lookup(format!("tmdb: unexpected status {}", status)),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::lookup(format!("tmdb: failed to read response: {}", e.without_url())))?;
        parse_watch_providers(&body, region)
    }

    fn lookup_name(&self) -> &'static str {
        "tmdb"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIGHT_CLUB: &str = r#"{
        "id": 550,
        "results": {
            "GR": {
                "link": "https://www.themoviedb.org/movie/550-fight-club/watch?locale=GR",
                "flatrate": [
                    {"logo_path": "/netflix.jpg", "provider_id": 8, "provider_name": "Netflix", "display_priority": 0}
                ],
                "rent": [
                    {"logo_path": "/apple.jpg", "provider_id": 2, "provider_name": "Apple TV", "display_priority": 4},
                    {"logo_path": "/google.jpg", "provider_id": 3, "provider_name": "Google Play Movies", "display_priority": 15}
                ]
            },
            "US": {
                "buy": [
                    {"logo_path": "/amazon.jpg", "provider_id": 10, "provider_name": "Amazon Video", "display_priority": 2}
                ]
            }
        }
    }"#;

    #[test]
    fn picks_configured_region() {
        let snapshot = parse_watch_providers(FIGHT_CLUB, "GR").unwrap();

        assert_eq!(
            snapshot.flatrate,
            vec![ProviderEntry::new(8, "Netflix").with_logo("/netflix.jpg")]
        );
        assert_eq!(snapshot.rent.len(), 2);
        assert!(snapshot.buy.is_empty());
    }

    #[test]
    fn missing_region_is_empty_snapshot() {
        let snapshot = parse_watch_providers(FIGHT_CLUB, "FR").unwrap();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.normalize(), None);
    }

    #[test]
    fn missing_results_is_empty_snapshot() {
        let snapshot = parse_watch_providers(r#"{"id": 1}"#, "GR").unwrap();
        assert!(snapshot.is_empty());
    }

    #[test]
    fn invalid_body_is_lookup_error() {
        assert!(matches!(
            parse_watch_providers("<html>502</html>", "GR"),
            Err(Error::Lookup(_))
        ));
    }

    #[test]
    fn empty_key_is_rejected() {
        assert!(TmdbProviderLookup::new("  ").is_err());
    }

    #[test]
    fn key_is_redacted_and_url_built() {
        let lookup = TmdbProviderLookup::with_base_url(
            "super-secret-key",
            "http://localhost:9000/3/",
            Duration::from_secs(1),
        )
        .unwrap();

        assert!(!format!("{:?}", lookup).contains("super-secret-key"));
        assert_eq!(
            lookup.providers_url(MovieId(550)),
            "http://localhost:9000/3/movie/550/watch/providers"
        );
        assert_eq!(lookup.lookup_name(), "tmdb");
    }
}
