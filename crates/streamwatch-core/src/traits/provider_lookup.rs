// # Provider Lookup Trait
//
// Defines the interface for fetching current provider availability for a
// movie from the external metadata provider.
//
// ## Implementations
//
// - TMDB: `streamwatch-provider-tmdb` crate
//
// ## Usage
//
// ```rust,ignore
// use streamwatch_core::{MovieId, ProviderLookup};
//
// let snapshot = lookup.get_providers(MovieId(550), "GR").await?;
// let normalized = snapshot.normalize();
// ```

use async_trait::async_trait;

use crate::events::MovieId;
use crate::snapshot::ProviderSnapshot;

/// Trait for provider lookup implementations
///
/// Lookups are single-shot: one request per call, no retries, no caching.
/// The change detector owns timeouts and decides what a failure means
/// (skip the movie for this sweep).
///
/// # Returns
///
/// The raw snapshot for the region. An empty snapshot (including "the
/// provider has no data for this region") is a valid answer, not an error;
/// the detector normalizes it to absent.
#[async_trait]
pub trait ProviderLookup: Send + Sync {
    /// Fetch provider availability for `movie_id` in `region`
    ///
    /// `region` is a two-letter country code (e.g. "GR", "US").
    async fn get_providers(
        &self,
        movie_id: MovieId,
        region: &str,
    ) -> Result<ProviderSnapshot, crate::Error>;

    /// Lookup name for logging (e.g. "tmdb")
    fn lookup_name(&self) -> &'static str;
}
