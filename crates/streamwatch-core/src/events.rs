//! Domain events carried on the movie event topic
//!
//! ## Wire Format
//!
//! ```json
//! {"eventType": "PROVIDERS_CHANGED", "userId": null, "movieId": 42, "rating": null}
//! ```
//!
//! `eventType` is one of `ADD`, `RATE`, `DELETE`, `PROVIDERS_CHANGED`.
//! Producers that predate the rename send `WATCH_INFO_UPDATED`, which is
//! decoded as `PROVIDERS_CHANGED`. The encoder always writes the new name.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Stable movie identifier from the external metadata provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MovieId(pub i64);

impl fmt::Display for MovieId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for MovieId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// A user rating, always within 1..=5
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Rating(u8);

impl Rating {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    /// Create a rating, rejecting values outside 1..=5
    pub fn new(value: i64) -> Result<Self> {
        if (i64::from(Self::MIN)..=i64::from(Self::MAX)).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(Error::invalid_input(format!(
                "rating must be between {} and {}, got {}",
                Self::MIN,
                Self::MAX,
                value
            )))
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for Rating {
    type Error = Error;

    fn try_from(value: i64) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Rating> for i64 {
    fn from(rating: Rating) -> Self {
        i64::from(rating.0)
    }
}

/// Event kind tag as it appears on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    Add,
    Rate,
    Delete,
    #[serde(alias = "WATCH_INFO_UPDATED")]
    ProvidersChanged,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::Add => "ADD",
            EventKind::Rate => "RATE",
            EventKind::Delete => "DELETE",
            EventKind::ProvidersChanged => "PROVIDERS_CHANGED",
        };
        f.write_str(name)
    }
}

/// A domain event on the movie topic
///
/// User-scoped kinds carry the subject that caused them. Provider changes
/// are movie-scoped: they never carry a subject or rating, and consumers
/// resolve the affected users themselves at consumption time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MovieEvent {
    /// A user added the movie to their watch-list
    Added {
        user_id: String,
        movie_id: MovieId,
        rating: Option<Rating>,
    },
    /// A user rated the movie
    Rated {
        user_id: String,
        movie_id: MovieId,
        rating: Option<Rating>,
    },
    /// A user removed the movie from their watch-list
    Deleted {
        user_id: String,
        movie_id: MovieId,
        rating: Option<Rating>,
    },
    /// Provider availability for the movie changed
    ProvidersChanged { movie_id: MovieId },
}

/// Serialized shape of an event
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireEvent {
    event_type: EventKind,
    user_id: Option<String>,
    movie_id: Option<i64>,
    rating: Option<i64>,
}

impl MovieEvent {
    /// Create a provider-change event for a movie
    pub fn providers_changed(movie_id: MovieId) -> Self {
        Self::ProvidersChanged { movie_id }
    }

    /// The event kind tag
    pub fn kind(&self) -> EventKind {
        match self {
            MovieEvent::Added { .. } => EventKind::Add,
            MovieEvent::Rated { .. } => EventKind::Rate,
            MovieEvent::Deleted { .. } => EventKind::Delete,
            MovieEvent::ProvidersChanged { .. } => EventKind::ProvidersChanged,
        }
    }

    /// The movie the event refers to (the bus partition key)
    pub fn movie_id(&self) -> MovieId {
        match self {
            MovieEvent::Added { movie_id, .. }
            | MovieEvent::Rated { movie_id, .. }
            | MovieEvent::Deleted { movie_id, .. }
            | MovieEvent::ProvidersChanged { movie_id } => *movie_id,
        }
    }

    /// The subject that caused the event, if user-scoped
    pub fn user_id(&self) -> Option<&str> {
        match self {
            MovieEvent::Added { user_id, .. }
            | MovieEvent::Rated { user_id, .. }
            | MovieEvent::Deleted { user_id, .. } => Some(user_id),
            MovieEvent::ProvidersChanged { .. } => None,
        }
    }

    /// Serialize to the JSON wire format
    pub fn encode(&self) -> Result<Vec<u8>> {
        let (user_id, rating) = match self {
            MovieEvent::Added { user_id, rating, .. }
            | MovieEvent::Rated { user_id, rating, .. }
            | MovieEvent::Deleted { user_id, rating, .. } => {
                (Some(user_id.clone()), rating.map(i64::from))
            }
            MovieEvent::ProvidersChanged { .. } => (None, None),
        };

        let wire = WireEvent {
            event_type: self.kind(),
            user_id,
            movie_id: Some(self.movie_id().0),
            rating,
        };

        Ok(serde_json::to_vec(&wire)?)
    }

    /// Parse an event from the JSON wire format
    ///
    /// Returns `Error::InvalidInput` for payloads that are not JSON, lack a
    /// movie id, carry an out-of-range rating, or are user-scoped without
    /// a user id. A subject or rating sent along with a provider change is
    /// discarded.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let wire: WireEvent = serde_json::from_slice(payload)
            .map_err(|e| Error::invalid_input(format!("malformed event payload: {}", e)))?;

        let movie_id = wire
            .movie_id
            .map(MovieId)
            .ok_or_else(|| Error::invalid_input("event has no movieId"))?;

        if wire.event_type == EventKind::ProvidersChanged {
            if wire.user_id.is_some() || wire.rating.is_some() {
                tracing::debug!(
                    movie_id = %movie_id,
                    "Ignoring subject/rating carried on a provider change event"
                );
            }
            return Ok(Self::ProvidersChanged { movie_id });
        }

        let rating = wire.rating.map(Rating::new).transpose()?;
        let user_id = wire
            .user_id
            .filter(|u| !u.is_empty())
            .ok_or_else(|| {
                Error::invalid_input(format!("{} event has no userId", wire.event_type))
            })?;

        Ok(match wire.event_type {
            EventKind::Add => Self::Added { user_id, movie_id, rating },
            EventKind::Rate => Self::Rated { user_id, movie_id, rating },
            EventKind::Delete => Self::Deleted { user_id, movie_id, rating },
            EventKind::ProvidersChanged => Self::ProvidersChanged { movie_id },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn providers_changed_wire_shape() {
        let event = MovieEvent::providers_changed(MovieId(42));
        let json: serde_json::Value = serde_json::from_slice(&event.encode().unwrap()).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "eventType": "PROVIDERS_CHANGED",
                "userId": null,
                "movieId": 42,
                "rating": null
            })
        );
    }

    #[test]
    fn legacy_kind_name_is_accepted() {
        let payload = br#"{"eventType":"WATCH_INFO_UPDATED","userId":null,"movieId":7,"rating":null}"#;
        let event = MovieEvent::decode(payload).unwrap();
        assert_eq!(event, MovieEvent::providers_changed(MovieId(7)));
    }

    #[test]
    fn carried_subject_on_provider_change_is_dropped() {
        let payload = br#"{"eventType":"PROVIDERS_CHANGED","userId":"mallory","movieId":7,"rating":3}"#;
        let event = MovieEvent::decode(payload).unwrap();
        assert_eq!(event.user_id(), None);
    }

    #[test]
    fn rate_event_decodes_with_rating() {
        let payload = br#"{"eventType":"RATE","userId":"alice","movieId":550,"rating":4}"#;
        let event = MovieEvent::decode(payload).unwrap();

        assert_eq!(event.kind(), EventKind::Rate);
        assert_eq!(event.user_id(), Some("alice"));
        assert_eq!(
            event,
            MovieEvent::Rated {
                user_id: "alice".to_string(),
                movie_id: MovieId(550),
                rating: Some(Rating::new(4).unwrap()),
            }
        );
    }

    #[test]
    fn malformed_payloads_are_rejected() {
        let cases: [&[u8]; 5] = [
            b"not json",
            br#"{"eventType":"EXPLODE","userId":null,"movieId":1,"rating":null}"#,
            br#"{"eventType":"ADD","userId":"alice","movieId":null,"rating":null}"#,
            br#"{"eventType":"RATE","userId":"alice","movieId":1,"rating":9}"#,
            br#"{"eventType":"DELETE","userId":null,"movieId":1,"rating":null}"#,
        ];

        for payload in cases {
            let err = MovieEvent::decode(payload).unwrap_err();
            assert!(
                matches!(err, Error::InvalidInput(_)),
                "expected InvalidInput for {:?}, got {:?}",
                String::from_utf8_lossy(payload),
                err
            );
        }
    }

    #[test]
    fn rating_bounds() {
        assert!(Rating::new(0).is_err());
        assert_eq!(Rating::new(1).unwrap().value(), 1);
        assert_eq!(Rating::new(5).unwrap().value(), 5);
        assert!(Rating::new(6).is_err());
    }
}
