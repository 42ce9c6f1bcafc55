//! Per-call identity scope
//!
//! The subject extracted from a verified session token lives in a
//! task-local scope bound to one inbound call. Handlers running inside the
//! call read it with [`current_subject`]; nothing outside the call's future
//! can see it, concurrent calls each get their own, and the scope is gone
//! as soon as the call's future completes, fails or is dropped.
//!
//! Work spawned onto other tasks does not inherit the scope. Pass the
//! [`Subject`] explicitly if a spawned task needs it.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let response = identity::authenticate(
//!     request.header("Authorization"),
//!     &verifier,
//!     Utc::now(),
//!     async { handle_request().await },
//! )
//! .await?;
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;

use crate::error::{Error, Result};
use crate::token::TokenVerifier;

tokio::task_local! {
    static CURRENT_SUBJECT: Subject;
}

const BEARER_PREFIX: &str = "Bearer ";

/// Identifier of the authenticated user for one call
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Subject(String);

impl Subject {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The subject of the call currently executing, if any
pub fn current_subject() -> Option<Subject> {
    CURRENT_SUBJECT.try_with(Subject::clone).ok()
}

/// Run `call` with `subject` as the current identity
///
/// The scope is established once, for the whole of `call`. Nesting a new
/// scope inside an existing one is refused so a handler can never swap the
/// identity of the call it is running in.
pub async fn scope<F>(subject: Subject, call: F) -> Result<F::Output>
where
    F: Future,
{
    if let Some(existing) = current_subject() {
        return Err(Error::auth(format!(
            "identity already established for this call ({})",
            existing
        )));
    }

    Ok(CURRENT_SUBJECT.scope(subject, call).await)
}

/// Extract the token from an `Authorization` header value
pub fn bearer_token(authorization: Option<&str>) -> Result<&str> {
    let header = authorization.ok_or_else(|| Error::auth("missing Authorization header"))?;
    let token = header
        .strip_prefix(BEARER_PREFIX)
        .ok_or_else(|| Error::auth("Authorization header is not a Bearer token"))?
        .trim();

    if token.is_empty() {
        return Err(Error::auth("empty Bearer token"));
    }
    Ok(token)
}

/// Verify the caller's token and run `call` inside its identity scope
///
/// This is the filter in front of every authenticated handler. A missing
/// header, a non-Bearer header, or an invalid token rejects the call with
/// `Error::Authentication` and `call` never runs.
pub async fn authenticate<F>(
    authorization: Option<&str>,
    verifier: &TokenVerifier,
    now: DateTime<Utc>,
    call: F,
) -> Result<F::Output>
where
    F: Future,
{
    let token = bearer_token(authorization)?;
    let subject = verifier.verify(token, now).map_err(|e| {
        tracing::warn!(reason = %e, "Rejected session token");
        Error::auth(e.to_string())
    })?;

    tracing::debug!(subject = %subject, "Authenticated call");
    scope(subject, call).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_extraction() {
        assert_eq!(bearer_token(Some("Bearer abc.def.ghi")).unwrap(), "abc.def.ghi");
        assert!(bearer_token(None).is_err());
        assert!(bearer_token(Some("Basic dXNlcjpwYXNz")).is_err());
        assert!(bearer_token(Some("Bearer   ")).is_err());
    }

    #[test]
    fn no_subject_outside_scope() {
        assert_eq!(current_subject(), None);
    }

    #[tokio::test]
    async fn subject_visible_inside_scope_only() {
        let seen = scope(Subject::new("alice"), async { current_subject() })
            .await
            .unwrap();

        assert_eq!(seen, Some(Subject::new("alice")));
        assert_eq!(current_subject(), None);
    }

    #[tokio::test]
    async fn nested_scope_is_refused() {
        let inner = scope(Subject::new("alice"), async {
            scope(Subject::new("mallory"), async { current_subject() }).await
        })
        .await
        .unwrap();

        assert!(matches!(inner, Err(Error::Authentication(_))));
    }
}
