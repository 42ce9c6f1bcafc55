//! Session token signing and verification
//!
//! Tokens are compact HS256 JWTs: three dot-separated base64url segments
//! (header, claims, signature). The key is a pre-shared secret, configured
//! base64-encoded.
//!
//! A token is valid iff its signature verifies under the key, its header
//! names HS256, its `exp` claim is strictly after the verification time,
//! and its `sub` claim is a non-empty string. Every other outcome is an
//! [`InvalidToken`]; verification never panics.

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::fmt;
use thiserror::Error;

use crate::error::{Error, Result};
use crate::identity::Subject;

type HmacSha256 = Hmac<Sha256>;

/// Minimum key length for HS256 (256 bits)
pub const MIN_KEY_BYTES: usize = 32;

const ALGORITHM: &str = "HS256";

/// Why a token was rejected
///
/// Callers reject the call with an authentication error; none of these are
/// retryable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidToken {
    #[error("malformed token: {0}")]
    Malformed(&'static str),

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("signature mismatch")]
    BadSignature,

    #[error("token expired")]
    Expired,

    #[error("invalid claim: {0}")]
    BadClaims(&'static str),
}

/// Shared HMAC key
#[derive(Clone)]
pub struct SessionKey {
    mac: HmacSha256,
}

// Keep key material out of logs
impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SessionKey").field(&"<REDACTED>").finish()
    }
}

impl SessionKey {
    /// Use raw key bytes
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes = bytes.into();
        if bytes.len() < MIN_KEY_BYTES {
            return Err(Error::config(format!(
                "session key must be at least {} bytes, got {}",
                MIN_KEY_BYTES,
                bytes.len()
            )));
        }
        let mac = HmacSha256::new_from_slice(&bytes)
            .map_err(|e| Error::config(format!("invalid session key: {}", e)))?;
        Ok(Self { mac })
    }

    /// Decode a base64 (standard alphabet) secret
    pub fn from_base64(secret: &str) -> Result<Self> {
        let bytes = STANDARD
            .decode(secret.trim())
            .map_err(|e| Error::config(format!("session secret is not valid base64: {}", e)))?;
        Self::from_bytes(bytes)
    }

    fn mac(&self) -> HmacSha256 {
        self.mac.clone()
    }
}

#[derive(Deserialize)]
struct Header {
    alg: String,
}

fn decode_segment(segment: &str, what: &'static str) -> std::result::Result<Vec<u8>, InvalidToken> {
    URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| InvalidToken::Malformed(what))
}

/// Verifies session tokens and extracts their subject
#[derive(Debug, Clone)]
pub struct TokenVerifier {
    key: SessionKey,
}

impl TokenVerifier {
    pub fn new(key: SessionKey) -> Self {
        Self { key }
    }

    /// Verify `token` at time `now` and return its subject
    pub fn verify(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> std::result::Result<Subject, InvalidToken> {
        let mut segments = token.split('.');
        let (Some(header_b64), Some(claims_b64), Some(signature_b64), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(InvalidToken::Malformed("expected three segments"));
        };

        let header: Header = serde_json::from_slice(&decode_segment(header_b64, "header")?)
            .map_err(|_| InvalidToken::Malformed("header"))?;
        if header.alg != ALGORITHM {
            return Err(InvalidToken::UnsupportedAlgorithm(header.alg));
        }

        let signature = decode_segment(signature_b64, "signature")?;
        let mut mac = self.key.mac();
        mac.update(header_b64.as_bytes());
        mac.update(b".");
        mac.update(claims_b64.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| InvalidToken::BadSignature)?;

        let claims: serde_json::Value =
            serde_json::from_slice(&decode_segment(claims_b64, "claims")?)
                .map_err(|_| InvalidToken::Malformed("claims"))?;

        let exp = claims
            .get("exp")
            .and_then(serde_json::Value::as_i64)
            .ok_or(InvalidToken::BadClaims("exp"))?;
        if exp <= now.timestamp() {
            return Err(InvalidToken::Expired);
        }

        let subject = claims
            .get("sub")
            .and_then(serde_json::Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .ok_or(InvalidToken::BadClaims("sub"))?;

        Ok(Subject::new(subject))
    }
}

/// Issues session tokens
#[derive(Debug, Clone)]
pub struct TokenSigner {
    key: SessionKey,
    ttl: Duration,
}

impl TokenSigner {
    pub fn new(key: SessionKey, ttl: Duration) -> Self {
        Self { key, ttl }
    }

    /// Sign a token for `subject` issued at `now`, expiring after the TTL
    pub fn sign(&self, subject: &str, now: DateTime<Utc>) -> Result<String> {
        let header = serde_json::json!({ "alg": ALGORITHM, "typ": "JWT" });
        let claims = serde_json::json!({
            "sub": subject,
            "iat": now.timestamp(),
            "exp": (now + self.ttl).timestamp(),
        });

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?),
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?)
        );

        let mut mac = self.key.mac();
        mac.update(signing_input.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{}.{}", signing_input, signature))
    }

    /// A verifier sharing this signer's key
    pub fn verifier(&self) -> TokenVerifier {
        TokenVerifier::new(self.key.clone())
    }
}
