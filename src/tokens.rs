//! Session token payload decoding.
//!
//! Tokens are decoded without verifying their signature: the client only
//! needs the payload for expiry countdowns and role-gated rendering, and
//! verification is the backend's job. Nothing decoded here is an
//! authorization boundary; every privileged operation is re-checked
//! server-side.

use crate::errors::TokenError;
use crate::models::UserRole;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Claims carried in a session token's payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject (user id)
    pub sub: String,

    /// Email address at issue time
    #[serde(default)]
    pub email: Option<String>,

    /// Role at issue time
    #[serde(default)]
    pub role: Option<UserRole>,

    /// Issued-at, epoch seconds
    pub iat: i64,

    /// Expiry, epoch seconds
    pub exp: i64,

    /// Unique token id
    #[serde(default)]
    pub jti: Option<String>,
}

impl TokenClaims {
    /// Expiry as a timestamp.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp(self.exp, 0)
    }

    /// Issued-at as a timestamp.
    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp(self.iat, 0)
    }

    /// Whether the claims are expired at the given instant.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.exp <= now.timestamp()
    }
}

/// Decode a token's payload without verifying its signature.
///
/// Requires the standard three dot-separated base64url segments; anything
/// else is malformed and must be treated as "no token".
pub fn decode_claims(token: &str) -> Result<TokenClaims, TokenError> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 || segments.iter().any(|s| s.is_empty()) {
        return Err(TokenError::malformed(
            "expected three dot-separated segments",
        ));
    }

    let payload = segments[1].trim_end_matches('=');
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| TokenError::malformed(format!("payload is not base64url: {e}")))?;

    serde_json::from_slice(&bytes)
        .map_err(|e| TokenError::malformed(format!("payload is not valid claims JSON: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::mint_token;
    use chrono::Duration;

    #[test]
    fn decodes_minted_token() {
        let now = Utc::now();
        let token = mint_token(
            "user-1",
            "user@example.com",
            UserRole::Writer,
            now,
            now + Duration::minutes(30),
        );

        let claims = decode_claims(&token).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.email.as_deref(), Some("user@example.com"));
        assert_eq!(claims.role, Some(UserRole::Writer));
        assert!(claims.jti.is_some());
        assert!(!claims.is_expired_at(now));
        assert!(claims.is_expired_at(now + Duration::minutes(31)));
    }

    #[test]
    fn rejects_wrong_segment_count() {
        assert!(decode_claims("not-a-jwt").is_err());
        assert!(decode_claims("a.b").is_err());
        assert!(decode_claims("a.b.c.d").is_err());
        assert!(decode_claims("..").is_err());
    }

    #[test]
    fn rejects_non_base64_payload() {
        let err = decode_claims("aGVhZGVy.!!!.c2ln").unwrap_err();
        assert!(matches!(err, TokenError::Malformed { .. }));
    }

    #[test]
    fn rejects_non_claims_payload() {
        // "bm90LWpzb24" is base64url for "not-json"
        let err = decode_claims("aGVhZGVy.bm90LWpzb24.c2ln").unwrap_err();
        assert!(matches!(err, TokenError::Malformed { .. }));
    }
}
