//! JWT payload decoding.
//!
//! Only the payload segment is read; signatures are the server's concern.
//! This mirrors what a browser-side `jwt-decode` does: split on `.`,
//! base64url-decode the middle segment and parse it as JSON.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

/// Claims read from an access token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenPayload {
    /// Expiry, in seconds since the Unix epoch. A token without one never
    /// expires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<f64>,

    /// All other claims, untouched.
    #[serde(flatten)]
    pub claims: serde_json::Map<String, serde_json::Value>,
}

impl TokenPayload {
    /// Whether `exp` lies strictly before `now_secs`. Always `false`
    /// without an `exp` claim.
    pub fn is_expired_at(&self, now_secs: f64) -> bool {
        self.exp.is_some_and(|exp| exp < now_secs)
    }

    /// Whether the token has expired relative to the system clock.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(now_secs())
    }
}

/// Current time in fractional epoch seconds.
pub fn now_secs() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

/// Decode the payload of a JWT without verifying it.
///
/// # Errors
///
/// Returns [`StoreError::TokenDecode`] if the token does not have a
/// payload segment, the segment is not base64url, the JSON is not an
/// object, or `exp` is present but not a number.
pub fn decode_token(token: &str) -> Result<TokenPayload> {
    let segment = token.split('.').nth(1).ok_or_else(|| StoreError::TokenDecode {
        reason: "missing payload segment".to_string(),
    })?;

    // Some issuers pad their segments; the no-pad engine rejects that.
    let bytes = URL_SAFE_NO_PAD
        .decode(segment.trim_end_matches('='))
        .map_err(|e| StoreError::TokenDecode {
            reason: format!("invalid base64 in payload: {e}"),
        })?;

    serde_json::from_slice(&bytes).map_err(|e| StoreError::TokenDecode {
        reason: format!("invalid payload json: {e}"),
    })
}

/// Build an unsigned token with the given `exp`, for tests and fixtures.
#[doc(hidden)]
pub fn encode_unsigned(exp: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"token_type":"access","exp":{exp}}}"#));
    format!("{header}.{payload}.signature")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_exp_and_claims() {
        let token = encode_unsigned(1_700_000_000);
        let payload = decode_token(&token).unwrap();
        assert_eq!(payload.exp, Some(1_700_000_000.0));
        assert_eq!(payload.claims["token_type"], "access");
    }

    #[test]
    fn padded_segment_is_accepted() {
        // {"exp":12} is 10 bytes, which base64-encodes with two `=`.
        let unpadded = "h.eyJleHAiOjEyfQ.s";
        assert_eq!(decode_token(unpadded).unwrap().exp, Some(12.0));
        let padded = "h.eyJleHAiOjEyfQ==.s";
        assert_eq!(decode_token(padded).unwrap().exp, Some(12.0));
    }

    #[test]
    fn single_segment_is_rejected() {
        let err = decode_token("opaque-token").unwrap_err();
        assert!(matches!(err, StoreError::TokenDecode { .. }));
    }

    #[test]
    fn bad_base64_is_rejected() {
        assert!(matches!(
            decode_token("a.!!!.c"),
            Err(StoreError::TokenDecode { .. })
        ));
    }

    #[test]
    fn missing_exp_never_expires() {
        let payload = URL_SAFE_NO_PAD.encode(br#"{"user_id":3}"#);
        let decoded = decode_token(&format!("h.{payload}.s")).unwrap();
        assert_eq!(decoded.exp, None);
        assert_eq!(decoded.claims["user_id"], 3);
        assert!(!decoded.is_expired_at(f64::MAX));
        assert!(!decoded.is_expired());
    }

    #[test]
    fn non_numeric_exp_is_rejected() {
        let payload = URL_SAFE_NO_PAD.encode(br#"{"exp":"soon"}"#);
        assert!(matches!(
            decode_token(&format!("h.{payload}.s")),
            Err(StoreError::TokenDecode { .. })
        ));
    }

    #[test]
    fn expiry_is_strict() {
        let payload = decode_token(&encode_unsigned(100)).unwrap();
        assert!(!payload.is_expired_at(100.0));
        assert!(payload.is_expired_at(100.001));
        assert!(!payload.is_expired_at(99.0));
    }

    #[test]
    fn past_token_is_expired_now() {
        let exp = chrono::Utc::now().timestamp() - 10;
        assert!(decode_token(&encode_unsigned(exp)).unwrap().is_expired());

        let exp = chrono::Utc::now().timestamp() + 3600;
        assert!(!decode_token(&encode_unsigned(exp)).unwrap().is_expired());
    }
}
