use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// Claims carried in the payload segment of a session token.
///
/// Tokens are JWT-shaped (`header.payload.signature`). The client never
/// verifies the signature; it only reads `exp` to skip restoring a token the
/// backend would reject anyway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// User ID.
    pub sub: String,
    pub email: String,
    /// Expiry as a Unix timestamp.
    pub exp: i64,
}

impl TokenClaims {
    /// Decode the payload segment without verifying the signature.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::TokenStoreError` if the token is not three
    /// dot-separated segments or the payload is not base64url JSON claims.
    pub fn decode_unverified(token: &str) -> Result<Self, AuthError> {
        let parts: Vec<&str> = token.split('.').collect();
        if parts.len() != 3 {
            return Err(AuthError::TokenStoreError("invalid token format".into()));
        }
        let payload = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(parts[1])
            .map_err(|e| AuthError::TokenStoreError(format!("base64 decode failed: {e}")))?;
        serde_json::from_slice(&payload)
            .map_err(|e| AuthError::TokenStoreError(format!("claims parse failed: {e}")))
    }

    /// Base64url payload segment for these claims (used by token issuers).
    #[must_use]
    pub fn encode_payload(&self) -> String {
        let json = serde_json::to_vec(self).unwrap_or_default();
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(json)
    }

    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Check if the token is expired or expires within `buffer_secs`.
    #[must_use]
    pub fn is_near_expiry(&self, buffer_secs: i64) -> bool {
        self.exp <= Utc::now().timestamp() + buffer_secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_token(payload_json: &str) -> String {
        let header = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256"}"#);
        let payload = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(payload_json);
        let signature = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode("fake_sig");
        format!("{header}.{payload}.{signature}")
    }

    #[test]
    fn decode_valid_token() {
        let exp = Utc::now().timestamp() + 3600;
        let token = make_token(&format!(
            r#"{{"sub":"usr-1","email":"bee@example.com","exp":{exp}}}"#
        ));
        let claims = TokenClaims::decode_unverified(&token).unwrap();
        assert_eq!(claims.sub, "usr-1");
        assert_eq!(claims.expires_at().timestamp(), exp);
        assert!(!claims.is_near_expiry(60));
    }

    #[test]
    fn expired_token_is_near_expiry() {
        let exp = Utc::now().timestamp() - 10;
        let token = make_token(&format!(r#"{{"sub":"usr-1","email":"e","exp":{exp}}}"#));
        let claims = TokenClaims::decode_unverified(&token).unwrap();
        assert!(claims.is_near_expiry(0));
    }

    #[test]
    fn encode_then_decode_payload_segment() {
        let claims = TokenClaims {
            sub: "usr-2".into(),
            email: "x@y.z".into(),
            exp: 1_900_000_000,
        };
        let token = format!("h.{}.s", claims.encode_payload());
        assert_eq!(TokenClaims::decode_unverified(&token).unwrap(), claims);
    }

    #[test]
    fn rejects_wrong_segment_count() {
        let err = TokenClaims::decode_unverified("not-a-token").unwrap_err();
        assert!(err.to_string().contains("invalid token format"));
    }

    #[test]
    fn rejects_missing_exp() {
        let token = make_token(r#"{"sub":"usr-1","email":"e"}"#);
        let err = TokenClaims::decode_unverified(&token).unwrap_err();
        assert!(err.to_string().contains("claims parse failed"));
    }

    #[test]
    fn rejects_bad_base64() {
        let err = TokenClaims::decode_unverified("header.!!!invalid!!!.signature").unwrap_err();
        assert!(err.to_string().contains("base64 decode failed"));
    }
}
