//! Session token signing and password hashing.
//!
//! Tokens are `header.payload.signature`, each segment base64url without
//! padding. The payload is [`TokenClaims`]; the signature is HMAC-SHA256 over
//! `header.payload`. Passwords are stored as Argon2id PHC strings, which carry
//! their own salt and parameters.

use argon2::Argon2;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use nyuki_auth::TokenClaims;
use nyuki_core::ids::random_hex;
use sha2::Sha256;

use crate::error::DatabaseError;

type HmacSha256 = Hmac<Sha256>;

const HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

#[derive(Clone)]
pub struct TokenSigner {
    mac: HmacSha256,
}

impl TokenSigner {
    /// Key the signer with `secret`, or with a random per-process key when
    /// `secret` is empty.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::Other` if the key is rejected by the MAC.
    pub fn new(secret: &str) -> Result<Self, DatabaseError> {
        let key = if secret.is_empty() {
            tracing::warn!("no token secret configured; sessions will not survive a restart");
            random_hex(32).into_bytes()
        } else {
            secret.as_bytes().to_vec()
        };
        let mac = HmacSha256::new_from_slice(&key)
            .map_err(|e| DatabaseError::Other(anyhow::anyhow!("token key: {e}")))?;
        Ok(Self { mac })
    }

    #[must_use]
    pub fn issue(&self, claims: &TokenClaims) -> String {
        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(HEADER),
            claims.encode_payload()
        );
        let mut mac = self.mac.clone();
        mac.update(signing_input.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        format!("{signing_input}.{signature}")
    }

    /// Claims of a token this signer issued; `None` for a malformed token or
    /// a bad signature. Expiry is not checked here.
    #[must_use]
    pub fn verify(&self, token: &str) -> Option<TokenClaims> {
        let (signing_input, signature) = token.rsplit_once('.')?;
        let signature = URL_SAFE_NO_PAD.decode(signature).ok()?;
        let mut mac = self.mac.clone();
        mac.update(signing_input.as_bytes());
        mac.verify_slice(&signature).ok()?;
        TokenClaims::decode_unverified(token).ok()
    }
}

const SALT_LEN: usize = 16;

/// Hash `password` with Argon2id under a fresh random salt.
///
/// # Errors
///
/// Returns `DatabaseError::Other` if the system RNG or the hasher fails.
pub fn hash_password(password: &str) -> Result<String, DatabaseError> {
    let mut salt = [0u8; SALT_LEN];
    getrandom::fill(&mut salt)
        .map_err(|e| DatabaseError::Other(anyhow::anyhow!("password salt: {e}")))?;
    let salt = SaltString::encode_b64(&salt)
        .map_err(|e| DatabaseError::Other(anyhow::anyhow!("password salt: {e}")))?;
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| DatabaseError::Other(anyhow::anyhow!("password hash: {e}")))?;
    Ok(hash.to_string())
}

/// Whether `password` matches the PHC string `stored`. A malformed `stored`
/// matches nothing.
#[must_use]
pub fn verify_password(stored: &str, password: &str) -> bool {
    PasswordHash::new(stored).is_ok_and(|hash| {
        Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .is_ok()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn claims() -> TokenClaims {
        TokenClaims {
            sub: "usr-0000beef".into(),
            email: "bee@example.com".into(),
            exp: Utc::now().timestamp() + 3600,
        }
    }

    #[test]
    fn issued_tokens_verify() {
        let signer = TokenSigner::new("hive-secret").unwrap();
        let token = signer.issue(&claims());
        assert_eq!(token.split('.').count(), 3);
        assert_eq!(signer.verify(&token), Some(claims()));
    }

    #[test]
    fn other_key_rejects() {
        let token = TokenSigner::new("hive-secret").unwrap().issue(&claims());
        assert_eq!(TokenSigner::new("other").unwrap().verify(&token), None);
    }

    #[test]
    fn tampered_payload_rejects() {
        let signer = TokenSigner::new("hive-secret").unwrap();
        let token = signer.issue(&claims());
        let mut forged = claims();
        forged.sub = "usr-0000f00d".into();
        let parts: Vec<&str> = token.split('.').collect();
        let tampered = format!("{}.{}.{}", parts[0], forged.encode_payload(), parts[2]);
        assert_eq!(signer.verify(&tampered), None);
    }

    #[test]
    fn random_keys_differ_per_signer() {
        let token = TokenSigner::new("").unwrap().issue(&claims());
        assert_eq!(TokenSigner::new("").unwrap().verify(&token), None);
    }

    #[test]
    fn garbage_is_not_a_token() {
        let signer = TokenSigner::new("hive-secret").unwrap();
        assert_eq!(signer.verify("not-a-token"), None);
        assert_eq!(signer.verify("a.b.!!!"), None);
    }

    #[test]
    fn password_hash_is_salted_argon2id() {
        let a = hash_password("queen").unwrap();
        let b = hash_password("queen").unwrap();
        assert!(a.starts_with("$argon2id$"), "{a}");
        assert_ne!(a, b);
        assert!(verify_password(&a, "queen"));
        assert!(verify_password(&b, "queen"));
        assert!(!verify_password(&a, "drone"));
    }

    #[test]
    fn malformed_stored_hash_matches_nothing() {
        assert!(!verify_password("", ""));
        assert!(!verify_password("not-a-phc-string", "queen"));
    }
}
