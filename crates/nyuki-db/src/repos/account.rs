//! Account repository: users and their session tokens.

use chrono::{DateTime, Utc};
use nyuki_auth::TokenClaims;
use nyuki_core::entities::Session;
use nyuki_core::ids::{PREFIX_USER, generate_id};

use crate::error::DatabaseError;
use crate::helpers::parse_datetime;
use crate::service::NyukiService;
use crate::tokens::{hash_password, verify_password};

/// A row of the `users` table.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    /// Argon2id PHC string.
    pub password_hash: String,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    #[must_use]
    pub fn password_matches(&self, password: &str) -> bool {
        verify_password(&self.password_hash, password)
    }
}

fn row_to_user(row: &libsql::Row) -> Result<UserRecord, DatabaseError> {
    Ok(UserRecord {
        id: row.get::<String>(0)?,
        email: row.get::<String>(1)?,
        password_hash: row.get::<String>(2)?,
        email_verified: row.get::<i64>(3)? != 0,
        created_at: parse_datetime(&row.get::<String>(4)?)?,
    })
}

/// Emails are matched case-insensitively and without surrounding space.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl NyukiService {
    pub async fn find_user_by_email(
        &self,
        email: &str,
    ) -> Result<Option<UserRecord>, DatabaseError> {
        let mut rows = self
            .db()
            .conn()
            .query(
                "SELECT id, email, password_hash, email_verified, created_at
                 FROM users WHERE email = ?1",
                [normalize_email(email)],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row_to_user(&row)?)),
            None => Ok(None),
        }
    }

    /// Insert an account with an Argon2id password hash. The account
    /// starts verified unless email verification is required.
    pub async fn insert_user(
        &self,
        email: &str,
        password: &str,
    ) -> Result<UserRecord, DatabaseError> {
        let user = UserRecord {
            id: generate_id(PREFIX_USER),
            email: normalize_email(email),
            password_hash: hash_password(password)?,
            email_verified: !self.require_email_verification(),
            created_at: Utc::now(),
        };
        self.db()
            .conn()
            .execute(
                "INSERT INTO users (id, email, password_hash, email_verified, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                libsql::params![
                    user.id.as_str(),
                    user.email.as_str(),
                    user.password_hash.as_str(),
                    i64::from(user.email_verified),
                    user.created_at.to_rfc3339()
                ],
            )
            .await
            .map_err(DatabaseError::from_write)?;
        tracing::debug!(user_id = %user.id, verified = user.email_verified, "account created");
        Ok(user)
    }

    /// Mark the account for `email` as verified.
    pub async fn confirm_email(&self, email: &str) -> Result<(), DatabaseError> {
        let email = normalize_email(email);
        let changed = self
            .db()
            .conn()
            .execute(
                "UPDATE users SET email_verified = 1 WHERE email = ?1",
                [email.as_str()],
            )
            .await?;
        if changed == 0 {
            return Err(DatabaseError::NotFound {
                table: "users",
                id: email,
            });
        }
        tracing::info!(email, "email confirmed");
        Ok(())
    }

    /// Issue and persist a signed session token for `user`.
    pub async fn insert_session(&self, user: &UserRecord) -> Result<Session, DatabaseError> {
        let now = Utc::now();
        let expires_at = now + self.token_ttl();
        let token = self.signer().issue(&TokenClaims {
            sub: user.id.clone(),
            email: user.email.clone(),
            exp: expires_at.timestamp(),
        });
        self.db()
            .conn()
            .execute(
                "INSERT INTO auth_sessions (token, user_id, expires_at, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                libsql::params![
                    token.as_str(),
                    user.id.as_str(),
                    expires_at.to_rfc3339(),
                    now.to_rfc3339()
                ],
            )
            .await
            .map_err(DatabaseError::from_write)?;
        Ok(Session {
            token,
            user_id: user.id.clone(),
            email: user.email.clone(),
            expires_at,
        })
    }

    /// The live session for `token`, if the row exists and has not expired.
    /// Expired rows are removed on sight.
    pub async fn find_session(&self, token: &str) -> Result<Option<Session>, DatabaseError> {
        let mut rows = self
            .db()
            .conn()
            .query(
                "SELECT s.user_id, u.email, s.expires_at
                 FROM auth_sessions s JOIN users u ON u.id = s.user_id
                 WHERE s.token = ?1",
                [token],
            )
            .await?;
        let Some(row) = rows.next().await? else {
            return Ok(None);
        };
        let session = Session {
            token: token.to_string(),
            user_id: row.get::<String>(0)?,
            email: row.get::<String>(1)?,
            expires_at: parse_datetime(&row.get::<String>(2)?)?,
        };
        drop(rows);

        if session.is_expired() {
            self.delete_session(token).await?;
            return Ok(None);
        }
        Ok(Some(session))
    }

    /// Returns whether a row was removed.
    pub async fn delete_session(&self, token: &str) -> Result<bool, DatabaseError> {
        let removed = self
            .db()
            .conn()
            .execute("DELETE FROM auth_sessions WHERE token = ?1", [token])
            .await?;
        Ok(removed > 0)
    }

    pub async fn purge_expired_sessions(&self) -> Result<u64, DatabaseError> {
        let removed = self
            .db()
            .conn()
            .execute(
                "DELETE FROM auth_sessions WHERE expires_at <= ?1",
                [Utc::now().to_rfc3339()],
            )
            .await?;
        if removed > 0 {
            tracing::debug!(removed, "expired sessions purged");
        }
        Ok(removed)
    }
}
