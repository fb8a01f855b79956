//! Profile repository.

use chrono::Utc;
use nyuki_core::entities::Profile;
use nyuki_core::updates::profile::ProfilePatch;

use crate::error::DatabaseError;
use crate::helpers::{get_opt_string, parse_datetime};
use crate::service::NyukiService;

const PROFILE_COLUMNS: &str =
    "user_id, email, first_name, last_name, avatar_url, created_at, updated_at";

fn row_to_profile(row: &libsql::Row) -> Result<Profile, DatabaseError> {
    Ok(Profile {
        user_id: row.get::<String>(0)?,
        email: row.get::<String>(1)?,
        first_name: row.get::<String>(2)?,
        last_name: row.get::<String>(3)?,
        avatar_url: get_opt_string(row, 4)?,
        created_at: parse_datetime(&row.get::<String>(5)?)?,
        updated_at: parse_datetime(&row.get::<String>(6)?)?,
    })
}

impl NyukiService {
    pub async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, DatabaseError> {
        let mut rows = self
            .db()
            .conn()
            .query(
                &format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE user_id = ?1"),
                [user_id],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row_to_profile(&row)?)),
            None => Ok(None),
        }
    }

    /// Fails with `Constraint` if the user already has a profile or does
    /// not exist.
    pub async fn insert_profile(&self, profile: &Profile) -> Result<Profile, DatabaseError> {
        self.db()
            .conn()
            .execute(
                &format!(
                    "INSERT INTO profiles ({PROFILE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
                ),
                libsql::params![
                    profile.user_id.as_str(),
                    profile.email.as_str(),
                    profile.first_name.as_str(),
                    profile.last_name.as_str(),
                    profile.avatar_url.as_deref(),
                    profile.created_at.to_rfc3339(),
                    profile.updated_at.to_rfc3339()
                ],
            )
            .await
            .map_err(DatabaseError::from_write)?;
        Ok(profile.clone())
    }

    pub async fn update_profile_fields(
        &self,
        user_id: &str,
        patch: &ProfilePatch,
    ) -> Result<Profile, DatabaseError> {
        let mut sets = Vec::new();
        let mut params: Vec<libsql::Value> = Vec::new();
        let mut idx = 1;

        if let Some(ref first_name) = patch.first_name {
            sets.push(format!("first_name = ?{idx}"));
            params.push(first_name.as_str().into());
            idx += 1;
        }
        if let Some(ref last_name) = patch.last_name {
            sets.push(format!("last_name = ?{idx}"));
            params.push(last_name.as_str().into());
            idx += 1;
        }
        if let Some(ref avatar_url) = patch.avatar_url {
            sets.push(format!("avatar_url = ?{idx}"));
            params.push(avatar_url.as_deref().into());
            idx += 1;
        }

        sets.push(format!("updated_at = ?{idx}"));
        params.push(Utc::now().to_rfc3339().into());
        idx += 1;
        params.push(user_id.into());

        let sql = format!(
            "UPDATE profiles SET {} WHERE user_id = ?{idx} RETURNING {PROFILE_COLUMNS}",
            sets.join(", ")
        );
        let mut rows = self
            .db()
            .conn()
            .query(&sql, libsql::params_from_iter(params))
            .await
            .map_err(DatabaseError::from_write)?;
        let row = rows
            .next()
            .await?
            .ok_or_else(|| DatabaseError::NotFound {
                table: "profiles",
                id: user_id.to_string(),
            })?;
        row_to_profile(&row)
    }
}
