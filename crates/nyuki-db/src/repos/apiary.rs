//! Apiary repository. Every statement is scoped by `user_id`; a row owned by
//! someone else behaves exactly like a missing one.

use chrono::Utc;
use nyuki_core::entities::{Apiary, NewApiary};
use nyuki_core::events::ChangeEvent;
use nyuki_core::ids::{PREFIX_APIARY, generate_id};
use nyuki_core::record::SyncRecord;
use nyuki_core::updates::apiary::ApiaryPatch;
use nyuki_sync::{Removal, Revision};

use crate::error::DatabaseError;
use crate::helpers::{get_opt_string, parse_datetime};
use crate::service::NyukiService;

pub(crate) const APIARY_COLUMNS: &str = "id, user_id, name, location, description, notes, \
     total_hives, version, client_ref, created_at, updated_at";

pub(crate) fn row_to_apiary(row: &libsql::Row) -> Result<Apiary, DatabaseError> {
    Ok(Apiary {
        id: row.get::<String>(0)?,
        user_id: row.get::<String>(1)?,
        name: row.get::<String>(2)?,
        location: row.get::<String>(3)?,
        description: get_opt_string(row, 4)?,
        notes: get_opt_string(row, 5)?,
        total_hives: row.get::<i64>(6)?,
        version: row.get::<i64>(7)?,
        client_ref: get_opt_string(row, 8)?,
        created_at: parse_datetime(&row.get::<String>(9)?)?,
        updated_at: parse_datetime(&row.get::<String>(10)?)?,
    })
}

fn not_found(id: &str) -> DatabaseError {
    DatabaseError::NotFound {
        table: "apiaries",
        id: id.to_string(),
    }
}

impl NyukiService {
    pub async fn list_apiaries(&self, owner_id: &str) -> Result<Vec<Apiary>, DatabaseError> {
        let mut rows = self
            .db()
            .conn()
            .query(
                &format!(
                    "SELECT {APIARY_COLUMNS} FROM apiaries WHERE user_id = ?1
                     ORDER BY created_at, id"
                ),
                [owner_id],
            )
            .await?;
        let mut apiaries = Vec::new();
        while let Some(row) = rows.next().await? {
            apiaries.push(row_to_apiary(&row)?);
        }
        Ok(apiaries)
    }

    pub async fn get_apiary(&self, owner_id: &str, id: &str) -> Result<Apiary, DatabaseError> {
        let mut rows = self
            .db()
            .conn()
            .query(
                &format!("SELECT {APIARY_COLUMNS} FROM apiaries WHERE id = ?1 AND user_id = ?2"),
                [id, owner_id],
            )
            .await?;
        let row = rows.next().await?.ok_or_else(|| not_found(id))?;
        row_to_apiary(&row)
    }

    pub(crate) async fn apiary_exists(
        &self,
        owner_id: &str,
        id: &str,
    ) -> Result<bool, DatabaseError> {
        let mut rows = self
            .db()
            .conn()
            .query(
                "SELECT 1 FROM apiaries WHERE id = ?1 AND user_id = ?2",
                [id, owner_id],
            )
            .await?;
        Ok(rows.next().await?.is_some())
    }

    /// Insert at version 1 with `total_hives = 0`, echoing `client_ref`.
    pub async fn create_apiary(
        &self,
        owner_id: &str,
        draft: &NewApiary,
        client_ref: &str,
    ) -> Result<Apiary, DatabaseError> {
        let _gate = self.write_gate().await;
        let mut apiary = Apiary::placeholder(owner_id, client_ref, draft, Utc::now());
        apiary.id = generate_id(PREFIX_APIARY);
        apiary.version = 1;

        self.db()
            .conn()
            .execute(
                &format!(
                    "INSERT INTO apiaries ({APIARY_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
                ),
                libsql::params![
                    apiary.id.as_str(),
                    apiary.user_id.as_str(),
                    apiary.name.as_str(),
                    apiary.location.as_str(),
                    apiary.description.as_deref(),
                    apiary.notes.as_deref(),
                    apiary.total_hives,
                    apiary.version,
                    apiary.client_ref.as_deref(),
                    apiary.created_at.to_rfc3339(),
                    apiary.updated_at.to_rfc3339()
                ],
            )
            .await
            .map_err(DatabaseError::from_write)?;

        self.publish_apiary(
            owner_id,
            &ChangeEvent::Insert {
                record: apiary.clone(),
            },
        );
        Ok(apiary)
    }

    /// Apply the set fields of `patch` and bump the version. Returns the row
    /// before and after.
    pub async fn update_apiary(
        &self,
        owner_id: &str,
        id: &str,
        patch: &ApiaryPatch,
    ) -> Result<Revision<Apiary>, DatabaseError> {
        let mut sets = Vec::new();
        let mut params: Vec<libsql::Value> = Vec::new();
        let mut idx = 1;

        if let Some(ref name) = patch.name {
            sets.push(format!("name = ?{idx}"));
            params.push(name.as_str().into());
            idx += 1;
        }
        if let Some(ref location) = patch.location {
            sets.push(format!("location = ?{idx}"));
            params.push(location.as_str().into());
            idx += 1;
        }
        if let Some(ref description) = patch.description {
            sets.push(format!("description = ?{idx}"));
            params.push(description.as_deref().into());
            idx += 1;
        }
        if let Some(ref notes) = patch.notes {
            sets.push(format!("notes = ?{idx}"));
            params.push(notes.as_deref().into());
            idx += 1;
        }

        sets.push("version = version + 1".to_string());
        sets.push(format!("updated_at = ?{idx}"));
        params.push(Utc::now().to_rfc3339().into());
        idx += 1;

        params.push(id.into());
        let id_idx = idx;
        idx += 1;
        params.push(owner_id.into());
        let sql = format!(
            "UPDATE apiaries SET {} WHERE id = ?{id_idx} AND user_id = ?{idx} RETURNING {APIARY_COLUMNS}",
            sets.join(", ")
        );

        let _gate = self.write_gate().await;
        let before = self.get_apiary(owner_id, id).await?;
        let mut rows = self
            .db()
            .conn()
            .query(&sql, libsql::params_from_iter(params))
            .await
            .map_err(DatabaseError::from_write)?;
        let row = rows
            .next()
            .await
            .map_err(DatabaseError::from_write)?
            .ok_or_else(|| not_found(id))?;
        let after = row_to_apiary(&row)?;

        self.publish_apiary(
            owner_id,
            &ChangeEvent::Update {
                record: after.clone(),
            },
        );
        Ok(Revision { before, after })
    }

    /// Delete an empty apiary. The removal carries the last stored row and
    /// the version the deletion is recorded at, one past the row's.
    pub async fn delete_apiary(
        &self,
        owner_id: &str,
        id: &str,
    ) -> Result<Removal<Apiary>, DatabaseError> {
        let _gate = self.write_gate().await;
        if !self.apiary_exists(owner_id, id).await? {
            return Err(not_found(id));
        }

        let occupied = self.count_hives_in(owner_id, id).await?;
        if occupied > 0 {
            return Err(DatabaseError::Constraint(format!(
                "foreign key violation: apiary {id} still has {occupied} hive(s)"
            )));
        }

        let mut rows = self
            .db()
            .conn()
            .query(
                &format!("DELETE FROM apiaries WHERE id = ?1 AND user_id = ?2 RETURNING {APIARY_COLUMNS}"),
                [id, owner_id],
            )
            .await
            .map_err(DatabaseError::from_write)?;
        let row = rows
            .next()
            .await
            .map_err(DatabaseError::from_write)?
            .ok_or_else(|| not_found(id))?;
        let record = row_to_apiary(&row)?;
        let version = record.version + 1;

        self.publish_apiary(
            owner_id,
            &ChangeEvent::Delete {
                id: id.to_string(),
                version,
            },
        );
        Ok(Removal { record, version })
    }
}
