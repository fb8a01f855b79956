//! Hive repository. A hive's apiary must exist and belong to the same owner;
//! that is checked here because the foreign key alone cannot see ownership.

use chrono::Utc;
use nyuki_core::entities::{Hive, NewHive};
use nyuki_core::events::ChangeEvent;
use nyuki_core::ids::{PREFIX_HIVE, generate_id};
use nyuki_core::record::SyncRecord;
use nyuki_core::updates::hive::HivePatch;
use nyuki_sync::{Removal, Revision};

use crate::error::DatabaseError;
use crate::helpers::{get_opt_string, parse_datetime, parse_enum, parse_json, to_json};
use crate::service::NyukiService;

const HIVE_COLUMNS: &str = "id, user_id, apiary_id, name, queen_age, queen_color, health, \
     notes, metrics, version, client_ref, created_at, updated_at";

fn row_to_hive(row: &libsql::Row) -> Result<Hive, DatabaseError> {
    Ok(Hive {
        id: row.get::<String>(0)?,
        user_id: row.get::<String>(1)?,
        apiary_id: row.get::<String>(2)?,
        name: row.get::<String>(3)?,
        queen_age: row.get::<Option<i64>>(4)?,
        queen_color: get_opt_string(row, 5)?,
        health: parse_enum(&row.get::<String>(6)?)?,
        notes: get_opt_string(row, 7)?,
        metrics: parse_json(&row.get::<String>(8)?)?,
        version: row.get::<i64>(9)?,
        client_ref: get_opt_string(row, 10)?,
        created_at: parse_datetime(&row.get::<String>(11)?)?,
        updated_at: parse_datetime(&row.get::<String>(12)?)?,
    })
}

fn not_found(id: &str) -> DatabaseError {
    DatabaseError::NotFound {
        table: "hives",
        id: id.to_string(),
    }
}

fn missing_parent(apiary_id: &str) -> DatabaseError {
    DatabaseError::Constraint(format!(
        "foreign key violation: apiary {apiary_id} does not exist"
    ))
}

impl NyukiService {
    pub async fn list_hives(&self, owner_id: &str) -> Result<Vec<Hive>, DatabaseError> {
        let mut rows = self
            .db()
            .conn()
            .query(
                &format!(
                    "SELECT {HIVE_COLUMNS} FROM hives WHERE user_id = ?1 ORDER BY created_at, id"
                ),
                [owner_id],
            )
            .await?;
        let mut hives = Vec::new();
        while let Some(row) = rows.next().await? {
            hives.push(row_to_hive(&row)?);
        }
        Ok(hives)
    }

    pub async fn get_hive(&self, owner_id: &str, id: &str) -> Result<Hive, DatabaseError> {
        let mut rows = self
            .db()
            .conn()
            .query(
                &format!("SELECT {HIVE_COLUMNS} FROM hives WHERE id = ?1 AND user_id = ?2"),
                [id, owner_id],
            )
            .await?;
        let row = rows.next().await?.ok_or_else(|| not_found(id))?;
        row_to_hive(&row)
    }

    /// Insert at version 1. Does not touch the apiary's `total_hives`; the
    /// caller adjusts it through the counter calls.
    pub async fn create_hive(
        &self,
        owner_id: &str,
        draft: &NewHive,
        client_ref: &str,
    ) -> Result<Hive, DatabaseError> {
        let mut hive = Hive::placeholder(owner_id, client_ref, draft, Utc::now());
        hive.id = generate_id(PREFIX_HIVE);
        hive.version = 1;
        let metrics = to_json(&hive.metrics)?;

        let _gate = self.write_gate().await;
        if !self.apiary_exists(owner_id, &hive.apiary_id).await? {
            return Err(missing_parent(&hive.apiary_id));
        }
        self.db()
            .conn()
            .execute(
                &format!(
                    "INSERT INTO hives ({HIVE_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
                ),
                libsql::params![
                    hive.id.as_str(),
                    hive.user_id.as_str(),
                    hive.apiary_id.as_str(),
                    hive.name.as_str(),
                    hive.queen_age,
                    hive.queen_color.as_deref(),
                    hive.health.as_str(),
                    hive.notes.as_deref(),
                    metrics,
                    hive.version,
                    hive.client_ref.as_deref(),
                    hive.created_at.to_rfc3339(),
                    hive.updated_at.to_rfc3339()
                ],
            )
            .await
            .map_err(DatabaseError::from_write)?;

        self.publish_hive(
            owner_id,
            &ChangeEvent::Insert {
                record: hive.clone(),
            },
        );
        Ok(hive)
    }

    /// Apply the set fields of `patch` and bump the version. Setting
    /// `apiary_id` moves the hive. Returns the row before and after.
    pub async fn update_hive(
        &self,
        owner_id: &str,
        id: &str,
        patch: &HivePatch,
    ) -> Result<Revision<Hive>, DatabaseError> {
        let mut sets = Vec::new();
        let mut params: Vec<libsql::Value> = Vec::new();
        let mut idx = 1;

        if let Some(ref apiary_id) = patch.apiary_id {
            sets.push(format!("apiary_id = ?{idx}"));
            params.push(apiary_id.as_str().into());
            idx += 1;
        }
        if let Some(ref name) = patch.name {
            sets.push(format!("name = ?{idx}"));
            params.push(name.as_str().into());
            idx += 1;
        }
        if let Some(queen_age) = patch.queen_age {
            sets.push(format!("queen_age = ?{idx}"));
            params.push(queen_age.into());
            idx += 1;
        }
        if let Some(ref queen_color) = patch.queen_color {
            sets.push(format!("queen_color = ?{idx}"));
            params.push(queen_color.as_deref().into());
            idx += 1;
        }
        if let Some(health) = patch.health {
            sets.push(format!("health = ?{idx}"));
            params.push(health.as_str().into());
            idx += 1;
        }
        if let Some(ref notes) = patch.notes {
            sets.push(format!("notes = ?{idx}"));
            params.push(notes.as_deref().into());
            idx += 1;
        }
        if let Some(ref metrics) = patch.metrics {
            sets.push(format!("metrics = ?{idx}"));
            params.push(to_json(metrics)?.into());
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
            "UPDATE hives SET {} WHERE id = ?{id_idx} AND user_id = ?{idx} RETURNING {HIVE_COLUMNS}",
            sets.join(", ")
        );

        let _gate = self.write_gate().await;
        let before = self.get_hive(owner_id, id).await?;
        if let Some(apiary_id) = &patch.apiary_id
            && !self.apiary_exists(owner_id, apiary_id).await?
        {
            return Err(missing_parent(apiary_id));
        }
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
        let after = row_to_hive(&row)?;

        self.publish_hive(
            owner_id,
            &ChangeEvent::Update {
                record: after.clone(),
            },
        );
        Ok(Revision { before, after })
    }

    /// Returns the removed row and the version the deletion is recorded at.
    pub async fn delete_hive(
        &self,
        owner_id: &str,
        id: &str,
    ) -> Result<Removal<Hive>, DatabaseError> {
        let _gate = self.write_gate().await;
        let mut rows = self
            .db()
            .conn()
            .query(
                &format!("DELETE FROM hives WHERE id = ?1 AND user_id = ?2 RETURNING {HIVE_COLUMNS}"),
                [id, owner_id],
            )
            .await
            .map_err(DatabaseError::from_write)?;
        let row = rows
            .next()
            .await
            .map_err(DatabaseError::from_write)?
            .ok_or_else(|| not_found(id))?;
        let record = row_to_hive(&row)?;
        let version = record.version + 1;

        self.publish_hive(
            owner_id,
            &ChangeEvent::Delete {
                id: id.to_string(),
                version,
            },
        );
        Ok(Removal { record, version })
    }

    /// Number of hives currently placed in `apiary_id`.
    pub async fn count_hives_in(
        &self,
        owner_id: &str,
        apiary_id: &str,
    ) -> Result<i64, DatabaseError> {
        let mut rows = self
            .db()
            .conn()
            .query(
                "SELECT COUNT(*) FROM hives WHERE apiary_id = ?1 AND user_id = ?2",
                [apiary_id, owner_id],
            )
            .await?;
        let row = rows.next().await?.ok_or(DatabaseError::NoResult)?;
        Ok(row.get::<i64>(0)?)
    }
}
