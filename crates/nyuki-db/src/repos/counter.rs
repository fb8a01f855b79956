//! Atomic maintenance of `apiaries.total_hives`.
//!
//! Each adjustment is one `UPDATE … RETURNING` statement, so concurrent
//! increments and decrements never lose an update. The table's `CHECK`
//! constraint refuses a decrement past zero. A recount recomputes the column
//! from the `hives` table in the same single statement.

use chrono::Utc;
use nyuki_core::entities::Apiary;
use nyuki_core::events::ChangeEvent;

use super::apiary::{APIARY_COLUMNS, row_to_apiary};
use crate::error::DatabaseError;
use crate::service::NyukiService;

impl NyukiService {
    /// Add `delta` to the apiary's hive count and bump its version. A result
    /// below zero fails with `DatabaseError::Constraint`.
    pub async fn adjust_hive_count(
        &self,
        owner_id: &str,
        apiary_id: &str,
        delta: i64,
    ) -> Result<Apiary, DatabaseError> {
        let _gate = self.write_gate().await;
        let mut rows = self
            .db()
            .conn()
            .query(
                &format!(
                    "UPDATE apiaries
                     SET total_hives = total_hives + ?1,
                         version = version + 1,
                         updated_at = ?2
                     WHERE id = ?3 AND user_id = ?4
                     RETURNING {APIARY_COLUMNS}"
                ),
                libsql::params![delta, Utc::now().to_rfc3339(), apiary_id, owner_id],
            )
            .await
            .map_err(DatabaseError::from_write)?;
        let row = rows
            .next()
            .await
            .map_err(DatabaseError::from_write)?
            .ok_or_else(|| DatabaseError::NotFound {
                table: "apiaries",
                id: apiary_id.to_string(),
            })?;
        let apiary = row_to_apiary(&row)?;
        tracing::debug!(apiary_id, delta, total_hives = apiary.total_hives, "hive count adjusted");

        self.publish_apiary(
            owner_id,
            &ChangeEvent::Update {
                record: apiary.clone(),
            },
        );
        Ok(apiary)
    }

    /// Set the apiary's hive count to the number of its hives and bump its
    /// version.
    pub async fn recount_hives(
        &self,
        owner_id: &str,
        apiary_id: &str,
    ) -> Result<Apiary, DatabaseError> {
        let _gate = self.write_gate().await;
        let mut rows = self
            .db()
            .conn()
            .query(
                &format!(
                    "UPDATE apiaries
                     SET total_hives = (SELECT COUNT(*) FROM hives
                                        WHERE hives.apiary_id = ?1 AND hives.user_id = ?2),
                         version = version + 1,
                         updated_at = ?3
                     WHERE id = ?1 AND user_id = ?2
                     RETURNING {APIARY_COLUMNS}"
                ),
                libsql::params![apiary_id, owner_id, Utc::now().to_rfc3339()],
            )
            .await
            .map_err(DatabaseError::from_write)?;
        let row = rows
            .next()
            .await
            .map_err(DatabaseError::from_write)?
            .ok_or_else(|| DatabaseError::NotFound {
                table: "apiaries",
                id: apiary_id.to_string(),
            })?;
        let apiary = row_to_apiary(&row)?;
        tracing::info!(apiary_id, total_hives = apiary.total_hives, "hive count recounted");

        self.publish_apiary(
            owner_id,
            &ChangeEvent::Update {
                record: apiary.clone(),
            },
        );
        Ok(apiary)
    }
}
