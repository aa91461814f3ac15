//! Annotation version ledger repository.
//!
//! Owns the versioning and approval state machine for concept
//! annotations. Versions form a flat, id-indexed table; lineage is the
//! `parent_annotation_id` chain, and "current" is a flag repointed
//! inside the same transaction that appends a version.
//!
//! Concurrency discipline: every mutation locks only the rows of the
//! group it touches (`SELECT ... FOR UPDATE`), so unrelated groups stay
//! concurrent. A lost `create_version` race surfaces as
//! [`Error::VersionConflict`]; the ledger never retries internally.
//! Dropping an in-flight call rolls the open transaction back, leaving
//! no half-written version.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{postgres::PgRow, Pool, Postgres, Row, Transaction};
use tracing::{debug, info};
use uuid::Uuid;

use casuist_core::{
    new_v7, AnnotationLedger, AnnotationVersion, ApprovalStage, CreateAnnotationRequest, Error,
    OwnerEntityType, Result, UserEdits,
};

/// PostgreSQL implementation of [`AnnotationLedger`].
pub struct PgAnnotationRepository {
    pool: Pool<Postgres>,
}

impl PgAnnotationRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

const VERSION_COLUMNS: &str = "id, annotation_group_id, version_number, approval_stage, \
     parent_annotation_id, content, concept_uri, user_edits, is_current, created_at_utc";

fn row_to_version(row: &PgRow) -> Result<AnnotationVersion> {
    let stage_raw: String = row.get("approval_stage");
    let approval_stage = stage_raw.parse::<ApprovalStage>().map_err(Error::Internal)?;

    let user_edits: Option<UserEdits> = row
        .get::<Option<serde_json::Value>, _>("user_edits")
        .map(serde_json::from_value)
        .transpose()
        .map_err(|e| Error::Serialization(e.to_string()))?;

    Ok(AnnotationVersion {
        id: row.get("id"),
        annotation_group_id: row.get("annotation_group_id"),
        version_number: row.get("version_number"),
        approval_stage,
        parent_annotation_id: row.get("parent_annotation_id"),
        content: row.get("content"),
        concept_uri: row.get("concept_uri"),
        user_edits,
        is_current: row.get("is_current"),
        created_at_utc: row.get("created_at_utc"),
    })
}

/// Map a unique-index violation on `(group, version_number)` to the
/// retryable conflict error; everything else stays a database error.
fn map_version_race(e: sqlx::Error, group: Uuid, version: i32) -> Error {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.code().as_deref() == Some("23505") {
            return Error::VersionConflict(format!(
                "version {} of group {} was created concurrently",
                version, group
            ));
        }
    }
    Error::Database(e)
}

impl PgAnnotationRepository {
    /// Lock the group's current row and return `(current, next_version)`.
    ///
    /// The `FOR UPDATE` on the current row serializes concurrent
    /// `create_version` calls for one group; two racers cannot both
    /// read the same max.
    async fn lock_group_head(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        group_id: Uuid,
    ) -> Result<(AnnotationVersion, i32)> {
        let current_row = sqlx::query(&format!(
            "SELECT {} FROM annotation_version \
             WHERE annotation_group_id = $1 AND is_current \
             FOR UPDATE",
            VERSION_COLUMNS
        ))
        .bind(group_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(Error::Database)?;

        let current = match current_row {
            Some(row) => row_to_version(&row)?,
            None => {
                // Distinguish an unknown group from one whose current
                // flag was lost (corruption the consolidation job can
                // repair).
                let count: (i64,) = sqlx::query_as(
                    "SELECT COUNT(*) FROM annotation_version WHERE annotation_group_id = $1",
                )
                .bind(group_id)
                .fetch_one(&mut **tx)
                .await
                .map_err(Error::Database)?;

                if count.0 == 0 {
                    return Err(Error::GroupNotFound(group_id));
                }
                return Err(Error::HistoryCorrupt {
                    group: group_id,
                    detail: "no current version".to_string(),
                });
            }
        };

        let max: (Option<i32>,) = sqlx::query_as(
            "SELECT MAX(version_number) FROM annotation_version WHERE annotation_group_id = $1",
        )
        .bind(group_id)
        .fetch_one(&mut **tx)
        .await
        .map_err(Error::Database)?;

        // A rollback can leave current below max; new versions always
        // continue from max so numbers are never reused.
        Ok((current, max.0.unwrap_or(0) + 1))
    }

    /// Reject a parent reference that would close a cycle: a same-group
    /// parent must carry a strictly lower version number than the row
    /// being written.
    async fn check_parent(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        parent_id: Uuid,
        group_id: Uuid,
        new_version: i32,
    ) -> Result<()> {
        let parent: Option<(Uuid, i32)> = sqlx::query_as(
            "SELECT annotation_group_id, version_number FROM annotation_version WHERE id = $1",
        )
        .bind(parent_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(Error::Database)?;

        match parent {
            None => Err(Error::NotFound(format!(
                "parent annotation {}",
                parent_id
            ))),
            Some((parent_group, parent_version))
                if parent_group == group_id && parent_version >= new_version =>
            {
                Err(Error::InvalidInput(format!(
                    "parent version {} would not precede version {}",
                    parent_version, new_version
                )))
            }
            Some(_) => Ok(()),
        }
    }
}

#[async_trait]
impl AnnotationLedger for PgAnnotationRepository {
    async fn create_version(&self, req: CreateAnnotationRequest) -> Result<AnnotationVersion> {
        req.validate()?;

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let (group_id, version_number, default_parent) = match req.group_id {
            None => (Uuid::new_v4(), 1, None),
            Some(group_id) => {
                let (current, next) = self.lock_group_head(&mut tx, group_id).await?;
                (group_id, next, Some(current.id))
            }
        };

        let parent_annotation_id = req.parent_annotation_id.or(default_parent);
        if let Some(parent_id) = parent_annotation_id {
            self.check_parent(&mut tx, parent_id, group_id, version_number)
                .await?;
        }

        let stage = req.stage.unwrap_or_default();
        let user_edits_json = req
            .user_edits
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| Error::Serialization(e.to_string()))?;

        sqlx::query(
            "UPDATE annotation_version SET is_current = false \
             WHERE annotation_group_id = $1 AND is_current",
        )
        .bind(group_id)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        let id = new_v7();
        let row = sqlx::query(&format!(
            "INSERT INTO annotation_version \
                 (id, annotation_group_id, version_number, approval_stage, \
                  parent_annotation_id, content, concept_uri, user_edits, is_current) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, true) \
             RETURNING {}",
            VERSION_COLUMNS
        ))
        .bind(id)
        .bind(group_id)
        .bind(version_number)
        .bind(stage.as_str())
        .bind(parent_annotation_id)
        .bind(&req.content)
        .bind(&req.concept_uri)
        .bind(&user_edits_json)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_version_race(e, group_id, version_number))?;

        let version = row_to_version(&row)?;
        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "db",
            component = "ledger",
            op = "create_version",
            group_id = %group_id,
            version_number,
            stage = stage.as_str(),
            "Annotation version created"
        );
        Ok(version)
    }

    async fn promote(&self, version_id: Uuid, to: ApprovalStage) -> Result<AnnotationVersion> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let row = sqlx::query(&format!(
            "SELECT {} FROM annotation_version WHERE id = $1 FOR UPDATE",
            VERSION_COLUMNS
        ))
        .bind(version_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(Error::Database)?
        .ok_or_else(|| Error::NotFound(format!("annotation version {}", version_id)))?;

        let mut version = row_to_version(&row)?;
        if !version.approval_stage.can_advance_to(to) {
            return Err(Error::InvalidTransition {
                from: version.approval_stage,
                to,
            });
        }

        sqlx::query("UPDATE annotation_version SET approval_stage = $1 WHERE id = $2")
            .bind(to.as_str())
            .bind(version_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;

        debug!(
            subsystem = "db",
            component = "ledger",
            op = "promote",
            group_id = %version.annotation_group_id,
            from = version.approval_stage.as_str(),
            to = to.as_str(),
            "Approval stage advanced"
        );
        version.approval_stage = to;
        Ok(version)
    }

    async fn rollback(&self, group_id: Uuid, to_version: i32) -> Result<AnnotationVersion> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let target_row = sqlx::query(&format!(
            "SELECT {} FROM annotation_version \
             WHERE annotation_group_id = $1 AND version_number = $2 \
             FOR UPDATE",
            VERSION_COLUMNS
        ))
        .bind(group_id)
        .bind(to_version)
        .fetch_optional(&mut *tx)
        .await
        .map_err(Error::Database)?
        .ok_or_else(|| {
            Error::NotFound(format!("version {} in group {}", to_version, group_id))
        })?;

        let mut target = row_to_version(&target_row)?;

        // Later versions stay in place as history; only the flag moves.
        sqlx::query(
            "UPDATE annotation_version SET is_current = false \
             WHERE annotation_group_id = $1 AND is_current",
        )
        .bind(group_id)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        sqlx::query("UPDATE annotation_version SET is_current = true WHERE id = $1")
            .bind(target.id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "db",
            component = "ledger",
            op = "rollback",
            group_id = %group_id,
            to_version,
            "Current version repointed"
        );
        target.is_current = true;
        Ok(target)
    }

    async fn current(&self, group_id: Uuid) -> Result<Option<AnnotationVersion>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM annotation_version \
             WHERE annotation_group_id = $1 AND is_current",
            VERSION_COLUMNS
        ))
        .bind(group_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.as_ref().map(row_to_version).transpose()
    }

    async fn get(&self, version_id: Uuid) -> Result<Option<AnnotationVersion>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM annotation_version WHERE id = $1",
            VERSION_COLUMNS
        ))
        .bind(version_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.as_ref().map(row_to_version).transpose()
    }

    async fn history(&self, group_id: Uuid) -> Result<Vec<AnnotationVersion>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM annotation_version WHERE annotation_group_id = $1",
            VERSION_COLUMNS
        ))
        .bind(group_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        if rows.is_empty() {
            return Err(Error::GroupNotFound(group_id));
        }

        // Flat table, id-indexed; the chain walk is bounded by the
        // visited set so corrupted data reports instead of hanging.
        let mut arena: HashMap<Uuid, AnnotationVersion> = HashMap::with_capacity(rows.len());
        for row in &rows {
            let version = row_to_version(row)?;
            arena.insert(version.id, version);
        }

        let head_id = arena
            .values()
            .find(|v| v.is_current)
            .map(|v| v.id)
            .ok_or_else(|| Error::HistoryCorrupt {
                group: group_id,
                detail: "no current version".to_string(),
            })?;

        let mut lineage = Vec::with_capacity(arena.len());
        let mut visited = std::collections::HashSet::new();
        let mut cursor = Some(head_id);

        while let Some(id) = cursor {
            if !visited.insert(id) {
                return Err(Error::HistoryCorrupt {
                    group: group_id,
                    detail: format!("parent cycle through {}", id),
                });
            }
            let version = match arena.get(&id) {
                Some(v) => v.clone(),
                // A parent outside the group ends this group's lineage;
                // a parent that exists nowhere is dangling.
                None => match self.get(id).await? {
                    Some(_) => break,
                    None => {
                        return Err(Error::HistoryCorrupt {
                            group: group_id,
                            detail: format!("dangling parent {}", id),
                        })
                    }
                },
            };
            cursor = version.parent_annotation_id;
            lineage.push(version);
        }

        Ok(lineage)
    }

    async fn delete_group(&self, group_id: Uuid) -> Result<u64> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        sqlx::query(
            "DELETE FROM triple WHERE owner_entity_type = $1 AND owner_entity_id = $2",
        )
        .bind(OwnerEntityType::AnnotationGroup.as_str())
        .bind(group_id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        // Parent references point backward within the group, so a
        // single unordered delete is safe once the FK is deferred or
        // the rows go together.
        let result = sqlx::query("DELETE FROM annotation_version WHERE annotation_group_id = $1")
            .bind(group_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::GroupNotFound(group_id));
        }

        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "db",
            component = "ledger",
            op = "delete_group",
            group_id = %group_id,
            rows_removed = result.rows_affected(),
            "Annotation group deleted"
        );
        Ok(result.rows_affected())
    }
}
