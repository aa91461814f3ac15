//! Deduplication service: triple-level exact matching and guideline
//! consolidation.
//!
//! Triple identity is syntactic — an exact-match key over the canonical
//! tuple — and first writer wins: the existing row is kept, the
//! candidate discarded. Guideline consolidation heals the historical
//! defect of several guideline records pointing at one document; the
//! oldest record is canonical and every reference is repointed in a
//! single transaction.

use std::time::Instant;

use sqlx::{Pool, Postgres};
use tracing::{debug, info};
use uuid::Uuid;

use casuist_core::{CandidateTriple, Error, OwnerEntityType, Result};

use crate::triples::PgTripleRepository;

/// Outcome of resolving a candidate triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedTriple {
    pub triple_id: Uuid,
    /// True only the first time this fact was seen for its owner.
    pub is_new: bool,
}

/// PostgreSQL deduplication service.
pub struct PgDedupService {
    pool: Pool<Postgres>,
    triples: PgTripleRepository,
}

impl PgDedupService {
    /// Create a new dedup service with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        let triples = PgTripleRepository::new(pool.clone());
        Self { pool, triples }
    }

    /// Resolve a candidate fact to a single canonical row.
    ///
    /// Idempotent: an identical candidate returns the same id with
    /// `is_new = false`. No fuzzy matching happens here; restatements
    /// that differ syntactically are distinct facts.
    pub async fn resolve(&self, candidate: &CandidateTriple) -> Result<ResolvedTriple> {
        candidate.validate()?;
        let key = candidate.dedup_key();

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let existing: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM triple WHERE graph = $1 AND dedup_key = $2")
                .bind(&candidate.graph)
                .bind(&key)
                .fetch_optional(&mut *tx)
                .await
                .map_err(Error::Database)?;

        if let Some((id,)) = existing {
            tx.rollback().await.map_err(Error::Database)?;
            debug!(
                subsystem = "db",
                component = "dedup",
                op = "resolve",
                triple_id = %id,
                "Exact match short-circuited to existing triple"
            );
            return Ok(ResolvedTriple {
                triple_id: id,
                is_new: false,
            });
        }

        let id = self.triples.put_tx(&mut tx, candidate).await?;
        tx.commit().await.map_err(Error::Database)?;

        Ok(ResolvedTriple {
            triple_id: id,
            is_new: true,
        })
    }

    /// Collapse duplicate guideline records for a document onto the
    /// oldest one and return its id.
    ///
    /// All repoints (triples, the document's canonical pointer) and the
    /// deletion of superseded guideline rows happen in one transaction;
    /// a failure anywhere leaves every record untouched. Locking the
    /// guideline set `FOR UPDATE` serializes concurrent consolidation
    /// of the same document.
    ///
    /// With no duplicates present this is a no-op returning the single
    /// canonical id.
    pub async fn resolve_guideline(&self, document_id: i64) -> Result<i64> {
        let start = Instant::now();
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        // Oldest wins: earliest created_at_utc, lowest id as tie-break.
        let guideline_ids: Vec<(i64,)> = sqlx::query_as(
            "SELECT id FROM guideline WHERE document_id = $1 \
             ORDER BY created_at_utc ASC, id ASC \
             FOR UPDATE",
        )
        .bind(document_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(Error::Database)?;

        let mut ids = guideline_ids.into_iter().map(|r| r.0);
        let canonical = ids.next().ok_or(Error::GuidelineNotFound(document_id))?;
        let superseded: Vec<i64> = ids.collect();

        if superseded.is_empty() {
            tx.rollback().await.map_err(Error::Database)?;
            return Ok(canonical);
        }

        let superseded_keys: Vec<String> =
            superseded.iter().map(|id| id.to_string()).collect();

        let repointed = sqlx::query(
            "UPDATE triple SET owner_entity_id = $1 \
             WHERE owner_entity_type = $2 AND owner_entity_id = ANY($3)",
        )
        .bind(canonical.to_string())
        .bind(OwnerEntityType::Guideline.as_str())
        .bind(&superseded_keys)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?
        .rows_affected();

        sqlx::query(
            "UPDATE document SET canonical_guideline_id = $1 \
             WHERE id = $2 AND (canonical_guideline_id IS NULL \
                                OR canonical_guideline_id = ANY($3))",
        )
        .bind(canonical)
        .bind(document_id)
        .bind(&superseded)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        let deleted = sqlx::query("DELETE FROM guideline WHERE id = ANY($1)")
            .bind(&superseded)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?
            .rows_affected();

        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "db",
            component = "dedup",
            op = "resolve_guideline",
            document_id,
            guideline_id = canonical,
            rows_removed = deleted,
            triples_repointed = repointed,
            duration_ms = start.elapsed().as_millis() as u64,
            "Duplicate guidelines consolidated"
        );
        Ok(canonical)
    }
}
