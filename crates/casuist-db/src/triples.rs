//! Triple store repository implementation.
//!
//! Facts are append-only on the live path: `put` never updates an
//! existing row, and an identical candidate resolves to the row that is
//! already there. Deletion happens only through supersession
//! (`delete_by_owner`) and the consolidation job.

use async_trait::async_trait;
use sqlx::{postgres::PgRow, Pool, Postgres, Row, Transaction};
use tracing::debug;
use uuid::Uuid;

use casuist_core::{
    new_v7, CandidateTriple, Error, OwnerEntityType, Result, Triple, TriplePattern, TripleStore,
};

/// PostgreSQL implementation of [`TripleStore`].
pub struct PgTripleRepository {
    pool: Pool<Postgres>,
}

impl PgTripleRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn row_to_triple(row: &PgRow) -> Result<Triple> {
    let owner_type_raw: String = row.get("owner_entity_type");
    let owner_entity_type = owner_type_raw
        .parse::<OwnerEntityType>()
        .map_err(Error::Internal)?;

    Ok(Triple {
        id: row.get("id"),
        subject: row.get("subject"),
        predicate: row.get("predicate"),
        object: row.get("object"),
        is_literal: row.get("is_literal"),
        graph: row.get("graph"),
        owner_entity_type,
        owner_entity_id: row.get("owner_entity_id"),
        metadata: row.get("metadata"),
        created_at_utc: row.get("created_at_utc"),
    })
}

/// Build the WHERE clause for a pattern query.
///
/// Clause order must match the bind order in [`bind_pattern`].
fn build_pattern_clause(pattern: &TriplePattern) -> String {
    let mut clause = String::from("WHERE TRUE ");
    let mut idx = 1;
    let mut push = |column: &str, clause: &mut String| {
        clause.push_str(&format!("AND {} = ${} ", column, idx));
        idx += 1;
    };

    if pattern.subject.is_some() {
        push("subject", &mut clause);
    }
    if pattern.predicate.is_some() {
        push("predicate", &mut clause);
    }
    if pattern.object.is_some() {
        push("object", &mut clause);
    }
    if pattern.is_literal.is_some() {
        push("is_literal", &mut clause);
    }
    if pattern.graph.is_some() {
        push("graph", &mut clause);
    }
    if pattern.owner_entity_type.is_some() {
        push("owner_entity_type", &mut clause);
    }
    if pattern.owner_entity_id.is_some() {
        push("owner_entity_id", &mut clause);
    }
    clause
}

fn bind_pattern<'q>(
    mut query: sqlx::query::Query<'q, Postgres, sqlx::postgres::PgArguments>,
    pattern: &'q TriplePattern,
) -> sqlx::query::Query<'q, Postgres, sqlx::postgres::PgArguments> {
    if let Some(subject) = &pattern.subject {
        query = query.bind(subject);
    }
    if let Some(predicate) = &pattern.predicate {
        query = query.bind(predicate);
    }
    if let Some(object) = &pattern.object {
        query = query.bind(object);
    }
    if let Some(is_literal) = pattern.is_literal {
        query = query.bind(is_literal);
    }
    if let Some(graph) = &pattern.graph {
        query = query.bind(graph);
    }
    if let Some(owner_type) = pattern.owner_entity_type {
        query = query.bind(owner_type.as_str());
    }
    if let Some(owner_id) = &pattern.owner_entity_id {
        query = query.bind(owner_id);
    }
    query
}

#[async_trait]
impl TripleStore for PgTripleRepository {
    async fn put(&self, candidate: &CandidateTriple) -> Result<Uuid> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let id = self.put_tx(&mut tx, candidate).await?;
        tx.commit().await.map_err(Error::Database)?;
        Ok(id)
    }

    async fn delete_by_owner(
        &self,
        entity_type: OwnerEntityType,
        entity_id: &str,
    ) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM triple WHERE owner_entity_type = $1 AND owner_entity_id = $2",
        )
        .bind(entity_type.as_str())
        .bind(entity_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(result.rows_affected())
    }

    async fn query(&self, pattern: &TriplePattern) -> Result<Vec<Triple>> {
        let sql = format!(
            r#"
            SELECT id, subject, predicate, object, is_literal, graph,
                   owner_entity_type, owner_entity_id, metadata, created_at_utc
            FROM triple
            {}
            ORDER BY created_at_utc, id
            "#,
            build_pattern_clause(pattern)
        );

        let rows = bind_pattern(sqlx::query(&sql), pattern)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        rows.iter().map(row_to_triple).collect()
    }

    async fn get(&self, id: Uuid) -> Result<Option<Triple>> {
        let row = sqlx::query(
            r#"
            SELECT id, subject, predicate, object, is_literal, graph,
                   owner_entity_type, owner_entity_id, metadata, created_at_utc
            FROM triple
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.as_ref().map(row_to_triple).transpose()
    }
}

/// Transaction-aware variants for composition inside ledger and dedup
/// transactions.
impl PgTripleRepository {
    /// Idempotent insert within an existing transaction.
    ///
    /// The unique index on `(graph, dedup_key)` backs the insert; a
    /// concurrent identical writer loses the race and reads the winner's
    /// row instead.
    pub async fn put_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        candidate: &CandidateTriple,
    ) -> Result<Uuid> {
        candidate.validate()?;
        let key = candidate.dedup_key();

        let inserted: Option<(Uuid,)> = sqlx::query_as(
            r#"
            INSERT INTO triple (id, subject, predicate, object, is_literal, graph,
                                owner_entity_type, owner_entity_id, dedup_key, metadata)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (graph, dedup_key) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(new_v7())
        .bind(&candidate.subject)
        .bind(&candidate.predicate)
        .bind(&candidate.object)
        .bind(candidate.is_literal)
        .bind(&candidate.graph)
        .bind(candidate.owner_entity_type.as_str())
        .bind(&candidate.owner_entity_id)
        .bind(&key)
        .bind(&candidate.metadata)
        .fetch_optional(&mut **tx)
        .await
        .map_err(Error::Database)?;

        if let Some((id,)) = inserted {
            return Ok(id);
        }

        // First writer wins: the identical fact is already present.
        let existing: (Uuid,) =
            sqlx::query_as("SELECT id FROM triple WHERE graph = $1 AND dedup_key = $2")
                .bind(&candidate.graph)
                .bind(&key)
                .fetch_one(&mut **tx)
                .await
                .map_err(Error::Database)?;

        debug!(
            subsystem = "db",
            component = "triples",
            op = "put",
            triple_id = %existing.0,
            "Candidate collapsed onto existing triple"
        );
        Ok(existing.0)
    }

    /// Remove every triple owned by one entity within an existing
    /// transaction.
    pub async fn delete_by_owner_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        entity_type: OwnerEntityType,
        entity_id: &str,
    ) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM triple WHERE owner_entity_type = $1 AND owner_entity_id = $2",
        )
        .bind(entity_type.as_str())
        .bind(entity_id)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;

        Ok(result.rows_affected())
    }
}
