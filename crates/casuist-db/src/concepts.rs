//! Ontology concept repository.
//!
//! Concepts are keyed by URI and carry a cached embedding so the
//! scorer does not re-embed the whole ontology per run.

use chrono::Utc;
use pgvector::Vector;
use sqlx::{postgres::PgRow, Pool, Postgres, Row};

use casuist_core::{Error, OntologyConcept, Result};

/// PostgreSQL ontology concept repository.
pub struct PgConceptRepository {
    pool: Pool<Postgres>,
}

fn row_to_concept(row: &PgRow) -> OntologyConcept {
    OntologyConcept {
        uri: row.get("uri"),
        label: row.get("label"),
        embedding: row.get("embedding"),
        updated_at_utc: row.get("updated_at_utc"),
    }
}

impl PgConceptRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Insert or refresh a concept and its embedding.
    pub async fn upsert(
        &self,
        uri: &str,
        label: &str,
        embedding: Option<&Vector>,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO ontology_concept (uri, label, embedding, updated_at_utc) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (uri) DO UPDATE \
                 SET label = EXCLUDED.label, \
                     embedding = COALESCE(EXCLUDED.embedding, ontology_concept.embedding), \
                     updated_at_utc = EXCLUDED.updated_at_utc",
        )
        .bind(uri)
        .bind(label)
        .bind(embedding)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(())
    }

    /// Fetch one concept by URI.
    pub async fn get(&self, uri: &str) -> Result<Option<OntologyConcept>> {
        let row = sqlx::query(
            "SELECT uri, label, embedding, updated_at_utc FROM ontology_concept WHERE uri = $1",
        )
        .bind(uri)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.as_ref().map(row_to_concept))
    }

    /// Every concept, for similarity scans.
    pub async fn list_all(&self) -> Result<Vec<OntologyConcept>> {
        let rows = sqlx::query(
            "SELECT uri, label, embedding, updated_at_utc FROM ontology_concept ORDER BY uri",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.iter().map(row_to_concept).collect())
    }

    /// Concepts that still need an embedding computed.
    pub async fn list_unembedded(&self) -> Result<Vec<OntologyConcept>> {
        let rows = sqlx::query(
            "SELECT uri, label, embedding, updated_at_utc FROM ontology_concept \
             WHERE embedding IS NULL ORDER BY uri",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.iter().map(row_to_concept).collect())
    }
}
