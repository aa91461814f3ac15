//! Guideline repository.

use sqlx::{postgres::PgRow, Pool, Postgres, Row};

use casuist_core::{Error, Guideline, Result};

/// PostgreSQL guideline repository.
pub struct PgGuidelineRepository {
    pool: Pool<Postgres>,
}

fn row_to_guideline(row: &PgRow) -> Guideline {
    Guideline {
        id: row.get("id"),
        document_id: row.get("document_id"),
        title: row.get("title"),
        created_at_utc: row.get("created_at_utc"),
    }
}

impl PgGuidelineRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Insert a guideline for a document.
    pub async fn insert(&self, document_id: i64, title: &str) -> Result<Guideline> {
        let row = sqlx::query(
            "INSERT INTO guideline (document_id, title) VALUES ($1, $2) \
             RETURNING id, document_id, title, created_at_utc",
        )
        .bind(document_id)
        .bind(title)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row_to_guideline(&row))
    }

    /// Fetch a guideline by id.
    pub async fn get(&self, id: i64) -> Result<Option<Guideline>> {
        let row = sqlx::query(
            "SELECT id, document_id, title, created_at_utc FROM guideline WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.as_ref().map(row_to_guideline))
    }

    /// All guidelines referencing a document, oldest first.
    pub async fn list_for_document(&self, document_id: i64) -> Result<Vec<Guideline>> {
        let rows = sqlx::query(
            "SELECT id, document_id, title, created_at_utc FROM guideline \
             WHERE document_id = $1 ORDER BY created_at_utc ASC, id ASC",
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.iter().map(row_to_guideline).collect())
    }

    /// Whether a guideline row exists.
    pub async fn exists(&self, id: i64) -> Result<bool> {
        let row: (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM guideline WHERE id = $1)")
                .bind(id)
                .fetch_one(&self.pool)
                .await
                .map_err(Error::Database)?;

        Ok(row.0)
    }

    /// Document ids that currently have more than one guideline record.
    pub async fn documents_with_duplicates(&self) -> Result<Vec<i64>> {
        let rows: Vec<(i64,)> = sqlx::query_as(
            "SELECT document_id FROM guideline \
             GROUP BY document_id HAVING COUNT(*) > 1 \
             ORDER BY document_id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.into_iter().map(|r| r.0).collect())
    }
}
