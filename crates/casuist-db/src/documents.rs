//! Document and section repository.

use pgvector::Vector;
use sqlx::{postgres::PgRow, Pool, Postgres, Row};

use casuist_core::{Document, DocumentSection, Error, Result};

/// PostgreSQL document and section repository.
pub struct PgDocumentRepository {
    pool: Pool<Postgres>,
}

fn row_to_document(row: &PgRow) -> Document {
    Document {
        id: row.get("id"),
        external_ref: row.get("external_ref"),
        title: row.get("title"),
        canonical_guideline_id: row.get("canonical_guideline_id"),
        created_at_utc: row.get("created_at_utc"),
    }
}

fn row_to_section(row: &PgRow) -> DocumentSection {
    DocumentSection {
        id: row.get("id"),
        document_id: row.get("document_id"),
        position: row.get("position"),
        content: row.get("content"),
        embedding: row.get("embedding"),
    }
}

impl PgDocumentRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Insert a document.
    pub async fn insert(&self, title: &str, external_ref: Option<&str>) -> Result<Document> {
        let row = sqlx::query(
            "INSERT INTO document (title, external_ref) VALUES ($1, $2) \
             RETURNING id, external_ref, title, canonical_guideline_id, created_at_utc",
        )
        .bind(title)
        .bind(external_ref)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row_to_document(&row))
    }

    /// Fetch a document by id.
    pub async fn get(&self, id: i64) -> Result<Option<Document>> {
        let row = sqlx::query(
            "SELECT id, external_ref, title, canonical_guideline_id, created_at_utc \
             FROM document WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.as_ref().map(row_to_document))
    }

    /// Whether a document row exists.
    pub async fn exists(&self, id: i64) -> Result<bool> {
        let row: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM document WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(row.0)
    }

    /// Append a section to a document.
    pub async fn insert_section(
        &self,
        document_id: i64,
        position: i32,
        content: &str,
    ) -> Result<DocumentSection> {
        let row = sqlx::query(
            "INSERT INTO document_section (document_id, position, content) \
             VALUES ($1, $2, $3) \
             RETURNING id, document_id, position, content, embedding",
        )
        .bind(document_id)
        .bind(position)
        .bind(content)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row_to_section(&row))
    }

    /// Sections of a document in reading order.
    pub async fn list_sections(&self, document_id: i64) -> Result<Vec<DocumentSection>> {
        let rows = sqlx::query(
            "SELECT id, document_id, position, content, embedding \
             FROM document_section WHERE document_id = $1 ORDER BY position",
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.iter().map(row_to_section).collect())
    }

    /// Cache a section's embedding vector.
    pub async fn store_section_embedding(&self, section_id: i64, vector: &Vector) -> Result<()> {
        sqlx::query("UPDATE document_section SET embedding = $1 WHERE id = $2")
            .bind(vector)
            .bind(section_id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(())
    }
}
