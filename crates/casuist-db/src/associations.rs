//! Section/concept association repository.
//!
//! The unique constraint on `(section_id, concept_uri, method)` keeps
//! one method from registering the same concept twice for a section,
//! while letting the embedding and LLM methods disagree side by side.

use async_trait::async_trait;
use sqlx::{postgres::PgRow, Pool, Postgres, Row};
use tracing::debug;

use casuist_core::{
    new_v7, AssociationMethod, AssociationStore, CandidateAssociation, Error, Result,
    SectionConceptAssociation,
};

/// PostgreSQL implementation of [`AssociationStore`].
pub struct PgAssociationRepository {
    pool: Pool<Postgres>,
}

impl PgAssociationRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn row_to_association(row: &PgRow) -> Result<SectionConceptAssociation> {
    let method_raw: String = row.get("method");
    let method = method_raw
        .parse::<AssociationMethod>()
        .map_err(Error::Internal)?;

    Ok(SectionConceptAssociation {
        id: row.get("id"),
        section_id: row.get("section_id"),
        concept_uri: row.get("concept_uri"),
        concept_label: row.get("concept_label"),
        match_score: row.get("match_score"),
        method,
        created_at_utc: row.get("created_at_utc"),
    })
}

#[async_trait]
impl AssociationStore for PgAssociationRepository {
    async fn insert(&self, candidate: &CandidateAssociation) -> Result<bool> {
        candidate.validate()?;

        let result = sqlx::query(
            "INSERT INTO section_concept_association \
                 (id, section_id, concept_uri, concept_label, match_score, method) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (section_id, concept_uri, method) DO NOTHING",
        )
        .bind(new_v7())
        .bind(candidate.section_id)
        .bind(&candidate.concept_uri)
        .bind(&candidate.concept_label)
        .bind(candidate.match_score)
        .bind(candidate.method.as_str())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(result.rows_affected() > 0)
    }

    async fn replace_for_section(
        &self,
        section_id: i64,
        method: AssociationMethod,
        candidates: &[CandidateAssociation],
    ) -> Result<usize> {
        for candidate in candidates {
            candidate.validate()?;
            if candidate.section_id != section_id {
                return Err(Error::InvalidInput(format!(
                    "candidate targets section {} during replace of section {}",
                    candidate.section_id, section_id
                )));
            }
            if candidate.method != method {
                return Err(Error::InvalidInput(format!(
                    "candidate method {} during replace of method {}",
                    candidate.method, method
                )));
            }
        }

        // Delete + insert in one transaction so readers never observe a
        // half-replaced section.
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        sqlx::query(
            "DELETE FROM section_concept_association WHERE section_id = $1 AND method = $2",
        )
        .bind(section_id)
        .bind(method.as_str())
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        let mut inserted = 0usize;
        for candidate in candidates {
            sqlx::query(
                "INSERT INTO section_concept_association \
                     (id, section_id, concept_uri, concept_label, match_score, method) \
                 VALUES ($1, $2, $3, $4, $5, $6) \
                 ON CONFLICT (section_id, concept_uri, method) DO NOTHING",
            )
            .bind(new_v7())
            .bind(candidate.section_id)
            .bind(&candidate.concept_uri)
            .bind(&candidate.concept_label)
            .bind(candidate.match_score)
            .bind(candidate.method.as_str())
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
            inserted += 1;
        }

        tx.commit().await.map_err(Error::Database)?;

        debug!(
            subsystem = "db",
            component = "associations",
            op = "replace_for_section",
            section_id,
            method = method.as_str(),
            result_count = inserted,
            "Section associations replaced"
        );
        Ok(inserted)
    }

    async fn list_for_section(&self, section_id: i64) -> Result<Vec<SectionConceptAssociation>> {
        let rows = sqlx::query(
            "SELECT id, section_id, concept_uri, concept_label, match_score, method, \
                    created_at_utc \
             FROM section_concept_association \
             WHERE section_id = $1 \
             ORDER BY match_score DESC, concept_uri",
        )
        .bind(section_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter().map(row_to_association).collect()
    }

    async fn count_for_document(
        &self,
        document_id: i64,
        method: AssociationMethod,
    ) -> Result<i64> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM section_concept_association a \
             JOIN document_section s ON s.id = a.section_id \
             WHERE s.document_id = $1 AND a.method = $2",
        )
        .bind(document_id)
        .bind(method.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.0)
    }
}
