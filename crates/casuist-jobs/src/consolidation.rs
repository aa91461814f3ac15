//! Consolidation maintenance job.
//!
//! Replays the live-path invariants over existing data in three
//! independent passes:
//! 1. remove triples whose owning guideline/document is gone;
//! 2. merge duplicate guideline records per document (oldest wins);
//! 3. remove exact-duplicate triples within a guideline (lowest id
//!    wins).
//!
//! Every pass is idempotent and each row's mutation is its own small
//! transaction, so the job can be aborted mid-pass and re-run without
//! leaving the store worse than it found it. No lock is held across
//! passes. Row failures are logged and collected; they never abort the
//! rest of the pass.

use std::time::Instant;

use tracing::{info, warn};
use uuid::Uuid;

use casuist_core::{Error, Result};
use casuist_db::Database;

/// A row a pass failed to process.
#[derive(Debug, Clone)]
pub struct RowFailure {
    /// Identifier of the failed row (triple id or document id).
    pub row: String,
    pub error: String,
}

/// Accounting for one pass.
#[derive(Debug, Clone)]
pub struct PassReport {
    pub name: &'static str,
    pub examined: usize,
    pub removed: u64,
    pub failures: Vec<RowFailure>,
}

impl PassReport {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            examined: 0,
            removed: 0,
            failures: Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn log_summary(&self, started: Instant) {
        info!(
            subsystem = "jobs",
            component = "consolidation",
            op = self.name,
            rows_examined = self.examined,
            rows_removed = self.removed,
            rows_failed = self.failures.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Pass finished"
        );
    }
}

/// Result of a full consolidation run.
#[derive(Debug, Clone)]
pub struct ConsolidationReport {
    pub orphaned_triples: PassReport,
    pub duplicate_guidelines: PassReport,
    pub duplicate_triples: PassReport,
}

impl ConsolidationReport {
    pub fn is_clean(&self) -> bool {
        self.passes().iter().all(|p| p.is_clean())
    }

    pub fn total_removed(&self) -> u64 {
        self.passes().iter().map(|p| p.removed).sum()
    }

    pub fn passes(&self) -> [&PassReport; 3] {
        [
            &self.orphaned_triples,
            &self.duplicate_guidelines,
            &self.duplicate_triples,
        ]
    }

    /// Express a run with failures as the error callers of multi-row
    /// operations expect: the rows that did complete, plus a summary of
    /// what did not.
    pub fn as_partial_failure(&self) -> Option<Error> {
        if self.is_clean() {
            return None;
        }
        let failed: Vec<String> = self
            .passes()
            .iter()
            .flat_map(|p| p.failures.iter().map(|f| format!("{}:{}", p.name, f.row)))
            .collect();
        Some(Error::PartialFailure {
            processed: self
                .passes()
                .iter()
                .map(|p| format!("{}:{}", p.name, p.removed))
                .collect(),
            message: format!("{} rows failed: {}", failed.len(), failed.join(", ")),
        })
    }
}

/// Idempotent batch repair of historical duplicate/orphaned data.
pub struct ConsolidationJob {
    db: Database,
}

impl ConsolidationJob {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Run all three passes and return the combined report.
    pub async fn run(&self) -> Result<ConsolidationReport> {
        let report = ConsolidationReport {
            orphaned_triples: self.remove_orphaned_triples().await?,
            duplicate_guidelines: self.merge_duplicate_guidelines().await?,
            duplicate_triples: self.remove_duplicate_triples().await?,
        };

        info!(
            subsystem = "jobs",
            component = "consolidation",
            op = "run",
            rows_removed = report.total_removed(),
            clean = report.is_clean(),
            "Consolidation finished"
        );
        Ok(report)
    }

    /// Pass 1: triples whose owning guideline or document no longer
    /// exists.
    ///
    /// The candidate list is read up front; each deletion is a single
    /// row-scoped statement, so an abort strands nothing.
    pub async fn remove_orphaned_triples(&self) -> Result<PassReport> {
        let started = Instant::now();
        let mut report = PassReport::new("remove_orphaned_triples");

        let orphans: Vec<(Uuid,)> = sqlx::query_as(
            "SELECT t.id FROM triple t \
             WHERE (t.owner_entity_type = 'guideline' AND NOT EXISTS \
                        (SELECT 1 FROM guideline g WHERE g.id::text = t.owner_entity_id)) \
                OR (t.owner_entity_type = 'document' AND NOT EXISTS \
                        (SELECT 1 FROM document d WHERE d.id::text = t.owner_entity_id)) \
             ORDER BY t.id",
        )
        .fetch_all(&self.db.pool)
        .await
        .map_err(Error::Database)?;

        report.examined = orphans.len();
        for (triple_id,) in orphans {
            match sqlx::query("DELETE FROM triple WHERE id = $1")
                .bind(triple_id)
                .execute(&self.db.pool)
                .await
            {
                Ok(result) => report.removed += result.rows_affected(),
                Err(e) => {
                    warn!(
                        subsystem = "jobs",
                        component = "consolidation",
                        op = "remove_orphaned_triples",
                        triple_id = %triple_id,
                        error = %e,
                        "Failed to remove orphaned triple"
                    );
                    report.failures.push(RowFailure {
                        row: triple_id.to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        report.log_summary(started);
        Ok(report)
    }

    /// Pass 2: documents with more than one guideline record, merged
    /// through the dedup service's oldest-wins rule. Each document's
    /// merge is one transaction inside `resolve_guideline`.
    pub async fn merge_duplicate_guidelines(&self) -> Result<PassReport> {
        let started = Instant::now();
        let mut report = PassReport::new("merge_duplicate_guidelines");

        let documents = self.db.guidelines.documents_with_duplicates().await?;
        report.examined = documents.len();

        for document_id in documents {
            let before = self
                .db
                .guidelines
                .list_for_document(document_id)
                .await
                .map(|g| g.len() as u64)
                .unwrap_or(0);

            match self.db.dedup.resolve_guideline(document_id).await {
                Ok(canonical) => {
                    report.removed += before.saturating_sub(1);
                    info!(
                        subsystem = "jobs",
                        component = "consolidation",
                        op = "merge_duplicate_guidelines",
                        document_id,
                        guideline_id = canonical,
                        "Document consolidated"
                    );
                }
                Err(e) => {
                    warn!(
                        subsystem = "jobs",
                        component = "consolidation",
                        op = "merge_duplicate_guidelines",
                        document_id,
                        error = %e,
                        "Failed to consolidate document"
                    );
                    report.failures.push(RowFailure {
                        row: document_id.to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        report.log_summary(started);
        Ok(report)
    }

    /// Pass 3: exact-duplicate triples within a guideline, keeping the
    /// lowest id. Duplicates predate the dedup-key index (or slipped
    /// in through guideline repointing); the comparison uses the raw
    /// columns, not the stored key.
    pub async fn remove_duplicate_triples(&self) -> Result<PassReport> {
        let started = Instant::now();
        let mut report = PassReport::new("remove_duplicate_triples");

        let duplicates: Vec<(Uuid,)> = sqlx::query_as(
            "SELECT DISTINCT t.id FROM triple t \
             JOIN triple keeper \
               ON keeper.graph = t.graph \
              AND keeper.subject = t.subject \
              AND keeper.predicate = t.predicate \
              AND keeper.object = t.object \
              AND keeper.is_literal = t.is_literal \
              AND keeper.owner_entity_type = t.owner_entity_type \
              AND keeper.owner_entity_id = t.owner_entity_id \
              AND keeper.id < t.id \
             WHERE t.owner_entity_type = 'guideline' \
             ORDER BY t.id",
        )
        .fetch_all(&self.db.pool)
        .await
        .map_err(Error::Database)?;

        report.examined = duplicates.len();
        for (triple_id,) in duplicates {
            match sqlx::query("DELETE FROM triple WHERE id = $1")
                .bind(triple_id)
                .execute(&self.db.pool)
                .await
            {
                Ok(result) => report.removed += result.rows_affected(),
                Err(e) => {
                    warn!(
                        subsystem = "jobs",
                        component = "consolidation",
                        op = "remove_duplicate_triples",
                        triple_id = %triple_id,
                        error = %e,
                        "Failed to remove duplicate triple"
                    );
                    report.failures.push(RowFailure {
                        row: triple_id.to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        report.log_summary(started);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clean_pass(name: &'static str) -> PassReport {
        PassReport {
            name,
            examined: 4,
            removed: 2,
            failures: Vec::new(),
        }
    }

    #[test]
    fn test_clean_report_has_no_partial_failure() {
        let report = ConsolidationReport {
            orphaned_triples: clean_pass("remove_orphaned_triples"),
            duplicate_guidelines: clean_pass("merge_duplicate_guidelines"),
            duplicate_triples: clean_pass("remove_duplicate_triples"),
        };

        assert!(report.is_clean());
        assert_eq!(report.total_removed(), 6);
        assert!(report.as_partial_failure().is_none());
    }

    #[test]
    fn test_failures_surface_every_failed_row() {
        let mut failing = clean_pass("merge_duplicate_guidelines");
        failing.failures.push(RowFailure {
            row: "190".to_string(),
            error: "deadlock".to_string(),
        });
        let report = ConsolidationReport {
            orphaned_triples: clean_pass("remove_orphaned_triples"),
            duplicate_guidelines: failing,
            duplicate_triples: clean_pass("remove_duplicate_triples"),
        };

        assert!(!report.is_clean());
        let err = report.as_partial_failure().unwrap();
        match err {
            Error::PartialFailure { processed, message } => {
                assert_eq!(processed.len(), 3);
                assert!(message.contains("merge_duplicate_guidelines:190"));
            }
            other => panic!("expected PartialFailure, got {:?}", other),
        }
    }
}
