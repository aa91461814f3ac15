//! Extraction-pipeline ingest adapter.
//!
//! Consumes the `(content, concept, confidence)` tuples the extraction
//! pipeline emits for a document and lands them in the engine: one
//! `llm_extracted` version-1 annotation per tuple, with the underlying
//! facts resolved through the deduplication service so re-ingesting a
//! document never duplicates triples.

use tracing::info;

use casuist_core::{
    defaults, AnnotationLedger, CandidateTriple, CreateAnnotationRequest, Error, ExtractedConcept,
    OwnerEntityType, Result,
};
use casuist_db::Database;

/// Counts from one ingest run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub annotations_created: usize,
    pub triples_created: usize,
    pub triples_deduplicated: usize,
}

/// Lands extracted concept tuples as annotations and facts.
pub struct IngestService {
    db: Database,
    graph: String,
}

impl IngestService {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            graph: defaults::DEFAULT_GRAPH.to_string(),
        }
    }

    /// Scope ingested facts to a non-default graph.
    pub fn with_graph(mut self, graph: impl Into<String>) -> Self {
        self.graph = graph.into();
        self
    }

    /// Ingest one document's extracted concepts under its guideline.
    pub async fn ingest_document(
        &self,
        document_id: i64,
        guideline_id: i64,
        items: &[ExtractedConcept],
    ) -> Result<IngestSummary> {
        if !self.db.documents.exists(document_id).await? {
            return Err(Error::DocumentNotFound(document_id));
        }
        if !self.db.guidelines.exists(guideline_id).await? {
            return Err(Error::NotFound(format!("guideline {}", guideline_id)));
        }

        let mut summary = IngestSummary::default();
        let case_uri = format!("case:{}", document_id);

        for item in items {
            let version = self
                .db
                .annotations
                .create_version(CreateAnnotationRequest {
                    content: item.content.clone(),
                    concept_uri: Some(item.concept_uri.clone()),
                    ..Default::default()
                })
                .await?;
            summary.annotations_created += 1;

            // The annotation's own fact, destroyed with the group.
            let metadata = serde_json::json!({
                "confidence": item.confidence,
                "concept_label": item.concept_label,
            });
            let annotation_fact = CandidateTriple {
                subject: case_uri.clone(),
                predicate: "onto:annotatedWith".to_string(),
                object: item.concept_uri.clone(),
                is_literal: false,
                graph: self.graph.clone(),
                owner_entity_type: OwnerEntityType::AnnotationGroup,
                owner_entity_id: version.annotation_group_id.to_string(),
                metadata: Some(metadata),
            };
            let resolved = self.db.dedup.resolve(&annotation_fact).await?;
            if resolved.is_new {
                summary.triples_created += 1;
            } else {
                summary.triples_deduplicated += 1;
            }

            // The guideline-scope fact the reporting layer reads; this
            // is what guideline consolidation repoints.
            let guideline_fact = CandidateTriple {
                subject: case_uri.clone(),
                predicate: "onto:coversConcept".to_string(),
                object: item.concept_uri.clone(),
                is_literal: false,
                graph: self.graph.clone(),
                owner_entity_type: OwnerEntityType::Guideline,
                owner_entity_id: guideline_id.to_string(),
                metadata: None,
            };
            let resolved = self.db.dedup.resolve(&guideline_fact).await?;
            if resolved.is_new {
                summary.triples_created += 1;
            } else {
                summary.triples_deduplicated += 1;
            }
        }

        info!(
            subsystem = "jobs",
            component = "ingest",
            op = "ingest_document",
            document_id,
            guideline_id,
            result_count = summary.annotations_created,
            "Extracted concepts ingested"
        );
        Ok(summary)
    }
}
