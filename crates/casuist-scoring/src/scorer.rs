//! Association scorer: links document sections to ontology concepts.
//!
//! Two independent methods that may disagree and coexist:
//! - embedding: cosine similarity over cached pgvector embeddings,
//!   gated by a configurable threshold;
//! - llm: structured suggestions from the reasoning service, scored
//!   1.0 unless the service supplied an explicit confidence.
//!
//! `regenerate_for_document` replaces each section's associations in
//! its own transaction, so re-runs are idempotent and concurrent
//! readers never see a half-deleted section.

use std::sync::Arc;
use std::time::Instant;

use pgvector::Vector;
use tracing::{debug, info};

use casuist_core::{
    defaults, AssociationMethod, AssociationStore, CandidateAssociation, ConceptDescriptor,
    DocumentSection, EmbeddingBackend, Error, OntologyConcept, ReasoningBackend, Result,
};
use casuist_db::Database;

use crate::similarity::{cosine_similarity, similarity_to_score};

/// Scorer configuration.
#[derive(Debug, Clone)]
pub struct ScorerConfig {
    /// Minimum match score for the embedding method.
    pub match_threshold: f32,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            match_threshold: defaults::MATCH_THRESHOLD,
        }
    }
}

impl ScorerConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `CASUIST_MATCH_THRESHOLD` | `0.62` | Embedding acceptance threshold |
    pub fn from_env() -> Self {
        let match_threshold = std::env::var("CASUIST_MATCH_THRESHOLD")
            .ok()
            .and_then(|v| v.parse::<f32>().ok())
            .filter(|t| (0.0..=1.0).contains(t))
            .unwrap_or(defaults::MATCH_THRESHOLD);

        Self { match_threshold }
    }

    /// Override the embedding acceptance threshold.
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.match_threshold = threshold;
        self
    }
}

/// Produces section/concept associations through both methods.
pub struct AssociationScorer {
    db: Database,
    embedder: Arc<dyn EmbeddingBackend>,
    reasoner: Arc<dyn ReasoningBackend>,
    config: ScorerConfig,
}

impl AssociationScorer {
    pub fn new(
        db: Database,
        embedder: Arc<dyn EmbeddingBackend>,
        reasoner: Arc<dyn ReasoningBackend>,
        config: ScorerConfig,
    ) -> Self {
        Self {
            db,
            embedder,
            reasoner,
            config,
        }
    }

    /// Embed ontology concepts that do not have a cached vector yet.
    ///
    /// Safe to call before any scoring run; a no-op when the ontology
    /// is fully embedded.
    pub async fn refresh_concept_embeddings(&self) -> Result<usize> {
        let pending = self.db.concepts.list_unembedded().await?;
        if pending.is_empty() {
            return Ok(0);
        }

        let labels: Vec<String> = pending.iter().map(|c| c.label.clone()).collect();
        let vectors = self.embedder.embed_texts(&labels).await?;

        for (concept, vector) in pending.iter().zip(vectors) {
            self.db
                .concepts
                .upsert(&concept.uri, &concept.label, Some(&Vector::from(vector)))
                .await?;
        }

        info!(
            subsystem = "scoring",
            component = "scorer",
            op = "refresh_concept_embeddings",
            result_count = pending.len(),
            "Concept embeddings refreshed"
        );
        Ok(pending.len())
    }

    /// Resolve the section's vector, embedding and caching it when the
    /// stored copy is missing.
    async fn section_vector(&self, section: &DocumentSection) -> Result<Vec<f32>> {
        if let Some(vector) = &section.embedding {
            return Ok(vector.as_slice().to_vec());
        }

        let mut vectors = self
            .embedder
            .embed_texts(std::slice::from_ref(&section.content))
            .await?;
        let vector = vectors
            .pop()
            .ok_or_else(|| Error::Embedding("backend returned no vector".to_string()))?;

        self.db
            .documents
            .store_section_embedding(section.id, &Vector::from(vector.clone()))
            .await?;
        Ok(vector)
    }

    /// Score one section against the ontology with the embedding method.
    async fn score_section_embedding(
        &self,
        section: &DocumentSection,
        concepts: &[OntologyConcept],
    ) -> Result<Vec<CandidateAssociation>> {
        let section_vec = self.section_vector(section).await?;

        let mut accepted = Vec::new();
        for concept in concepts {
            let Some(concept_vec) = &concept.embedding else {
                continue;
            };
            let score =
                similarity_to_score(cosine_similarity(&section_vec, concept_vec.as_slice()));
            if score >= self.config.match_threshold {
                accepted.push(CandidateAssociation {
                    section_id: section.id,
                    concept_uri: concept.uri.clone(),
                    concept_label: concept.label.clone(),
                    match_score: score,
                    method: AssociationMethod::Embedding,
                });
            }
        }

        debug!(
            subsystem = "scoring",
            component = "scorer",
            op = "score_embedding",
            section_id = section.id,
            result_count = accepted.len(),
            threshold = self.config.match_threshold,
            "Section scored against ontology"
        );
        Ok(accepted)
    }

    /// Score one section with the LLM method.
    async fn score_section_llm(
        &self,
        section: &DocumentSection,
        concepts: &[OntologyConcept],
    ) -> Result<Vec<CandidateAssociation>> {
        let catalog: Vec<ConceptDescriptor> = concepts
            .iter()
            .map(|c| ConceptDescriptor {
                uri: c.uri.clone(),
                label: c.label.clone(),
            })
            .collect();

        let suggestions = self
            .reasoner
            .suggest_concepts(&section.content, &catalog)
            .await?;

        Ok(suggestions
            .into_iter()
            .map(|s| CandidateAssociation {
                section_id: section.id,
                concept_uri: s.concept_uri,
                concept_label: s.concept_label,
                // Explicit service confidence when present, else 1.0.
                match_score: s.confidence.unwrap_or(1.0),
                method: AssociationMethod::Llm,
            })
            .collect())
    }

    /// Recompute every association for a document's sections with one
    /// method, from scratch.
    ///
    /// Prior associations for that method are replaced section by
    /// section; each section's delete+insert is one transaction.
    /// Running twice with unchanged inputs yields the same count.
    pub async fn regenerate_for_document(
        &self,
        document_id: i64,
        method: AssociationMethod,
    ) -> Result<usize> {
        let start = Instant::now();

        if !self.db.documents.exists(document_id).await? {
            return Err(Error::DocumentNotFound(document_id));
        }

        let sections = self.db.documents.list_sections(document_id).await?;
        let concepts = self.db.concepts.list_all().await?;

        let mut total = 0usize;
        for section in &sections {
            let candidates = match method {
                AssociationMethod::Embedding => {
                    self.score_section_embedding(section, &concepts).await?
                }
                AssociationMethod::Llm => self.score_section_llm(section, &concepts).await?,
            };
            total += self
                .db
                .associations
                .replace_for_section(section.id, method, &candidates)
                .await?;
        }

        info!(
            subsystem = "scoring",
            component = "scorer",
            op = "regenerate",
            document_id,
            method = method.as_str(),
            result_count = total,
            duration_ms = start.elapsed().as_millis() as u64,
            "Associations regenerated"
        );
        Ok(total)
    }
}
