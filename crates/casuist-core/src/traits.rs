//! Core traits for the annotation engine's seams.
//!
//! Repository traits let the store be swapped or mocked in tests; the
//! backend traits wrap the external embedding and reasoning services
//! the Association Scorer consumes.

use async_trait::async_trait;
use uuid::Uuid;

use crate::approval::ApprovalStage;
use crate::error::Result;
use crate::models::*;

// =============================================================================
// TRIPLE STORE
// =============================================================================

/// Append-only fact store with owner-scoped uniqueness.
#[async_trait]
pub trait TripleStore: Send + Sync {
    /// Idempotent insert: returns the existing id when an identical
    /// triple already exists for the same owner.
    async fn put(&self, candidate: &CandidateTriple) -> Result<Uuid>;

    /// Remove every triple owned by one entity. Returns the count.
    async fn delete_by_owner(
        &self,
        entity_type: OwnerEntityType,
        entity_id: &str,
    ) -> Result<u64>;

    /// Pattern query; `None` fields are wildcards.
    async fn query(&self, pattern: &TriplePattern) -> Result<Vec<Triple>>;

    /// Fetch a single triple by id.
    async fn get(&self, id: Uuid) -> Result<Option<Triple>>;
}

// =============================================================================
// ANNOTATION VERSION LEDGER
// =============================================================================

/// Versioning and approval state machine for concept annotations.
#[async_trait]
pub trait AnnotationLedger: Send + Sync {
    /// Append a version (or start a new group when `group_id` is None).
    async fn create_version(&self, req: CreateAnnotationRequest) -> Result<AnnotationVersion>;

    /// Advance a version's approval stage; strictly forward only.
    async fn promote(&self, version_id: Uuid, to: ApprovalStage) -> Result<AnnotationVersion>;

    /// Repoint `is_current` at an earlier version without deleting the
    /// later ones; version numbers are never reused.
    async fn rollback(&self, group_id: Uuid, to_version: i32) -> Result<AnnotationVersion>;

    /// The group's current version, if the group exists.
    async fn current(&self, group_id: Uuid) -> Result<Option<AnnotationVersion>>;

    /// Fetch one version by id.
    async fn get(&self, version_id: Uuid) -> Result<Option<AnnotationVersion>>;

    /// Full lineage of the group, newest first, walked over the
    /// parent chain from the current version.
    async fn history(&self, group_id: Uuid) -> Result<Vec<AnnotationVersion>>;

    /// Fresh-start reset: delete every version of the group and the
    /// triples the group owns.
    async fn delete_group(&self, group_id: Uuid) -> Result<u64>;
}

// =============================================================================
// ASSOCIATIONS
// =============================================================================

/// Storage for section/concept associations.
#[async_trait]
pub trait AssociationStore: Send + Sync {
    /// Insert one association; returns false when the
    /// `(section, concept, method)` slot is already taken.
    async fn insert(&self, candidate: &CandidateAssociation) -> Result<bool>;

    /// Atomically replace a section's associations for one method.
    async fn replace_for_section(
        &self,
        section_id: i64,
        method: AssociationMethod,
        candidates: &[CandidateAssociation],
    ) -> Result<usize>;

    /// All associations for a section, both methods.
    async fn list_for_section(&self, section_id: i64) -> Result<Vec<SectionConceptAssociation>>;

    /// Count associations across a document's sections for one method.
    async fn count_for_document(&self, document_id: i64, method: AssociationMethod)
        -> Result<i64>;
}

// =============================================================================
// EXTERNAL SERVICE BACKENDS
// =============================================================================

/// Embedding service returning fixed-dimension vectors.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Vector dimension this backend produces.
    fn dimension(&self) -> usize;
}

/// Concept descriptor handed to the reasoning service as a candidate.
#[derive(Debug, Clone)]
pub struct ConceptDescriptor {
    pub uri: String,
    pub label: String,
}

/// LLM reasoning service proposing concept associations for a section.
#[async_trait]
pub trait ReasoningBackend: Send + Sync {
    async fn suggest_concepts(
        &self,
        section_text: &str,
        candidates: &[ConceptDescriptor],
    ) -> Result<Vec<ConceptSuggestion>>;
}
