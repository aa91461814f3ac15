//! Core data model for the annotation engine.
//!
//! Triples, annotation versions, section/concept associations, and the
//! corpus carriers (documents, guidelines, sections, ontology concepts)
//! that own them. Validation happens here, at the boundary, so the
//! repositories can assume well-formed values.

use chrono::{DateTime, Utc};
use pgvector::Vector;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::approval::ApprovalStage;
use crate::error::{Error, Result};
use crate::user_edits::UserEdits;

// =============================================================================
// TRIPLES
// =============================================================================

/// Kind of entity that owns a triple.
///
/// Owner ids are stored as text because corpus entities carry integer
/// ids while annotation groups are UUIDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnerEntityType {
    Guideline,
    Document,
    AnnotationGroup,
}

impl OwnerEntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Guideline => "guideline",
            Self::Document => "document",
            Self::AnnotationGroup => "annotation_group",
        }
    }
}

impl std::fmt::Display for OwnerEntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OwnerEntityType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "guideline" => Ok(Self::Guideline),
            "document" => Ok(Self::Document),
            "annotation_group" => Ok(Self::AnnotationGroup),
            other => Err(format!("Unknown owner entity type: {}", other)),
        }
    }
}

/// A persisted subject/predicate/object fact with provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Triple {
    pub id: Uuid,
    pub subject: String,
    pub predicate: String,
    pub object: String,
    pub is_literal: bool,
    pub graph: String,
    pub owner_entity_type: OwnerEntityType,
    pub owner_entity_id: String,
    pub metadata: Option<JsonValue>,
    pub created_at_utc: DateTime<Utc>,
}

/// A triple before insertion; validated and keyed by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateTriple {
    pub subject: String,
    pub predicate: String,
    pub object: String,
    pub is_literal: bool,
    pub graph: String,
    pub owner_entity_type: OwnerEntityType,
    pub owner_entity_id: String,
    pub metadata: Option<JsonValue>,
}

impl CandidateTriple {
    /// Reject malformed candidates before they reach the store.
    ///
    /// `subject` and `predicate` must be non-empty. `object` may be
    /// empty only for literals (an empty-string literal is a valid
    /// fact; an empty URI is not).
    pub fn validate(&self) -> Result<()> {
        if self.subject.is_empty() {
            return Err(Error::ConstraintViolation(
                "subject must not be empty".to_string(),
            ));
        }
        if self.predicate.is_empty() {
            return Err(Error::ConstraintViolation(
                "predicate must not be empty".to_string(),
            ));
        }
        if self.object.is_empty() && !self.is_literal {
            return Err(Error::ConstraintViolation(
                "object URI must not be empty".to_string(),
            ));
        }
        if self.graph.is_empty() {
            return Err(Error::ConstraintViolation(
                "graph must not be empty".to_string(),
            ));
        }
        if self.owner_entity_id.is_empty() {
            return Err(Error::ConstraintViolation(
                "owner entity id must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Exact-match identity of this fact for its owner.
    ///
    /// The key covers the full identity tuple except `graph`, which is
    /// matched as its own column. Identity is syntactic: no
    /// normalization beyond field separation.
    pub fn dedup_key(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.subject.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.predicate.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.object.as_bytes());
        hasher.update([0u8]);
        hasher.update([self.is_literal as u8]);
        hasher.update([0u8]);
        hasher.update(self.owner_entity_type.as_str().as_bytes());
        hasher.update([0u8]);
        hasher.update(self.owner_entity_id.as_bytes());
        format!("sha256:{}", hex::encode(hasher.finalize()))
    }
}

/// Wildcard-able query pattern over the triple store.
///
/// `None` fields match anything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriplePattern {
    pub subject: Option<String>,
    pub predicate: Option<String>,
    pub object: Option<String>,
    pub is_literal: Option<bool>,
    pub graph: Option<String>,
    pub owner_entity_type: Option<OwnerEntityType>,
    pub owner_entity_id: Option<String>,
}

impl TriplePattern {
    /// Pattern matching every triple owned by one entity.
    pub fn for_owner(entity_type: OwnerEntityType, entity_id: impl Into<String>) -> Self {
        Self {
            owner_entity_type: Some(entity_type),
            owner_entity_id: Some(entity_id.into()),
            ..Self::default()
        }
    }
}

// =============================================================================
// ANNOTATION VERSIONS
// =============================================================================

/// One revision of a concept annotation applied to a document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotationVersion {
    /// UUIDv7: unique and time-ordered.
    pub id: Uuid,
    /// Logical identity shared by every revision of this annotation.
    pub annotation_group_id: Uuid,
    /// 1-based, contiguous within the group, never reused.
    pub version_number: i32,
    pub approval_stage: ApprovalStage,
    /// The version this one supersedes; None for version 1.
    pub parent_annotation_id: Option<Uuid>,
    pub content: String,
    pub concept_uri: Option<String>,
    pub user_edits: Option<UserEdits>,
    pub is_current: bool,
    pub created_at_utc: DateTime<Utc>,
}

/// Request to append a version to a group (or start a new group).
#[derive(Debug, Clone, Default)]
pub struct CreateAnnotationRequest {
    /// None mints a fresh group at version 1.
    pub group_id: Option<Uuid>,
    pub content: String,
    pub concept_uri: Option<String>,
    /// Defaults to `llm_extracted` when the creator does not specify —
    /// a human edit passes `user_approved` together with `user_edits`.
    pub stage: Option<ApprovalStage>,
    /// Explicit parent override; defaults to the group's current version.
    pub parent_annotation_id: Option<Uuid>,
    pub user_edits: Option<UserEdits>,
}

impl CreateAnnotationRequest {
    pub fn validate(&self) -> Result<()> {
        if self.content.is_empty() {
            return Err(Error::InvalidInput(
                "annotation content must not be empty".to_string(),
            ));
        }
        if let Some(edits) = &self.user_edits {
            edits.validate()?;
        }
        // A version that claims human sign-off at creation must carry
        // the edit record that justifies it.
        if self.stage == Some(ApprovalStage::UserApproved) && self.user_edits.is_none() {
            return Err(Error::InvalidInput(
                "user_approved creation requires user_edits".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// SECTION / CONCEPT ASSOCIATIONS
// =============================================================================

/// How an association between a section and a concept was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssociationMethod {
    Embedding,
    Llm,
}

impl AssociationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Embedding => "embedding",
            Self::Llm => "llm",
        }
    }
}

impl std::fmt::Display for AssociationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AssociationMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "embedding" => Ok(Self::Embedding),
            "llm" => Ok(Self::Llm),
            other => Err(format!("Unknown association method: {}", other)),
        }
    }
}

/// A confidence-scored link between a document section and an ontology
/// concept. The two methods may disagree and coexist; uniqueness is per
/// `(section_id, concept_uri, method)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionConceptAssociation {
    pub id: Uuid,
    pub section_id: i64,
    pub concept_uri: String,
    pub concept_label: String,
    pub match_score: f32,
    pub method: AssociationMethod,
    pub created_at_utc: DateTime<Utc>,
}

/// An association before insertion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateAssociation {
    pub section_id: i64,
    pub concept_uri: String,
    pub concept_label: String,
    pub match_score: f32,
    pub method: AssociationMethod,
}

impl CandidateAssociation {
    pub fn validate(&self) -> Result<()> {
        if self.concept_uri.is_empty() {
            return Err(Error::InvalidInput(
                "concept_uri must not be empty".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.match_score) {
            return Err(Error::InvalidInput(format!(
                "match_score {} outside [0, 1]",
                self.match_score
            )));
        }
        Ok(())
    }
}

// =============================================================================
// CORPUS CARRIERS
// =============================================================================

/// An ethics-case document imported by the upstream application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: i64,
    pub external_ref: Option<String>,
    pub title: String,
    /// Points at the canonical guideline after consolidation.
    pub canonical_guideline_id: Option<i64>,
    pub created_at_utc: DateTime<Utc>,
}

/// A guideline record tied to a document.
///
/// Historical imports sometimes produced several guidelines for one
/// document; the dedup service heals that, keeping the oldest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Guideline {
    pub id: i64,
    pub document_id: i64,
    pub title: String,
    pub created_at_utc: DateTime<Utc>,
}

/// One section of a document, the unit associations attach to.
#[derive(Debug, Clone)]
pub struct DocumentSection {
    pub id: i64,
    pub document_id: i64,
    pub position: i32,
    pub content: String,
    pub embedding: Option<Vector>,
}

/// An ontology concept with a cached embedding for similarity scoring.
#[derive(Debug, Clone)]
pub struct OntologyConcept {
    pub uri: String,
    pub label: String,
    pub embedding: Option<Vector>,
    pub updated_at_utc: DateTime<Utc>,
}

// =============================================================================
// EXTERNAL COLLABORATOR PAYLOADS
// =============================================================================

/// Candidate tuple produced by the extraction pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedConcept {
    pub content: String,
    pub concept_uri: String,
    pub concept_label: String,
    pub confidence: f32,
}

/// One concept association proposed by the reasoning service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConceptSuggestion {
    pub concept_uri: String,
    pub concept_label: String,
    /// Absent means the service gave no explicit confidence; scored 1.0.
    pub confidence: Option<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn candidate() -> CandidateTriple {
        CandidateTriple {
            subject: "case:190".to_string(),
            predicate: "onto:annotatedWith".to_string(),
            object: "onto:Beneficence".to_string(),
            is_literal: false,
            graph: "graph:main".to_string(),
            owner_entity_type: OwnerEntityType::Guideline,
            owner_entity_id: "42".to_string(),
            metadata: None,
        }
    }

    #[test]
    fn test_validate_accepts_well_formed_triple() {
        assert!(candidate().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_subject_and_predicate() {
        let mut c = candidate();
        c.subject = String::new();
        assert!(matches!(
            c.validate(),
            Err(Error::ConstraintViolation(_))
        ));

        let mut c = candidate();
        c.predicate = String::new();
        assert!(matches!(
            c.validate(),
            Err(Error::ConstraintViolation(_))
        ));
    }

    #[test]
    fn test_validate_empty_object_only_for_literals() {
        let mut c = candidate();
        c.object = String::new();
        assert!(c.validate().is_err());

        c.is_literal = true;
        assert!(c.validate().is_ok(), "empty-string literal is valid");
    }

    #[test]
    fn test_dedup_key_is_stable() {
        assert_eq!(candidate().dedup_key(), candidate().dedup_key());
    }

    #[test]
    fn test_dedup_key_distinguishes_owner() {
        let a = candidate();
        let mut b = candidate();
        b.owner_entity_id = "43".to_string();
        assert_ne!(a.dedup_key(), b.dedup_key());
    }

    #[test]
    fn test_dedup_key_distinguishes_literal_flag() {
        let a = candidate();
        let mut b = candidate();
        b.is_literal = true;
        assert_ne!(a.dedup_key(), b.dedup_key());
    }

    #[test]
    fn test_dedup_key_ignores_metadata() {
        let a = candidate();
        let mut b = candidate();
        b.metadata = Some(serde_json::json!({"source": "import"}));
        assert_eq!(a.dedup_key(), b.dedup_key());
    }

    #[test]
    fn test_pattern_for_owner() {
        let p = TriplePattern::for_owner(OwnerEntityType::Guideline, "10");
        assert_eq!(p.owner_entity_id.as_deref(), Some("10"));
        assert!(p.subject.is_none());
        assert!(p.graph.is_none());
    }

    #[test]
    fn test_association_score_range() {
        let mut a = CandidateAssociation {
            section_id: 1,
            concept_uri: "onto:Autonomy".to_string(),
            concept_label: "Autonomy".to_string(),
            match_score: 0.7,
            method: AssociationMethod::Embedding,
        };
        assert!(a.validate().is_ok());

        a.match_score = 1.2;
        assert!(a.validate().is_err());

        a.match_score = -0.1;
        assert!(a.validate().is_err());
    }

    #[test]
    fn test_method_round_trip() {
        for m in [AssociationMethod::Embedding, AssociationMethod::Llm] {
            assert_eq!(AssociationMethod::from_str(m.as_str()).unwrap(), m);
        }
        assert!(AssociationMethod::from_str("vector").is_err());
    }

    #[test]
    fn test_owner_entity_type_round_trip() {
        for t in [
            OwnerEntityType::Guideline,
            OwnerEntityType::Document,
            OwnerEntityType::AnnotationGroup,
        ] {
            assert_eq!(OwnerEntityType::from_str(t.as_str()).unwrap(), t);
        }
    }

    #[test]
    fn test_create_request_requires_edits_for_user_approved() {
        let req = CreateAnnotationRequest {
            content: "revised text".to_string(),
            stage: Some(ApprovalStage::UserApproved),
            ..Default::default()
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_create_request_rejects_empty_content() {
        let req = CreateAnnotationRequest::default();
        assert!(req.validate().is_err());
    }
}
