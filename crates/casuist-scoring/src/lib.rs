//! # casuist-scoring
//!
//! Association scorer for the casuist engine: computes
//! confidence-scored links between document sections and ontology
//! concepts through two independent methods (embedding similarity and
//! LLM judgment) that are allowed to disagree.

pub mod scorer;
pub mod similarity;

// Re-export core types
pub use casuist_core::*;

pub use scorer::{AssociationScorer, ScorerConfig};
pub use similarity::{cosine_similarity, similarity_to_score};
