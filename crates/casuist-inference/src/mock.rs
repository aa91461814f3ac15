//! Deterministic in-process backend for tests.
//!
//! Embeddings are derived from a seeded hash of the input text, so the
//! same text always gets the same vector and different texts diverge.
//! Suggestions echo a configured script.

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;

use casuist_core::{
    ConceptDescriptor, ConceptSuggestion, EmbeddingBackend, ReasoningBackend, Result,
};

/// Test backend implementing both service traits.
pub struct MockInference {
    dimension: usize,
    scripted_suggestions: Mutex<Vec<Vec<ConceptSuggestion>>>,
}

impl MockInference {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            scripted_suggestions: Mutex::new(Vec::new()),
        }
    }

    /// Queue the suggestion batches returned by successive
    /// `suggest_concepts` calls; once drained, calls return empty.
    pub fn script_suggestions(&self, batches: Vec<Vec<ConceptSuggestion>>) {
        let mut scripted = self.scripted_suggestions.lock().unwrap();
        *scripted = batches;
        scripted.reverse();
    }
}

#[async_trait]
impl EmbeddingBackend for MockInference {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut hasher = DefaultHasher::new();
                text.hash(&mut hasher);
                let mut rng = StdRng::seed_from_u64(hasher.finish());
                (0..self.dimension).map(|_| rng.gen_range(-1.0..1.0)).collect()
            })
            .collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[async_trait]
impl ReasoningBackend for MockInference {
    async fn suggest_concepts(
        &self,
        _section_text: &str,
        _candidates: &[ConceptDescriptor],
    ) -> Result<Vec<ConceptSuggestion>> {
        Ok(self
            .scripted_suggestions
            .lock()
            .unwrap()
            .pop()
            .unwrap_or_default())
    }
}
