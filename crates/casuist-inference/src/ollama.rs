//! Ollama inference backend implementation.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use casuist_core::{
    defaults, ConceptDescriptor, ConceptSuggestion, EmbeddingBackend, Error, ReasoningBackend,
    Result,
};

use crate::parsing::parse_concept_response;

/// Default Ollama endpoint.
pub const DEFAULT_OLLAMA_URL: &str = defaults::OLLAMA_URL;

/// Default embedding model.
pub const DEFAULT_EMBED_MODEL: &str = defaults::EMBED_MODEL;

/// Default reasoning model.
pub const DEFAULT_REASON_MODEL: &str = defaults::REASON_MODEL;

/// Ollama inference backend serving both embedding and reasoning.
pub struct OllamaBackend {
    client: Client,
    base_url: String,
    embed_model: String,
    reason_model: String,
    dimension: usize,
    embed_timeout: Duration,
    reason_timeout: Duration,
}

impl OllamaBackend {
    /// Create a new Ollama backend with default settings.
    pub fn new() -> Self {
        Self::with_config(
            DEFAULT_OLLAMA_URL.to_string(),
            DEFAULT_EMBED_MODEL.to_string(),
            DEFAULT_REASON_MODEL.to_string(),
            defaults::EMBED_DIMENSION,
        )
    }

    /// Create a new Ollama backend with custom configuration.
    pub fn with_config(
        base_url: String,
        embed_model: String,
        reason_model: String,
        dimension: usize,
    ) -> Self {
        let embed_timeout = std::env::var("CASUIST_EMBED_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::EMBED_TIMEOUT_SECS);

        let reason_timeout = std::env::var("CASUIST_REASON_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::REASON_TIMEOUT_SECS);

        let client = Client::builder()
            .timeout(Duration::from_secs(reason_timeout))
            .build()
            .expect("Failed to create HTTP client");

        info!(
            subsystem = "inference",
            component = "ollama",
            url = %base_url,
            embed_model = %embed_model,
            reason_model = %reason_model,
            "Initializing Ollama backend"
        );

        Self {
            client,
            base_url,
            embed_model,
            reason_model,
            dimension,
            embed_timeout: Duration::from_secs(embed_timeout),
            reason_timeout: Duration::from_secs(reason_timeout),
        }
    }

    /// Create from environment variables.
    pub fn from_env() -> Self {
        let base_url =
            std::env::var("OLLAMA_BASE").unwrap_or_else(|_| DEFAULT_OLLAMA_URL.to_string());
        let embed_model = std::env::var("CASUIST_EMBED_MODEL")
            .unwrap_or_else(|_| DEFAULT_EMBED_MODEL.to_string());
        let reason_model = std::env::var("CASUIST_REASON_MODEL")
            .unwrap_or_else(|_| DEFAULT_REASON_MODEL.to_string());
        let dimension = std::env::var("CASUIST_EMBED_DIM")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults::EMBED_DIMENSION);

        Self::with_config(base_url, embed_model, reason_model, dimension)
    }
}

impl Default for OllamaBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

#[async_trait]
impl EmbeddingBackend for OllamaBackend {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let start = Instant::now();
        let response = self
            .client
            .post(format!("{}/api/embed", self.base_url))
            .timeout(self.embed_timeout)
            .json(&EmbedRequest {
                model: &self.embed_model,
                input: texts,
            })
            .send()
            .await?
            .error_for_status()
            .map_err(|e| Error::Embedding(e.to_string()))?;

        let payload: EmbedResponse = response
            .json()
            .await
            .map_err(|e| Error::Embedding(e.to_string()))?;

        if payload.embeddings.len() != texts.len() {
            return Err(Error::Embedding(format!(
                "expected {} vectors, got {}",
                texts.len(),
                payload.embeddings.len()
            )));
        }
        for vector in &payload.embeddings {
            if vector.len() != self.dimension {
                return Err(Error::Embedding(format!(
                    "expected dimension {}, got {}",
                    self.dimension,
                    vector.len()
                )));
            }
        }

        debug!(
            subsystem = "inference",
            component = "ollama",
            op = "embed_texts",
            input_count = texts.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Embeddings generated"
        );
        Ok(payload.embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[async_trait]
impl ReasoningBackend for OllamaBackend {
    async fn suggest_concepts(
        &self,
        section_text: &str,
        candidates: &[ConceptDescriptor],
    ) -> Result<Vec<ConceptSuggestion>> {
        let start = Instant::now();

        let mut catalog = String::new();
        for concept in candidates {
            catalog.push_str(&format!("- {} ({})\n", concept.label, concept.uri));
        }

        let content = format!(
            "Given this passage from an ethics case:\n\n{}\n\n\
             And this catalog of ontology concepts:\n{}\n\
             Return a JSON array of the concepts the passage concerns. Each element: \
             {{\"concept_uri\": string, \"concept_label\": string, \"confidence\": number 0..1}}. \
             Return [] when none apply. Output only the JSON array.",
            section_text, catalog
        );

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .timeout(self.reason_timeout)
            .json(&ChatRequest {
                model: &self.reason_model,
                messages: vec![ChatMessage {
                    role: "user",
                    content,
                }],
                stream: false,
            })
            .send()
            .await?
            .error_for_status()
            .map_err(|e| Error::Inference(e.to_string()))?;

        let payload: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Inference(e.to_string()))?;

        let suggestions = parse_concept_response(&payload.message.content)?;

        debug!(
            subsystem = "inference",
            component = "ollama",
            op = "suggest_concepts",
            result_count = suggestions.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Concept suggestions returned"
        );
        Ok(suggestions)
    }
}
