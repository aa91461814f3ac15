//! # casuist-inference
//!
//! Embedding and LLM reasoning backend abstraction for the casuist
//! engine.
//!
//! This crate provides:
//! - An Ollama-compatible HTTP backend implementing both
//!   [`casuist_core::EmbeddingBackend`] and
//!   [`casuist_core::ReasoningBackend`]
//! - Tolerant parsing of structured concept suggestions from model
//!   output
//! - A deterministic mock backend for tests (feature `mock`)
//!
//! The services themselves are black boxes to the engine; everything
//! here is adapter code around their wire formats.

pub mod ollama;
pub mod parsing;

#[cfg(feature = "mock")]
pub mod mock;

// Re-export core types
pub use casuist_core::*;

pub use ollama::OllamaBackend;
pub use parsing::parse_concept_response;

#[cfg(feature = "mock")]
pub use mock::MockInference;
