//! Named defaults consumed by `from_env` constructors across crates.

/// Minimum cosine similarity for an embedding-method association to be
/// accepted. Tuned against the reviewed corpus; override with
/// `CASUIST_MATCH_THRESHOLD`.
pub const MATCH_THRESHOLD: f32 = 0.62;

/// Embedding dimension of the default model.
pub const EMBED_DIMENSION: usize = 768;

/// Default inference service endpoint.
pub const OLLAMA_URL: &str = "http://localhost:11434";

/// Default embedding model.
pub const EMBED_MODEL: &str = "nomic-embed-text";

/// Default reasoning model for concept suggestions.
pub const REASON_MODEL: &str = "llama3.1:8b";

/// Timeout for embedding requests (seconds).
pub const EMBED_TIMEOUT_SECS: u64 = 60;

/// Timeout for reasoning requests (seconds).
pub const REASON_TIMEOUT_SECS: u64 = 120;

/// Graph every annotation-produced triple lands in unless the caller
/// scopes it otherwise.
pub const DEFAULT_GRAPH: &str = "urn:casuist:graph:annotations";
