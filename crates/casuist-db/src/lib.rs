//! # casuist-db
//!
//! PostgreSQL persistence layer for the casuist annotation engine.
//!
//! This crate provides:
//! - Connection pool management
//! - The append-only triple store with owner-scoped uniqueness
//! - The annotation version ledger (approval state machine, lineage)
//! - The deduplication service (triple resolve, guideline consolidation)
//! - Corpus repositories (documents, guidelines, sections, concepts)
//! - Section/concept association storage
//!
//! Schema is managed externally; the expected DDL ships with the
//! repository documentation and the test fixtures.
//!
//! ## Example
//!
//! ```rust,ignore
//! use casuist_db::Database;
//! use casuist_core::{AnnotationLedger, CreateAnnotationRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/casuist").await?;
//!
//!     let v1 = db.annotations.create_version(CreateAnnotationRequest {
//!         content: "Informed consent was not documented.".to_string(),
//!         concept_uri: Some("onto:InformedConsent".to_string()),
//!         ..Default::default()
//!     }).await?;
//!
//!     println!("group {} v{}", v1.annotation_group_id, v1.version_number);
//!     Ok(())
//! }
//! ```

pub mod annotations;
pub mod associations;
pub mod concepts;
pub mod dedup;
pub mod documents;
pub mod guidelines;
pub mod pool;
pub mod triples;

// Always compiled so integration tests (in tests/) can use the fixtures.
pub mod test_fixtures;

// Re-export core types
pub use casuist_core::*;

// Re-export repository implementations
pub use annotations::PgAnnotationRepository;
pub use associations::PgAssociationRepository;
pub use concepts::PgConceptRepository;
pub use dedup::{PgDedupService, ResolvedTriple};
pub use documents::PgDocumentRepository;
pub use guidelines::PgGuidelineRepository;
pub use pool::{create_pool, create_pool_with_config, log_pool_metrics, PoolConfig};
pub use triples::PgTripleRepository;

/// Combined database context with all repositories.
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Append-only triple store.
    pub triples: PgTripleRepository,
    /// Annotation version ledger.
    pub annotations: PgAnnotationRepository,
    /// Section/concept association storage.
    pub associations: PgAssociationRepository,
    /// Guideline records.
    pub guidelines: PgGuidelineRepository,
    /// Documents and their sections.
    pub documents: PgDocumentRepository,
    /// Ontology concepts with cached embeddings.
    pub concepts: PgConceptRepository,
    /// Deduplication service (triples + guidelines).
    pub dedup: PgDedupService,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            triples: PgTripleRepository::new(pool.clone()),
            annotations: PgAnnotationRepository::new(pool.clone()),
            associations: PgAssociationRepository::new(pool.clone()),
            guidelines: PgGuidelineRepository::new(pool.clone()),
            documents: PgDocumentRepository::new(pool.clone()),
            concepts: PgConceptRepository::new(pool.clone()),
            dedup: PgDedupService::new(pool.clone()),
            pool,
        }
    }

    /// Connect with default pool configuration.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = create_pool(database_url).await?;
        Ok(Self::new(pool))
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self::new(self.pool.clone())
    }
}
