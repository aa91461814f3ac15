//! # casuist-jobs
//!
//! Batch maintenance and ingest for the casuist engine:
//! - the consolidation job that repairs historical duplicate/orphaned
//!   data using the same invariants as the live write path;
//! - the ingest adapter that lands extraction-pipeline output in the
//!   ledger and triple store.
//!
//! Jobs are plain async calls; there is no queue or background loop.
//! The `consolidate` binary wires configuration and logging around a
//! single run.

pub mod consolidation;
pub mod ingest;

// Re-export core types
pub use casuist_core::*;

pub use consolidation::{ConsolidationJob, ConsolidationReport, PassReport, RowFailure};
pub use ingest::{IngestService, IngestSummary};
