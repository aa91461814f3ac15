//! # casuist-core
//!
//! Core types, traits, and abstractions for the casuist annotation
//! versioning & deduplication engine.
//!
//! This crate provides the foundational data structures and trait
//! definitions that the database, scoring, inference, and jobs crates
//! depend on. It does no I/O of its own.

pub mod approval;
pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod traits;
pub mod user_edits;
pub mod uuid_utils;

// Re-export commonly used types at crate root
pub use approval::ApprovalStage;
pub use error::{Error, Result};
pub use models::*;
pub use traits::*;
pub use user_edits::{UserEdits, USER_EDITS_SCHEMA_VERSION};
pub use uuid_utils::{extract_timestamp, is_v7, new_v7};
