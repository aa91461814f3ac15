//! Error types for the casuist annotation engine.

use thiserror::Error;
use uuid::Uuid;

use crate::approval::ApprovalStage;

/// Result type alias using casuist's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for annotation engine operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Malformed triple rejected before insertion
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Illegal approval-stage change (stages only move forward)
    #[error("Invalid transition: {from} -> {to}")]
    InvalidTransition {
        from: ApprovalStage,
        to: ApprovalStage,
    },

    /// Concurrent version creation race; retryable by the caller
    #[error("Version conflict: {0}")]
    VersionConflict(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Annotation group not found
    #[error("Annotation group not found: {0}")]
    GroupNotFound(Uuid),

    /// No guideline exists for the given document
    #[error("No guideline for document: {0}")]
    GuidelineNotFound(i64),

    /// Document not found
    #[error("Document not found: {0}")]
    DocumentNotFound(i64),

    /// Version chain is internally inconsistent (cycle, gap, missing parent)
    #[error("Annotation history corrupt for group {group}: {detail}")]
    HistoryCorrupt { group: Uuid, detail: String },

    /// A multi-row operation failed partway; carries the rows that did complete
    #[error("Partial failure: {message} ({} rows processed)", .processed.len())]
    PartialFailure {
        processed: Vec<String>,
        message: String,
    },

    /// Embedding generation failed
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// LLM reasoning request failed
    #[error("Inference error: {0}")]
    Inference(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Message suitable for end users. Never exposes internals or a
    /// stack trace; the full error stays in logs.
    pub fn user_message(&self) -> &'static str {
        match self {
            Error::VersionConflict(_) => "Your edit could not be saved, please retry.",
            Error::HistoryCorrupt { .. } | Error::PartialFailure { .. } => {
                "This annotation history is inconsistent and needs repair."
            }
            Error::NotFound(_)
            | Error::GroupNotFound(_)
            | Error::GuidelineNotFound(_)
            | Error::DocumentNotFound(_) => "The requested record no longer exists.",
            _ => "The operation could not be completed.",
        }
    }

    /// Whether the caller may safely retry the operation verbatim.
    /// The engine never retries internally; backoff policy belongs to
    /// the edge that owns the request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::VersionConflict(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_constraint_violation() {
        let err = Error::ConstraintViolation("subject must not be empty".to_string());
        assert_eq!(
            err.to_string(),
            "Constraint violation: subject must not be empty"
        );
    }

    #[test]
    fn test_display_invalid_transition() {
        let err = Error::InvalidTransition {
            from: ApprovalStage::UserApproved,
            to: ApprovalStage::LlmExtracted,
        };
        assert_eq!(
            err.to_string(),
            "Invalid transition: user_approved -> llm_extracted"
        );
    }

    #[test]
    fn test_display_version_conflict() {
        let err = Error::VersionConflict("group c4... version 4 already exists".to_string());
        assert!(err.to_string().starts_with("Version conflict:"));
    }

    #[test]
    fn test_display_partial_failure_counts_processed() {
        let err = Error::PartialFailure {
            processed: vec!["10".to_string(), "15".to_string()],
            message: "guideline merge aborted".to_string(),
        };
        assert!(err.to_string().contains("2 rows processed"));
    }

    #[test]
    fn test_display_guideline_not_found() {
        let err = Error::GuidelineNotFound(190);
        assert_eq!(err.to_string(), "No guideline for document: 190");
    }

    #[test]
    fn test_user_message_version_conflict() {
        let err = Error::VersionConflict("raced".to_string());
        assert_eq!(
            err.user_message(),
            "Your edit could not be saved, please retry."
        );
        assert!(err.is_retryable());
    }

    #[test]
    fn test_user_message_corruption() {
        let err = Error::HistoryCorrupt {
            group: Uuid::nil(),
            detail: "parent cycle".to_string(),
        };
        assert_eq!(
            err.user_message(),
            "This annotation history is inconsistent and needs repair."
        );
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_user_message_never_echoes_internals() {
        let err = Error::Internal("stack trace goes here".to_string());
        assert!(!err.user_message().contains("stack trace"));
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
