//! Versioned shape for human edits to LLM-proposed annotation content.
//!
//! The upstream application used to stash edits as free-form JSON; here
//! the payload has an explicit schema, validated when a version is
//! created. `schema_version` gates future shape changes.

use serde::{Deserialize, Serialize};
use similar::{ChangeTag, TextDiff};

use crate::error::{Error, Result};

/// Current schema version for [`UserEdits`].
pub const USER_EDITS_SCHEMA_VERSION: i32 = 1;

/// Record of a human change to annotation content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserEdits {
    pub schema_version: i32,
    /// Unified diff from the parent version's content.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
    /// Free-text rationale supplied by the reviewer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Identifier of the editing user, when the caller tracks one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edited_by: Option<String>,
}

impl UserEdits {
    /// Build an edit record with a unified diff between two contents.
    pub fn from_contents(before: &str, after: &str) -> Self {
        let text_diff = TextDiff::from_lines(before, after);
        let mut diff = String::new();
        for change in text_diff.iter_all_changes() {
            let sign = match change.tag() {
                ChangeTag::Delete => "-",
                ChangeTag::Insert => "+",
                ChangeTag::Equal => " ",
            };
            diff.push_str(sign);
            diff.push_str(change.value());
            if !change.value().ends_with('\n') {
                diff.push('\n');
            }
        }
        Self {
            schema_version: USER_EDITS_SCHEMA_VERSION,
            diff: Some(diff),
            comment: None,
            edited_by: None,
        }
    }

    /// Attach a reviewer comment.
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Attach the editing user.
    pub fn with_editor(mut self, editor: impl Into<String>) -> Self {
        self.edited_by = Some(editor.into());
        self
    }

    /// Boundary validation: known schema version, and at least one of
    /// diff/comment so an empty record cannot masquerade as an edit.
    pub fn validate(&self) -> Result<()> {
        if self.schema_version != USER_EDITS_SCHEMA_VERSION {
            return Err(Error::InvalidInput(format!(
                "unsupported user_edits schema version {}",
                self.schema_version
            )));
        }
        if self.diff.as_deref().map_or(true, str::is_empty)
            && self.comment.as_deref().map_or(true, str::is_empty)
        {
            return Err(Error::InvalidInput(
                "user_edits must carry a diff or a comment".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_contents_produces_unified_diff() {
        let edits = UserEdits::from_contents("autonomy matters\n", "patient autonomy matters\n");
        let diff = edits.diff.as_deref().unwrap();
        assert!(diff.contains("-autonomy matters"));
        assert!(diff.contains("+patient autonomy matters"));
        assert!(edits.validate().is_ok());
    }

    #[test]
    fn test_identical_contents_still_validates() {
        // The diff is all-equal lines but non-empty, which is fine: the
        // reviewer may have toggled approval without changing text.
        let edits = UserEdits::from_contents("same\n", "same\n");
        assert!(edits.validate().is_ok());
    }

    #[test]
    fn test_empty_record_rejected() {
        let edits = UserEdits {
            schema_version: USER_EDITS_SCHEMA_VERSION,
            diff: None,
            comment: None,
            edited_by: None,
        };
        assert!(edits.validate().is_err());
    }

    #[test]
    fn test_comment_only_record_accepted() {
        let edits = UserEdits {
            schema_version: USER_EDITS_SCHEMA_VERSION,
            diff: None,
            comment: Some("approved as extracted".to_string()),
            edited_by: Some("reviewer-7".to_string()),
        };
        assert!(edits.validate().is_ok());
    }

    #[test]
    fn test_unknown_schema_version_rejected() {
        let edits = UserEdits {
            schema_version: 99,
            diff: Some("+x\n".to_string()),
            comment: None,
            edited_by: None,
        };
        assert!(matches!(edits.validate(), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_serde_round_trip_skips_absent_fields() {
        let edits = UserEdits::from_contents("a\n", "b\n").with_comment("tightened wording");
        let json = serde_json::to_string(&edits).unwrap();
        assert!(!json.contains("edited_by"));
        let back: UserEdits = serde_json::from_str(&json).unwrap();
        assert_eq!(back, edits);
    }
}
