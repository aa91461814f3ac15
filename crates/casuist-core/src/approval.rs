//! Approval-stage state machine for annotation versions.
//!
//! Stages move strictly forward: `llm_extracted` -> `llm_approved` ->
//! `user_approved`. The transition table is explicit so an illegal stage
//! name or a regression is rejected at the type level rather than by
//! string comparison.

use serde::{Deserialize, Serialize};

/// Review status of one annotation version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStage {
    /// Produced by the extraction pipeline, unreviewed.
    LlmExtracted,
    /// Accepted by an automated review pass.
    LlmApproved,
    /// Signed off by a human. Terminal for this version.
    UserApproved,
}

impl ApprovalStage {
    /// Position in the forward-only progression.
    pub fn rank(&self) -> u8 {
        match self {
            Self::LlmExtracted => 0,
            Self::LlmApproved => 1,
            Self::UserApproved => 2,
        }
    }

    /// Whether a promotion to `to` is legal from this stage.
    ///
    /// Skipping a stage is allowed (`llm_extracted` -> `user_approved`);
    /// standing still or moving backward is not.
    pub fn can_advance_to(&self, to: ApprovalStage) -> bool {
        match (self, to) {
            (Self::LlmExtracted, Self::LlmApproved) => true,
            (Self::LlmExtracted, Self::UserApproved) => true,
            (Self::LlmApproved, Self::UserApproved) => true,
            _ => false,
        }
    }

    /// Database/wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LlmExtracted => "llm_extracted",
            Self::LlmApproved => "llm_approved",
            Self::UserApproved => "user_approved",
        }
    }
}

impl Default for ApprovalStage {
    fn default() -> Self {
        Self::LlmExtracted
    }
}

impl std::fmt::Display for ApprovalStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ApprovalStage {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "llm_extracted" => Ok(Self::LlmExtracted),
            "llm_approved" => Ok(Self::LlmApproved),
            "user_approved" => Ok(Self::UserApproved),
            other => Err(format!("Unknown approval stage: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_forward_transitions_allowed() {
        assert!(ApprovalStage::LlmExtracted.can_advance_to(ApprovalStage::LlmApproved));
        assert!(ApprovalStage::LlmExtracted.can_advance_to(ApprovalStage::UserApproved));
        assert!(ApprovalStage::LlmApproved.can_advance_to(ApprovalStage::UserApproved));
    }

    #[test]
    fn test_regressions_rejected() {
        assert!(!ApprovalStage::LlmApproved.can_advance_to(ApprovalStage::LlmExtracted));
        assert!(!ApprovalStage::UserApproved.can_advance_to(ApprovalStage::LlmApproved));
        assert!(!ApprovalStage::UserApproved.can_advance_to(ApprovalStage::LlmExtracted));
    }

    #[test]
    fn test_self_transition_rejected() {
        for stage in [
            ApprovalStage::LlmExtracted,
            ApprovalStage::LlmApproved,
            ApprovalStage::UserApproved,
        ] {
            assert!(!stage.can_advance_to(stage));
        }
    }

    #[test]
    fn test_rank_is_monotonic_over_legal_transitions() {
        for from in [
            ApprovalStage::LlmExtracted,
            ApprovalStage::LlmApproved,
            ApprovalStage::UserApproved,
        ] {
            for to in [
                ApprovalStage::LlmExtracted,
                ApprovalStage::LlmApproved,
                ApprovalStage::UserApproved,
            ] {
                if from.can_advance_to(to) {
                    assert!(to.rank() > from.rank());
                }
            }
        }
    }

    #[test]
    fn test_round_trip_str() {
        for stage in [
            ApprovalStage::LlmExtracted,
            ApprovalStage::LlmApproved,
            ApprovalStage::UserApproved,
        ] {
            assert_eq!(ApprovalStage::from_str(stage.as_str()).unwrap(), stage);
        }
    }

    #[test]
    fn test_unknown_stage_name_rejected() {
        assert!(ApprovalStage::from_str("approved").is_err());
        assert!(ApprovalStage::from_str("").is_err());
        assert!(ApprovalStage::from_str("LLM_EXTRACTED").is_err());
    }

    #[test]
    fn test_default_is_llm_extracted() {
        assert_eq!(ApprovalStage::default(), ApprovalStage::LlmExtracted);
    }
}
