//! Tolerant parsing of structured concept suggestions from model output.
//!
//! Reasoning models wrap JSON in prose or markdown fences more often
//! than not; the extractor accepts a bare JSON array, a fenced block,
//! or the first array found anywhere in the response. Confidence values
//! outside [0, 1] are dropped rather than clamped: a service emitting
//! nonsense confidences should not look certain.

use regex::Regex;
use serde::Deserialize;

use casuist_core::{ConceptSuggestion, Error, Result};

#[derive(Debug, Deserialize)]
struct RawSuggestion {
    #[serde(alias = "uri", alias = "concept")]
    concept_uri: String,
    #[serde(alias = "label", default)]
    concept_label: String,
    #[serde(default)]
    confidence: Option<f32>,
}

/// Extract the JSON array payload from a model response.
fn extract_json_array(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    if trimmed.starts_with('[') {
        return Some(trimmed);
    }

    // ```json ... ``` or ``` ... ``` fenced block
    let fence = Regex::new(r"(?s)```(?:json)?\s*(\[.*?\])\s*```").expect("static regex");
    if let Some(caps) = fence.captures(raw) {
        return caps.get(1).map(|m| m.as_str());
    }

    // Last resort: first bracketed span
    let start = raw.find('[')?;
    let end = raw.rfind(']')?;
    (start < end).then(|| &raw[start..=end])
}

/// Parse a reasoning response into concept suggestions.
///
/// Suggestions with an empty URI or an out-of-range confidence are
/// skipped; an unparseable response is an inference error, not a panic.
pub fn parse_concept_response(raw: &str) -> Result<Vec<ConceptSuggestion>> {
    let payload = extract_json_array(raw).ok_or_else(|| {
        Error::Inference(format!(
            "no JSON array in reasoning response ({} bytes)",
            raw.len()
        ))
    })?;

    let parsed: Vec<RawSuggestion> = serde_json::from_str(payload)
        .map_err(|e| Error::Inference(format!("malformed suggestion payload: {}", e)))?;

    Ok(parsed
        .into_iter()
        .filter(|s| !s.concept_uri.is_empty())
        .filter(|s| {
            s.confidence
                .map_or(true, |c| (0.0..=1.0).contains(&c))
        })
        .map(|s| ConceptSuggestion {
            concept_label: if s.concept_label.is_empty() {
                s.concept_uri.clone()
            } else {
                s.concept_label
            },
            concept_uri: s.concept_uri,
            confidence: s.confidence,
        })
        .collect())
}
