//! Join step: deduplicate every branch's key points and synthesize a
//! citation-annotated narrative.

use super::dedup::KeyPointDeduplicator;
use crate::llm::{PromptGenerator, PromptId};
use crate::types::{KeyPoint, UsageRecord};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

/// Placeholder narrative used when synthesis fails.
pub const SYNTHESIS_UNAVAILABLE: &str =
    "Summary unavailable: the synthesis step failed. The collected sources and key points are listed without a narrative.";

/// One entry of the reference list cited by the narrative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    #[serde(default)]
    pub title: String,
    pub url: String,
}

/// Result of the synthesis call, or its clearly-marked fallback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Synthesis {
    pub narrative: String,
    #[serde(default)]
    pub key_risks: Vec<String>,
    #[serde(default)]
    pub insights: Vec<String>,
    #[serde(default)]
    pub references: Vec<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Synthesis {
    pub fn fallback(error: impl Into<String>) -> Self {
        Self {
            narrative: SYNTHESIS_UNAVAILABLE.to_string(),
            key_risks: Vec::new(),
            insights: Vec::new(),
            references: Vec::new(),
            error: Some(error.into()),
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.error.is_some()
    }
}

/// Output of the join step.
#[derive(Debug, Clone)]
pub struct Summary {
    pub key_points: Vec<KeyPoint>,
    pub synthesis: Option<Synthesis>,
    /// Usage of the synthesis call. `None` when no call was made.
    pub usage: Option<UsageRecord>,
}

/// Deduplicate `key_points` and, when any remain, synthesize a narrative.
///
/// Never fails: an LLM or parse failure yields [`Synthesis::fallback`].
pub async fn summarize_key_points(
    generator: &PromptGenerator,
    deduplicator: &KeyPointDeduplicator,
    subject: &str,
    focus: Option<&str>,
    key_points: Vec<KeyPoint>,
) -> Summary {
    let key_points = deduplicator.deduplicate(key_points);
    if key_points.is_empty() {
        debug!("No key points to summarize; skipping synthesis");
        return Summary {
            key_points,
            synthesis: None,
            usage: None,
        };
    }

    let inputs = json!({
        "subject": subject,
        "focus": focus,
        "key_points": key_points
            .iter()
            .map(|kp| json!({ "content": kp.content, "sources": kp.all_sources() }))
            .collect::<Vec<_>>(),
    });

    let generation = generator
        .generate_or(PromptId::SummarizeKeyPoints, &inputs, |e| {
            warn!(error = %e, "Synthesis degraded to fallback summary");
            Synthesis::fallback(e.to_string())
        })
        .await;

    let mut synthesis = generation.value;
    synthesis.references.retain(|r| !r.url.trim().is_empty());

    Summary {
        key_points,
        synthesis: Some(synthesis),
        usage: Some(generation.usage),
    }
}
