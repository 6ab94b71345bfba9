//! Core types for the research pipeline: sources, key points, search
//! envelopes, and usage records.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Topic tag for a research branch and the sources it produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    News,
    Professional,
    Regulatory,
    Academic,
    /// Results from the supplementary encyclopedia provider.
    General,
}

impl Topic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::News => "news",
            Topic::Professional => "professional",
            Topic::Regulatory => "regulatory",
            Topic::Academic => "academic",
            Topic::General => "general",
        }
    }

    /// Terms appended to the subject when building this topic's query.
    pub fn query_terms(&self) -> &'static str {
        match self {
            Topic::News => "latest news",
            Topic::Professional => "industry analysis expert commentary",
            Topic::Regulatory => "regulation compliance requirements",
            Topic::Academic => "research study",
            Topic::General => "",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured bibliographic data attached to a source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub venue: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

impl Citation {
    /// Short "Author et al., Venue, Date" rendering for reference lists.
    pub fn short_form(&self) -> String {
        let mut parts = Vec::new();
        match self.authors.len() {
            0 => {}
            1 => parts.push(self.authors[0].clone()),
            _ => parts.push(format!("{} et al.", self.authors[0])),
        }
        if let Some(ref venue) = self.venue {
            parts.push(venue.clone());
        }
        if let Some(ref date) = self.date {
            parts.push(date.clone());
        }
        parts.join(", ")
    }
}

/// A single external document reference returned by a search provider.
///
/// Immutable once created; the url is its identity within a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub title: String,
    pub url: String,
    /// Publication date exactly as the provider reported it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    pub topic: Topic,
    pub content: String,
    #[serde(default)]
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citation: Option<Citation>,
}

impl Source {
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        topic: Topic,
        content: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            date: None,
            topic,
            content: content.into(),
            score: 0.0,
            citation: None,
        }
    }

    /// Set the relevance score. Non-finite scores count as unscored.
    pub fn with_score(mut self, score: f64) -> Self {
        self.score = if score.is_finite() { score } else { 0.0 };
        self
    }

    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = Some(date.into());
        self
    }

    pub fn with_citation(mut self, citation: Citation) -> Self {
        self.citation = Some(citation);
        self
    }

    /// Identity key used for cross-branch deduplication.
    pub fn dedup_key(&self) -> String {
        normalize_url(&self.url)
    }
}

/// Normalize a url for identity comparison: trimmed, lowercased, with
/// trailing slashes removed.
pub fn normalize_url(url: &str) -> String {
    url.trim().to_lowercase().trim_end_matches('/').to_string()
}

/// An atomic fact extracted from one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyPoint {
    pub content: String,
    pub topic: Topic,
    /// Primary source url. `None` only between extraction and attachment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    /// Further source urls merged into this key point, first-seen order.
    #[serde(default)]
    pub additional_sources: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citation: Option<Citation>,
    #[serde(default)]
    pub additional_citations: Vec<Citation>,
}

impl KeyPoint {
    pub fn new(content: impl Into<String>, topic: Topic) -> Self {
        Self {
            content: content.into(),
            topic,
            source_url: None,
            additional_sources: Vec::new(),
            citation: None,
            additional_citations: Vec::new(),
        }
    }

    /// Stamp this key point with the source it was extracted from.
    pub fn attach(mut self, source: &Source) -> Self {
        self.source_url = Some(source.url.clone());
        self.citation = source.citation.clone();
        self
    }

    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = Some(url.into());
        self
    }

    /// Every url this key point is attributed to, primary first.
    pub fn all_sources(&self) -> Vec<&str> {
        self.source_url
            .iter()
            .map(String::as_str)
            .chain(self.additional_sources.iter().map(String::as_str))
            .collect()
    }

    /// Record an extra source url unless it is already attributed.
    pub fn add_source(&mut self, url: &str) {
        if self.source_url.as_deref() == Some(url) {
            return;
        }
        if !self.additional_sources.iter().any(|u| u == url) {
            self.additional_sources.push(url.to_string());
        }
    }

    /// Record an extra citation unless it is already present.
    pub fn add_citation(&mut self, citation: &Citation) {
        if self.citation.as_ref() == Some(citation) {
            return;
        }
        if !self.additional_citations.contains(citation) {
            self.additional_citations.push(citation.clone());
        }
    }
}

/// Input to a single provider call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub topic: Topic,
    pub max_results: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

impl SearchRequest {
    pub const MIN_RESULTS: usize = 1;
    pub const MAX_RESULTS: usize = 100;

    pub fn new(query: impl Into<String>, topic: Topic, max_results: usize) -> Self {
        Self {
            query: query.into(),
            topic,
            max_results: max_results.clamp(Self::MIN_RESULTS, Self::MAX_RESULTS),
            region: None,
        }
    }

    pub fn with_region(mut self, region: Option<String>) -> Self {
        self.region = region;
        self
    }
}

/// Outcome class of a provider call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStatus {
    /// At least one result was returned.
    Ok,
    /// The provider answered but found nothing. Not a dependency failure.
    Empty,
    /// The provider was unavailable, timed out, or its circuit is open.
    Failed,
}

/// Result envelope from a provider call.
///
/// A successful response with zero results cannot be constructed: empty
/// result sets are classified as [`SearchStatus::Empty`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub provider: String,
    pub results: Vec<Source>,
    pub status: SearchStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl SearchResponse {
    pub const NO_RESULTS: &'static str = "no results";

    pub fn from_results(provider: impl Into<String>, results: Vec<Source>) -> Self {
        if results.is_empty() {
            Self {
                provider: provider.into(),
                results,
                status: SearchStatus::Empty,
                error_message: Some(Self::NO_RESULTS.to_string()),
            }
        } else {
            Self {
                provider: provider.into(),
                results,
                status: SearchStatus::Ok,
                error_message: None,
            }
        }
    }

    pub fn failed(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            results: Vec::new(),
            status: SearchStatus::Failed,
            error_message: Some(message.into()),
        }
    }

    pub fn success(&self) -> bool {
        self.status == SearchStatus::Ok
    }

    pub fn is_failure(&self) -> bool {
        self.status == SearchStatus::Failed
    }
}

/// Token and cost accounting for one LLM-backed call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub operation: String,
    pub model: String,
    pub tokens: usize,
    pub cost: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UsageRecord {
    pub fn new(operation: impl Into<String>, model: impl Into<String>, tokens: usize, cost: f64) -> Self {
        Self {
            operation: operation.into(),
            model: model.into(),
            tokens,
            cost,
            error: None,
        }
    }

    /// A zero-usage record for a call that did not produce a result.
    pub fn failed(operation: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

/// A reference to an input risk the research is correlated with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskRef {
    pub id: String,
    #[serde(default)]
    pub title: String,
}

impl RiskRef {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
        }
    }
}
