//! Research request shape and validation.

use crate::error::ValidationError;
use crate::types::{RiskRef, SearchRequest};
use serde::{Deserialize, Serialize};

/// Business context for a research run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchRequest {
    /// Description of the organization, project, or activity under review.
    pub subject: String,
    #[serde(default)]
    pub focus_keywords: Vec<String>,
    /// Results requested from each primary search.
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Risks the research should inform. Each must carry its id.
    #[serde(default)]
    pub risks: Vec<RiskRef>,
}

fn default_max_results() -> usize {
    5
}

impl ResearchRequest {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            focus_keywords: Vec::new(),
            max_results: default_max_results(),
            region: None,
            risks: Vec::new(),
        }
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.focus_keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_risks(mut self, risks: Vec<RiskRef>) -> Self {
        self.risks = risks;
        self
    }

    /// Reject malformed requests before any external call is made.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.subject.trim().is_empty() {
            return Err(ValidationError::EmptySubject);
        }
        if !(SearchRequest::MIN_RESULTS..=SearchRequest::MAX_RESULTS).contains(&self.max_results) {
            return Err(ValidationError::MaxResultsOutOfRange {
                value: self.max_results,
                min: SearchRequest::MIN_RESULTS,
                max: SearchRequest::MAX_RESULTS,
            });
        }
        if let Some(index) = self.focus_keywords.iter().position(|k| k.trim().is_empty()) {
            return Err(ValidationError::BlankKeyword { index });
        }
        if let Some(index) = self.risks.iter().position(|r| r.id.trim().is_empty()) {
            return Err(ValidationError::MissingRiskId { index });
        }
        Ok(())
    }

    /// Focus keywords joined for prompts and queries, if any.
    pub fn focus(&self) -> Option<String> {
        (!self.focus_keywords.is_empty()).then(|| self.focus_keywords.join(", "))
    }
}
