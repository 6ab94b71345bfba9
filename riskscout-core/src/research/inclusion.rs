//! Contextual inclusion of the supplementary provider.
//!
//! The supplementary provider (an encyclopedia by default) adds background
//! material. It is useful for knowledge-seeking queries and regulatory
//! context, and noise for time-sensitive news.

use crate::config::SupplementaryConfig;
use crate::types::Topic;

/// Substrings that mark a query as knowledge-seeking.
const KNOWLEDGE_KEYWORDS: &[&str] = &[
    "what is",
    "what are",
    "explain",
    "history",
    "definition",
    "overview",
    "background",
    "how does",
    "meaning of",
    "introduction to",
];

/// Substrings that mark a news query as time-sensitive.
const TIME_SENSITIVE_KEYWORDS: &[&str] = &[
    "latest",
    "breaking",
    "today",
    "recent",
    "this week",
    "update",
    "announced",
];

/// Decides per query whether the supplementary provider runs.
#[derive(Debug, Clone)]
pub struct InclusionPolicy {
    enabled: bool,
    context_aware: bool,
    default_include: bool,
}

impl InclusionPolicy {
    pub fn new(config: &SupplementaryConfig) -> Self {
        Self {
            enabled: config.enabled,
            context_aware: config.context_aware,
            default_include: config.default_include,
        }
    }

    /// Evaluate the rules in order; the first that matches decides.
    pub fn should_include(&self, query: &str, topic: Topic) -> bool {
        if !self.enabled {
            return false;
        }
        if !self.context_aware {
            return true;
        }

        let query = query.to_lowercase();
        if KNOWLEDGE_KEYWORDS.iter().any(|k| query.contains(k)) {
            return true;
        }
        if topic == Topic::Regulatory {
            return true;
        }
        if topic == Topic::News && TIME_SENSITIVE_KEYWORDS.iter().any(|k| query.contains(k)) {
            return false;
        }
        self.default_include
    }
}

impl Default for InclusionPolicy {
    fn default() -> Self {
        Self::new(&SupplementaryConfig::default())
    }
}
