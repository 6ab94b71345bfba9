//! # Riskscout Search
//!
//! Concrete search-provider adapters for the Riskscout research pipeline.
//! Each adapter implements [`SearchProvider`](riskscout_core::SearchProvider)
//! and may fail freely; callers wrap them with
//! [`GuardedProvider`](riskscout_core::GuardedProvider) through
//! [`build_provider_set`].

mod http;

pub mod duckduckgo;
pub mod select;
pub mod semantic_scholar;
pub mod tavily;
pub mod wikipedia;

pub use duckduckgo::DuckDuckGoProvider;
pub use select::{DEFAULT_PROVIDER, PROVIDERS, ProviderInfo, build_provider_set, is_known, select_provider};
pub use semantic_scholar::SemanticScholarProvider;
pub use tavily::TavilyProvider;
pub use wikipedia::WikipediaProvider;

use riskscout_core::Topic;

/// Drop the topic's generic query terms from the end of `query`, leaving
/// the subject and focus keywords.
pub fn strip_topic_terms(query: &str, topic: Topic) -> String {
    let terms = topic.query_terms();
    let trimmed = query.trim();
    if terms.is_empty() {
        return trimmed.to_string();
    }
    match trimmed.strip_suffix(terms) {
        Some(rest) if !rest.trim().is_empty() => rest.trim_end().to_string(),
        _ => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_topic_terms() {
        assert_eq!(strip_topic_terms("Acme ports latest news", Topic::News), "Acme ports");
        assert_eq!(strip_topic_terms("Acme research study", Topic::Academic), "Acme");
        assert_eq!(strip_topic_terms("Acme", Topic::General), "Acme");
        // Never strip down to nothing.
        assert_eq!(strip_topic_terms("latest news", Topic::News), "latest news");
    }
}
