//! Provider selection and provider-set assembly from configuration.

use crate::{duckduckgo, semantic_scholar, tavily, wikipedia};
use riskscout_core::provider::{GuardedProvider, ProviderSet, SearchProvider};
use riskscout_core::{ScoutConfig, SearchError};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Provider used when a configured name is not recognized.
pub const DEFAULT_PROVIDER: &str = duckduckgo::NAME;

/// A provider known to this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderInfo {
    pub name: &'static str,
    pub description: &'static str,
    /// Calls fail with a missing-credential error until a key is set.
    pub requires_key: bool,
}

pub const PROVIDERS: &[ProviderInfo] = &[
    ProviderInfo {
        name: tavily::NAME,
        description: "Tavily web search with relevance scores",
        requires_key: true,
    },
    ProviderInfo {
        name: duckduckgo::NAME,
        description: "DuckDuckGo instant answers",
        requires_key: false,
    },
    ProviderInfo {
        name: wikipedia::NAME,
        description: "Wikipedia full-text search",
        requires_key: false,
    },
    ProviderInfo {
        name: semantic_scholar::NAME,
        description: "Semantic Scholar paper search with citations",
        requires_key: false,
    },
];

/// Whether `name` is a known provider.
pub fn is_known(name: &str) -> bool {
    PROVIDERS.iter().any(|p| p.name == normalize(name))
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase().replace('-', "_")
}

/// Construct the adapter named `name`. Unknown names log a warning and
/// fall back to [`DEFAULT_PROVIDER`].
pub fn select_provider(
    name: &str,
    config: &ScoutConfig,
) -> Result<Arc<dyn SearchProvider>, SearchError> {
    let timeout = Duration::from_secs(config.search.timeout_secs);
    let normalized = normalize(name);
    let provider: Arc<dyn SearchProvider> = match normalized.as_str() {
        tavily::NAME => Arc::new(tavily::TavilyProvider::new(
            &config.search.tavily_api_key_env,
            timeout,
        )?),
        duckduckgo::NAME => Arc::new(duckduckgo::DuckDuckGoProvider::new(timeout)?),
        wikipedia::NAME => Arc::new(wikipedia::WikipediaProvider::new(timeout)?),
        semantic_scholar::NAME => Arc::new(semantic_scholar::SemanticScholarProvider::new(
            &config.search.semantic_scholar_api_key_env,
            timeout,
        )?),
        _ => {
            warn!(
                requested = name,
                fallback = DEFAULT_PROVIDER,
                "Unknown search provider; using default"
            );
            Arc::new(duckduckgo::DuckDuckGoProvider::new(timeout)?)
        }
    };
    Ok(provider)
}

/// Assemble every provider the configuration asks for, each behind its own
/// breaker.
pub fn build_provider_set(config: &ScoutConfig) -> Result<ProviderSet, SearchError> {
    let primary = select_provider(&config.search.provider, config)?;
    let mut set = ProviderSet::new(GuardedProvider::from_config(primary, config));

    if config.search.enable_academic {
        let academic = select_provider(&config.search.academic_provider, config)?;
        set = set.with_academic(GuardedProvider::from_config(academic, config));
    }

    if config.search.supplementary.enabled {
        let supplementary = select_provider(&config.search.supplementary.provider, config)?;
        set = set.with_supplementary(GuardedProvider::from_config(supplementary, config));
    }

    info!(providers = ?set.names(), "Search providers ready");
    Ok(set)
}
