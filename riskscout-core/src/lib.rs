//! # Riskscout Core
//!
//! Core library for the Riskscout research pipeline.
//! Provides the data model, configuration, circuit breakers, the LLM
//! interface, the search-provider contract, and the research orchestrator.

pub mod breaker;
pub mod config;
pub mod error;
pub mod llm;
pub mod provider;
pub mod research;
pub mod types;

// Re-export commonly used types at the crate root.
pub use breaker::{Breaker, BreakerObserver, CircuitState, TracingObserver};
pub use config::{ScoutConfig, load_config};
pub use error::{BreakerError, LlmError, Result, ScoutError, SearchError, ValidationError};
pub use llm::{LlmProvider, MockLlmProvider, OpenAiCompatibleProvider, PromptGenerator, create_provider};
pub use provider::{GuardedProvider, MockSearchProvider, ProviderSet, SearchProvider};
pub use research::{
    ReportResponse, ResearchCallback, ResearchOrchestrator, ResearchRequest, UsageSummary,
};
pub use types::{
    Citation, KeyPoint, RiskRef, SearchRequest, SearchResponse, SearchStatus, Source, Topic,
    UsageRecord,
};
