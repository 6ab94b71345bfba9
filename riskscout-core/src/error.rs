//! Error types for the Riskscout research core.
//!
//! Uses `thiserror` for public API error types. Only [`ValidationError`] is
//! ever surfaced by the research entry point; LLM and search failures are
//! recovered into degraded values below it.

/// Top-level error type for the Riskscout core library.
#[derive(Debug, thiserror::Error)]
pub enum ScoutError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid request: {0}")]
    Validation(#[from] ValidationError),

}

/// Errors from LLM provider interactions and structured generation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LlmError {
    #[error("API request failed: {message}")]
    ApiRequest { message: String },

    #[error("API response parse error: {message}")]
    ResponseParse { message: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Provider connection failed: {message}")]
    Connection { message: String },

    #[error("Circuit open for dependency '{dependency}'")]
    CircuitOpen { dependency: String },

    #[error("Unsupported LLM provider '{provider}'")]
    UnsupportedProvider { provider: String },

    #[error("Prompt template '{prompt}' failed to render: {message}")]
    Template { prompt: String, message: String },
}

/// Errors from search provider adapters.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SearchError {
    #[error("Provider '{provider}' is not configured: env var '{env_var}' not set")]
    MissingCredential { provider: String, env_var: String },

    #[error("Provider '{provider}' request failed: {message}")]
    Request { provider: String, message: String },

    #[error("Provider '{provider}' returned status {status}")]
    Status { provider: String, status: u16 },

    #[error("Provider '{provider}' response could not be parsed: {message}")]
    Parse { provider: String, message: String },

    #[error("Provider '{provider}' timed out after {timeout_secs}s")]
    Timeout { provider: String, timeout_secs: u64 },

    #[error("Circuit open for provider '{provider}'")]
    CircuitOpen { provider: String },
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration parse error: {message}")]
    ParseError { message: String },

    #[error("Invalid configuration: {}", problems.join("; "))]
    Invalid { problems: Vec<String> },
}

/// Malformed research requests. These indicate a caller bug and are never
/// degraded into a report.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("subject must not be empty")]
    EmptySubject,

    #[error("max_results must be between {min} and {max}, got {value}")]
    MaxResultsOutOfRange { value: usize, min: usize, max: usize },

    #[error("focus keyword at position {index} is blank")]
    BlankKeyword { index: usize },

    #[error("risk at position {index} is missing its correlation id")]
    MissingRiskId { index: usize },
}

/// Error returned by a circuit-breaker guarded call.
#[derive(Debug, thiserror::Error)]
pub enum BreakerError<E> {
    #[error("circuit open for dependency '{dependency}'")]
    Open { dependency: String },

    #[error(transparent)]
    Inner(E),
}

impl<E> BreakerError<E> {
    /// Whether the call was rejected without reaching the dependency.
    pub fn is_open(&self) -> bool {
        matches!(self, BreakerError::Open { .. })
    }
}

impl From<BreakerError<LlmError>> for LlmError {
    fn from(err: BreakerError<LlmError>) -> Self {
        match err {
            BreakerError::Open { dependency } => LlmError::CircuitOpen { dependency },
            BreakerError::Inner(e) => e,
        }
    }
}

impl From<BreakerError<SearchError>> for SearchError {
    fn from(err: BreakerError<SearchError>) -> Self {
        match err {
            BreakerError::Open { dependency } => SearchError::CircuitOpen {
                provider: dependency,
            },
            BreakerError::Inner(e) => e,
        }
    }
}

/// A type alias for results using the top-level `ScoutError`.
pub type Result<T> = std::result::Result<T, ScoutError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_validation() {
        let err = ScoutError::Validation(ValidationError::MaxResultsOutOfRange {
            value: 0,
            min: 1,
            max: 100,
        });
        assert_eq!(
            err.to_string(),
            "Invalid request: max_results must be between 1 and 100, got 0"
        );
    }

    #[test]
    fn test_error_display_search() {
        let err = ScoutError::Search(SearchError::MissingCredential {
            provider: "tavily".into(),
            env_var: "TAVILY_API_KEY".into(),
        });
        assert_eq!(
            err.to_string(),
            "Search error: Provider 'tavily' is not configured: env var 'TAVILY_API_KEY' not set"
        );
    }

    #[test]
    fn test_breaker_error_converts_to_llm_error() {
        let err: LlmError = BreakerError::Open {
            dependency: "llm".to_string(),
        }
        .into();
        assert!(matches!(err, LlmError::CircuitOpen { .. }));

        let inner: LlmError = BreakerError::Inner(LlmError::Timeout { timeout_secs: 30 }).into();
        assert_eq!(inner.to_string(), "Request timed out after 30s");
    }

    #[test]
    fn test_breaker_error_converts_to_search_error() {
        let err: SearchError = BreakerError::<SearchError>::Open {
            dependency: "wikipedia".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "Circuit open for provider 'wikipedia'");
    }

    #[test]
    fn test_error_from_serde() {
        let serde_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: ScoutError = serde_err.into();
        assert!(matches!(err, ScoutError::Serialization(_)));
    }
}
