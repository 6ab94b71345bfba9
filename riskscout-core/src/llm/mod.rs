//! LLM access: provider trait, OpenAI-compatible client, and structured
//! prompt generation.

pub mod generator;
pub mod openai;
pub mod provider;

pub use generator::{Generation, PromptGenerator, PromptId, parse_structured};
pub use openai::OpenAiCompatibleProvider;
pub use provider::{
    CompletionRequest, CompletionResponse, LlmProvider, Message, MockLlmProvider, Role,
    TokenUsage,
};

use crate::config::LlmConfig;
use crate::error::LlmError;
use std::sync::Arc;

/// Base url assumed for `provider = "ollama"` when none is configured.
pub const OLLAMA_BASE_URL: &str = "http://localhost:11434/v1";

/// Provider names accepted in `llm.provider`.
pub const KNOWN_PROVIDERS: &[&str] = &["openai", "openai_compatible", "azure", "ollama", "vllm"];

/// Create an LLM provider based on the configuration.
///
/// Every supported backend speaks the chat completions API, so all of them
/// route to [`OpenAiCompatibleProvider`]; `ollama` also gets its local
/// default base url. Unknown names are rejected.
pub fn create_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    let name = config.provider.trim().to_lowercase().replace('-', "_");
    match name.as_str() {
        "openai" | "openai_compatible" | "azure" | "vllm" => {
            Ok(Arc::new(OpenAiCompatibleProvider::new(config)?))
        }
        "ollama" => {
            let mut config = config.clone();
            config
                .base_url
                .get_or_insert_with(|| OLLAMA_BASE_URL.to_string());
            Ok(Arc::new(OpenAiCompatibleProvider::new(&config)?))
        }
        _ => Err(LlmError::UnsupportedProvider {
            provider: config.provider.clone(),
        }),
    }
}
