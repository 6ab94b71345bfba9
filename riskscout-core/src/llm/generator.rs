//! Structured generation: render a named prompt, call the model through the
//! LLM breaker, and parse a typed JSON result.

use super::provider::{CompletionRequest, LlmProvider, Message};
use crate::breaker::Breaker;
use crate::config::LlmConfig;
use crate::error::LlmError;
use crate::types::UsageRecord;
use handlebars::Handlebars;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error};

const SYSTEM_PROMPT: &str = "You are a risk research analyst. You read external sources and \
report only facts that are stated in them. Always answer with a single JSON object and nothing else.";

const EXTRACT_KEY_POINTS_TEMPLATE: &str = r#"Subject: {{subject}}
Research topic: {{topic}}
Source title: {{title}}
Source url: {{url}}
{{#if date}}Published: {{date}}
{{/if}}
Source content:
"""
{{content}}
"""

Extract the distinct, verifiable facts in this source that matter when assessing risks
for the subject. Each fact must stand on its own in one or two sentences.
Return an empty list when the source is not relevant.

Respond with JSON: {"key_points": ["fact", "..."]}"#;

const SUMMARIZE_KEY_POINTS_TEMPLATE: &str = r#"Subject: {{subject}}
{{#if focus}}Focus: {{focus}}
{{/if}}
Key points collected from external sources, each followed by the sources that support it:
{{#each key_points}}
- {{this.content}} [{{#each this.sources}}{{this}}{{#unless @last}}; {{/unless}}{{/each}}]
{{/each}}

Write a concise narrative for a risk manager that synthesizes these points. Cite sources
inline as [n] using the order of the references list you return. Also list the key
risks and the actionable insights the points support.

Respond with JSON: {"narrative": "...", "key_risks": ["..."], "insights": ["..."],
"references": [{"title": "...", "url": "..."}]}"#;

/// Named prompts available to the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptId {
    ExtractKeyPoints,
    SummarizeKeyPoints,
}

impl PromptId {
    pub const ALL: [PromptId; 2] = [PromptId::ExtractKeyPoints, PromptId::SummarizeKeyPoints];

    pub fn name(&self) -> &'static str {
        match self {
            PromptId::ExtractKeyPoints => "extract_key_points",
            PromptId::SummarizeKeyPoints => "summarize_key_points",
        }
    }

    fn template(&self) -> &'static str {
        match self {
            PromptId::ExtractKeyPoints => EXTRACT_KEY_POINTS_TEMPLATE,
            PromptId::SummarizeKeyPoints => SUMMARIZE_KEY_POINTS_TEMPLATE,
        }
    }
}

/// A parsed result together with the usage of the call that produced it.
#[derive(Debug, Clone)]
pub struct Generation<T> {
    pub value: T,
    pub usage: UsageRecord,
}

/// Renders prompts and calls the model through a shared LLM breaker.
pub struct PromptGenerator {
    provider: Arc<dyn LlmProvider>,
    breaker: Arc<Breaker>,
    templates: Handlebars<'static>,
    temperature: f32,
    max_tokens: usize,
}

impl PromptGenerator {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        breaker: Arc<Breaker>,
        config: &LlmConfig,
    ) -> Result<Self, LlmError> {
        let mut templates = Handlebars::new();
        templates.set_strict_mode(false);
        templates.register_escape_fn(handlebars::no_escape);
        for prompt in PromptId::ALL {
            templates
                .register_template_string(prompt.name(), prompt.template())
                .map_err(|e| LlmError::Template {
                    prompt: prompt.name().to_string(),
                    message: e.to_string(),
                })?;
        }

        Ok(Self {
            provider,
            breaker,
            templates,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    pub fn breaker(&self) -> &Breaker {
        &self.breaker
    }

    /// Render `prompt` with `inputs` into the final user message.
    pub fn render(&self, prompt: PromptId, inputs: &Value) -> Result<String, LlmError> {
        self.templates
            .render(prompt.name(), inputs)
            .map_err(|e| LlmError::Template {
                prompt: prompt.name().to_string(),
                message: e.to_string(),
            })
    }

    /// Generate a typed result. Errors include circuit-open rejections and
    /// `LlmError::ResponseParse` when the reply does not match `T`.
    pub async fn generate<T: DeserializeOwned>(
        &self,
        prompt: PromptId,
        inputs: &Value,
    ) -> Result<Generation<T>, LlmError> {
        let (result, usage) = self.run::<T>(prompt, inputs).await;
        result.map(|value| Generation {
            value,
            usage: usage.unwrap_or_else(|| UsageRecord::new(prompt.name(), "", 0, 0.0)),
        })
    }

    /// Generate a typed result, substituting `fallback(err)` on any failure.
    ///
    /// The returned usage record carries the error text, and still counts
    /// tokens when the model answered but the reply could not be parsed.
    pub async fn generate_or<T, F>(&self, prompt: PromptId, inputs: &Value, fallback: F) -> Generation<T>
    where
        T: DeserializeOwned,
        F: FnOnce(&LlmError) -> T,
    {
        let (result, usage) = self.run::<T>(prompt, inputs).await;
        match result {
            Ok(value) => Generation {
                value,
                usage: usage.unwrap_or_else(|| UsageRecord::new(prompt.name(), "", 0, 0.0)),
            },
            Err(e) => {
                if matches!(e, LlmError::ResponseParse { .. }) {
                    error!(prompt = prompt.name(), error = %e, "Model output did not match schema");
                } else {
                    debug!(prompt = prompt.name(), error = %e, "Generation degraded to fallback");
                }
                let mut record =
                    usage.unwrap_or_else(|| UsageRecord::failed(prompt.name(), e.to_string()));
                record.error = Some(e.to_string());
                Generation {
                    value: fallback(&e),
                    usage: record,
                }
            }
        }
    }

    async fn run<T: DeserializeOwned>(
        &self,
        prompt: PromptId,
        inputs: &Value,
    ) -> (Result<T, LlmError>, Option<UsageRecord>) {
        let rendered = match self.render(prompt, inputs) {
            Ok(text) => text,
            Err(e) => return (Err(e), None),
        };

        let request = CompletionRequest {
            messages: vec![Message::system(SYSTEM_PROMPT), Message::user(rendered)],
            temperature: self.temperature,
            max_tokens: Some(self.max_tokens),
            model: None,
        };

        let provider = Arc::clone(&self.provider);
        let response = match self
            .breaker
            .guard(move || async move { provider.complete(request).await })
            .await
        {
            Ok(response) => response,
            Err(e) => return (Err(e.into()), None),
        };

        let usage = UsageRecord::new(
            prompt.name(),
            response.model.clone(),
            response.usage.total(),
            self.provider.cost_of(&response.usage),
        );

        (parse_structured::<T>(&response.message.content), Some(usage))
    }
}

/// Parse a JSON object out of a model reply, tolerating code fences and
/// surrounding prose.
pub fn parse_structured<T: DeserializeOwned>(text: &str) -> Result<T, LlmError> {
    let candidate = extract_json_object(text).ok_or_else(|| LlmError::ResponseParse {
        message: "no JSON object found in model output".to_string(),
    })?;
    serde_json::from_str(candidate).map_err(|e| LlmError::ResponseParse {
        message: e.to_string(),
    })
}

fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end >= start).then(|| &text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmProvider;
    use serde::Deserialize;
    use serde_json::json;
    use std::time::Duration;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Points {
        key_points: Vec<String>,
    }

    fn generator(provider: Arc<MockLlmProvider>, threshold: usize) -> PromptGenerator {
        let breaker = Arc::new(Breaker::new("llm", threshold, Duration::from_secs(60)));
        PromptGenerator::new(provider, breaker, &LlmConfig::default()).unwrap()
    }

    fn extract_inputs() -> Value {
        json!({
            "subject": "Acme Logistics",
            "topic": "news",
            "title": "Port strike",
            "url": "https://news.example/strike",
            "content": "Dock workers began a strike on Monday.",
        })
    }

    #[test]
    fn test_parse_structured_handles_fences() {
        let text = "Here you go:\n```json\n{\"key_points\": [\"a\"]}\n```";
        let parsed: Points = parse_structured(text).unwrap();
        assert_eq!(parsed.key_points, vec!["a"]);
    }

    #[test]
    fn test_parse_structured_rejects_non_json() {
        let err = parse_structured::<Points>("no json here").unwrap_err();
        assert!(matches!(err, LlmError::ResponseParse { .. }));
    }

    #[test]
    fn test_render_extract_template() {
        let generator = generator(Arc::new(MockLlmProvider::new()), 3);
        let text = generator
            .render(PromptId::ExtractKeyPoints, &extract_inputs())
            .unwrap();
        assert!(text.contains("Subject: Acme Logistics"));
        assert!(text.contains("Dock workers began a strike"));
        assert!(!text.contains("Published:"));
    }

    #[test]
    fn test_render_summarize_template_lists_sources() {
        let generator = generator(Arc::new(MockLlmProvider::new()), 3);
        let text = generator
            .render(
                PromptId::SummarizeKeyPoints,
                &json!({
                    "subject": "Acme",
                    "key_points": [
                        { "content": "Strike began", "sources": ["https://a.io", "https://b.io"] }
                    ]
                }),
            )
            .unwrap();
        assert!(text.contains("- Strike began [https://a.io; https://b.io]"));
    }

    #[tokio::test]
    async fn test_generate_parses_and_records_usage() {
        let provider = Arc::new(MockLlmProvider::with_model("model-x"));
        provider.queue_text(r#"{"key_points": ["Strike began Monday"]}"#);
        let generator = generator(provider.clone(), 3);

        let generation: Generation<Points> = generator
            .generate(PromptId::ExtractKeyPoints, &extract_inputs())
            .await
            .unwrap();
        assert_eq!(generation.value.key_points, vec!["Strike began Monday"]);
        assert_eq!(generation.usage.operation, "extract_key_points");
        assert_eq!(generation.usage.model, "model-x");
        assert_eq!(generation.usage.tokens, 150);
        assert!(generation.usage.error.is_none());
    }

    #[tokio::test]
    async fn test_generate_or_falls_back_on_parse_error() {
        let provider = Arc::new(MockLlmProvider::new());
        provider.queue_text("I cannot help with that.");
        let generator = generator(provider, 3);

        let generation = generator
            .generate_or(PromptId::ExtractKeyPoints, &extract_inputs(), |_| Points {
                key_points: vec![],
            })
            .await;
        assert!(generation.value.key_points.is_empty());
        assert_eq!(generation.usage.tokens, 150);
        assert!(generation.usage.error.as_deref().unwrap().contains("parse"));
    }

    #[tokio::test]
    async fn test_open_llm_breaker_skips_provider() {
        let provider = Arc::new(MockLlmProvider::new());
        provider.queue_error(LlmError::Connection {
            message: "refused".into(),
        });
        let generator = generator(provider.clone(), 1);

        for _ in 0..3 {
            let generation = generator
                .generate_or(PromptId::ExtractKeyPoints, &extract_inputs(), |_| Points {
                    key_points: vec![],
                })
                .await;
            assert!(generation.usage.error.is_some());
            assert_eq!(generation.usage.tokens, 0);
        }
        assert_eq!(provider.call_count(), 1);
    }
}
