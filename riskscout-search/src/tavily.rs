//! Tavily web search.
//!
//! Requires an API key. Without one every call fails with
//! `SearchError::MissingCredential`, which the guarded wrapper turns into a
//! failed response.

use crate::http;
use async_trait::async_trait;
use riskscout_core::provider::SearchProvider;
use riskscout_core::{SearchError, SearchRequest, Source, Topic};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

pub const NAME: &str = "tavily";
const TAVILY_API: &str = "https://api.tavily.com/search";

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    url: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    score: Option<f64>,
    #[serde(default)]
    published_date: Option<String>,
}

pub struct TavilyProvider {
    client: reqwest::Client,
    api_key: Option<String>,
    api_key_env: String,
}

impl TavilyProvider {
    pub fn new(api_key_env: &str, timeout: Duration) -> Result<Self, SearchError> {
        Ok(Self {
            client: http::client(NAME, timeout)?,
            api_key: http::api_key_from_env(api_key_env),
            api_key_env: api_key_env.to_string(),
        })
    }

    pub fn has_credentials(&self) -> bool {
        self.api_key.is_some()
    }
}

/// Tavily's own topic switch: news gets the recency-tuned index.
fn tavily_topic(topic: Topic) -> &'static str {
    match topic {
        Topic::News => "news",
        _ => "general",
    }
}

#[async_trait]
impl SearchProvider for TavilyProvider {
    fn name(&self) -> &str {
        NAME
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<Source>, SearchError> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| SearchError::MissingCredential {
                provider: NAME.to_string(),
                env_var: self.api_key_env.clone(),
            })?;

        let mut body = json!({
            "query": request.query,
            "topic": tavily_topic(request.topic),
            "max_results": request.max_results,
            "search_depth": "basic",
            "include_answer": false,
        });
        if let Some(ref region) = request.region {
            body["country"] = json!(region);
        }

        debug!(query = %request.query, "Sending Tavily search");
        let response: TavilyResponse = http::send_json(
            NAME,
            self.client.post(TAVILY_API).bearer_auth(api_key).json(&body),
        )
        .await?;

        Ok(convert_results(response, request.topic))
    }
}

fn convert_results(response: TavilyResponse, topic: Topic) -> Vec<Source> {
    response
        .results
        .into_iter()
        .filter(|r| !r.url.trim().is_empty())
        .map(|r| {
            let title = if r.title.trim().is_empty() {
                r.url.clone()
            } else {
                r.title
            };
            let mut source = Source::new(title, r.url, topic, r.content)
                .with_score(r.score.unwrap_or(0.0));
            source.date = r.published_date;
            source
        })
        .collect()
}

/// Parse a raw Tavily response body.
pub fn parse_tavily_response(body: &str, topic: Topic) -> Result<Vec<Source>, SearchError> {
    let response: TavilyResponse =
        serde_json::from_str(body).map_err(|e| SearchError::Parse {
            provider: NAME.to_string(),
            message: e.to_string(),
        })?;
    Ok(convert_results(response, topic))
}
