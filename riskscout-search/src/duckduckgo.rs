//! DuckDuckGo instant answers.
//!
//! No API key required. Results come from the abstract, the related
//! topics (including grouped topics), and the direct results array.

use crate::http;
use async_trait::async_trait;
use riskscout_core::provider::SearchProvider;
use riskscout_core::{SearchError, SearchRequest, Source, Topic};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

pub const NAME: &str = "duckduckgo";
const DUCKDUCKGO_API: &str = "https://api.duckduckgo.com/";

pub struct DuckDuckGoProvider {
    client: reqwest::Client,
}

impl DuckDuckGoProvider {
    pub fn new(timeout: Duration) -> Result<Self, SearchError> {
        Ok(Self {
            client: http::client(NAME, timeout)?,
        })
    }
}

#[async_trait]
impl SearchProvider for DuckDuckGoProvider {
    fn name(&self) -> &str {
        NAME
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<Source>, SearchError> {
        let mut url = format!(
            "{}?q={}&format=json&no_html=1&skip_disambig=1",
            DUCKDUCKGO_API,
            urlencoding::encode(&request.query)
        );
        if let Some(ref region) = request.region {
            url.push_str(&format!("&kl={}", urlencoding::encode(region)));
        }

        debug!(query = %request.query, "Sending DuckDuckGo search");
        let body: Value = http::send_json(NAME, self.client.get(&url)).await?;
        Ok(parse_duckduckgo_response(&body, request.topic, request.max_results))
    }
}

/// Extract up to `max_results` sources from an instant-answer body.
pub fn parse_duckduckgo_response(body: &Value, topic: Topic, max_results: usize) -> Vec<Source> {
    let mut results = Vec::new();

    // Main answer
    if let Some(abstract_text) = body.get("AbstractText").and_then(|v| v.as_str()) {
        let url = body.get("AbstractURL").and_then(|v| v.as_str()).unwrap_or("");
        if !abstract_text.is_empty() && !url.is_empty() {
            let heading = body
                .get("Heading")
                .and_then(|v| v.as_str())
                .filter(|h| !h.is_empty())
                .or_else(|| body.get("AbstractSource").and_then(|v| v.as_str()))
                .unwrap_or(url);
            results.push(Source::new(heading, url, topic, abstract_text));
        }
    }

    if let Some(items) = body.get("Results").and_then(|v| v.as_array()) {
        collect_topics(items, topic, &mut results);
    }
    if let Some(items) = body.get("RelatedTopics").and_then(|v| v.as_array()) {
        collect_topics(items, topic, &mut results);
    }

    results.truncate(max_results);
    results
}

fn collect_topics(items: &[Value], topic: Topic, out: &mut Vec<Source>) {
    for item in items {
        // Grouped topics nest their entries one level down.
        if let Some(nested) = item.get("Topics").and_then(|v| v.as_array()) {
            collect_topics(nested, topic, out);
            continue;
        }
        let text = item.get("Text").and_then(|v| v.as_str()).unwrap_or("");
        let url = item.get("FirstURL").and_then(|v| v.as_str()).unwrap_or("");
        if text.is_empty() || url.is_empty() {
            continue;
        }
        let title = text.split(" - ").next().unwrap_or(text);
        out.push(Source::new(title, url, topic, text));
    }
}
