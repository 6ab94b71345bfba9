//! Wikipedia full-text search, used as the supplementary encyclopedia.

use crate::http;
use async_trait::async_trait;
use regex::Regex;
use riskscout_core::provider::SearchProvider;
use riskscout_core::{SearchError, SearchRequest, Source, Topic};
use serde::Deserialize;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::debug;

pub const NAME: &str = "wikipedia";

const LANGUAGES: &[&str] = &[
    "en", "de", "fr", "es", "it", "nl", "pt", "pl", "sv", "ja", "zh", "ru",
];

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));

#[derive(Debug, Deserialize)]
struct WikiResponse {
    #[serde(default)]
    query: Option<WikiQuery>,
}

#[derive(Debug, Deserialize)]
struct WikiQuery {
    #[serde(default)]
    search: Vec<WikiHit>,
}

#[derive(Debug, Deserialize)]
struct WikiHit {
    title: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    timestamp: Option<String>,
}

pub struct WikipediaProvider {
    client: reqwest::Client,
}

impl WikipediaProvider {
    pub fn new(timeout: Duration) -> Result<Self, SearchError> {
        Ok(Self {
            client: http::client(NAME, timeout)?,
        })
    }
}

#[async_trait]
impl SearchProvider for WikipediaProvider {
    fn name(&self) -> &str {
        NAME
    }

    /// Encyclopedia lookups work on the entity, not the topic phrasing.
    fn shape_query(&self, query: &str, topic: Topic) -> String {
        crate::strip_topic_terms(query, topic)
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<Source>, SearchError> {
        let lang = language_for_region(request.region.as_deref());
        let url = format!(
            "https://{}.wikipedia.org/w/api.php?action=query&list=search&srsearch={}&srlimit={}&format=json&utf8=1",
            lang,
            urlencoding::encode(&request.query),
            request.max_results
        );

        debug!(query = %request.query, lang, "Sending Wikipedia search");
        let response: WikiResponse = http::send_json(NAME, self.client.get(&url)).await?;
        Ok(convert_hits(response, lang, request.topic))
    }
}

/// Pick a Wikipedia language edition from a region hint such as `de`,
/// `fr-fr`, or `us-en`. Defaults to English.
pub fn language_for_region(region: Option<&str>) -> &'static str {
    let Some(region) = region else {
        return "en";
    };
    let region = region.to_lowercase();
    region
        .split(['-', '_'])
        .find_map(|part| LANGUAGES.iter().find(|lang| **lang == part).copied())
        .unwrap_or("en")
}

fn convert_hits(response: WikiResponse, lang: &str, topic: Topic) -> Vec<Source> {
    response
        .query
        .map(|q| q.search)
        .unwrap_or_default()
        .into_iter()
        .map(|hit| {
            let url = format!(
                "https://{}.wikipedia.org/wiki/{}",
                lang,
                urlencoding::encode(&hit.title.replace(' ', "_"))
            );
            let mut source = Source::new(&hit.title, url, topic, strip_html(&hit.snippet));
            source.date = hit.timestamp;
            source
        })
        .collect()
}

/// Parse a raw MediaWiki `list=search` body.
pub fn parse_wikipedia_response(
    body: &str,
    lang: &str,
    topic: Topic,
) -> Result<Vec<Source>, SearchError> {
    let response: WikiResponse = serde_json::from_str(body).map_err(|e| SearchError::Parse {
        provider: NAME.to_string(),
        message: e.to_string(),
    })?;
    Ok(convert_hits(response, lang, topic))
}

/// Remove markup from a search snippet and decode common entities.
pub fn strip_html(snippet: &str) -> String {
    TAG.replace_all(snippet, "")
        .replace("&quot;", "\"")
        .replace("&#039;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}
