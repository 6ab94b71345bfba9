//! Semantic Scholar paper search for the academic branch.
//!
//! Works without an API key at a reduced rate; unauthenticated clients are
//! throttled to one request per second.

use crate::http;
use async_trait::async_trait;
use riskscout_core::provider::SearchProvider;
use riskscout_core::{Citation, SearchError, SearchRequest, Source, Topic};
use serde::Deserialize;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

pub const NAME: &str = "semantic_scholar";
const SEMANTIC_SCHOLAR_API: &str = "https://api.semanticscholar.org/graph/v1";
const SEARCH_FIELDS: &str = "paperId,title,url,abstract,year,venue,publicationDate,authors,tldr";
const MIN_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Deserialize)]
struct PaperSearchResponse {
    #[serde(default)]
    data: Vec<Paper>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Paper {
    paper_id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(rename = "abstract", default)]
    abstract_text: Option<String>,
    #[serde(default)]
    year: Option<u32>,
    #[serde(default)]
    venue: Option<String>,
    #[serde(default)]
    publication_date: Option<String>,
    #[serde(default)]
    authors: Vec<Author>,
    #[serde(default)]
    tldr: Option<Tldr>,
}

#[derive(Debug, Deserialize)]
struct Author {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Tldr {
    #[serde(default)]
    text: Option<String>,
}

pub struct SemanticScholarProvider {
    client: reqwest::Client,
    api_key: Option<String>,
    last_request: Mutex<Option<Instant>>,
}

impl SemanticScholarProvider {
    pub fn new(api_key_env: &str, timeout: Duration) -> Result<Self, SearchError> {
        Ok(Self {
            client: http::client(NAME, timeout)?,
            api_key: http::api_key_from_env(api_key_env),
            last_request: Mutex::new(None),
        })
    }

    /// Enforce a minimum delay between unauthenticated requests.
    async fn rate_limit(&self) {
        if self.api_key.is_some() {
            return;
        }
        let wait = {
            let mut last = self
                .last_request
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let now = Instant::now();
            let next = match *last {
                Some(prev) if now < prev + MIN_INTERVAL => prev + MIN_INTERVAL,
                _ => now,
            };
            *last = Some(next);
            next.saturating_duration_since(now)
        };
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
    }
}

#[async_trait]
impl SearchProvider for SemanticScholarProvider {
    fn name(&self) -> &str {
        NAME
    }

    /// Keyword search matches titles and abstracts; generic topic phrasing
    /// only dilutes it.
    fn shape_query(&self, query: &str, topic: Topic) -> String {
        crate::strip_topic_terms(query, topic)
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<Source>, SearchError> {
        self.rate_limit().await;

        let url = format!(
            "{}/paper/search?query={}&limit={}&fields={}",
            SEMANTIC_SCHOLAR_API,
            urlencoding::encode(&request.query),
            request.max_results,
            SEARCH_FIELDS
        );

        let mut builder = self.client.get(&url);
        if let Some(ref key) = self.api_key {
            builder = builder.header("x-api-key", key);
        }

        debug!(query = %request.query, "Sending Semantic Scholar search");
        let response: PaperSearchResponse = http::send_json(NAME, builder).await?;
        Ok(convert_papers(response, request.topic))
    }
}

fn convert_papers(response: PaperSearchResponse, topic: Topic) -> Vec<Source> {
    response
        .data
        .into_iter()
        .filter_map(|paper| {
            let title = paper.title.filter(|t| !t.trim().is_empty())?;
            let url = paper
                .url
                .filter(|u| !u.is_empty())
                .unwrap_or_else(|| format!("https://www.semanticscholar.org/paper/{}", paper.paper_id));
            let content = paper
                .abstract_text
                .filter(|a| !a.is_empty())
                .or_else(|| paper.tldr.and_then(|t| t.text))
                .unwrap_or_default();
            let date = paper
                .publication_date
                .or_else(|| paper.year.map(|y| y.to_string()));
            let citation = Citation {
                authors: paper.authors.into_iter().filter_map(|a| a.name).collect(),
                venue: paper.venue.filter(|v| !v.is_empty()),
                date: date.clone(),
            };

            let mut source = Source::new(title, url, topic, content).with_citation(citation);
            source.date = date;
            Some(source)
        })
        .collect()
}

/// Parse a raw `/paper/search` body.
pub fn parse_semantic_scholar_response(
    body: &str,
    topic: Topic,
) -> Result<Vec<Source>, SearchError> {
    let response: PaperSearchResponse =
        serde_json::from_str(body).map_err(|e| SearchError::Parse {
            provider: NAME.to_string(),
            message: e.to_string(),
        })?;
    Ok(convert_papers(response, topic))
}
