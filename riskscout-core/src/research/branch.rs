//! Branch tasks of a run: one per topic, plus at most one supplementary
//! search shared by the whole run. Each searches, then extracts key points
//! from every distinct source.

use super::inclusion::InclusionPolicy;
use super::request::ResearchRequest;
use super::state::{BranchOutcome, SourceSet};
use crate::config::ResearchConfig;
use crate::llm::{PromptGenerator, PromptId};
use crate::provider::GuardedProvider;
use crate::types::{KeyPoint, SearchRequest, SearchResponse, Source, Topic, UsageRecord};
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Default, Deserialize)]
struct ExtractedPoints {
    #[serde(default)]
    key_points: Vec<String>,
}

/// The supplementary provider and the policy that gates it.
pub struct Supplementary {
    pub provider: Arc<GuardedProvider>,
    pub policy: InclusionPolicy,
    pub max_results: usize,
}

impl Supplementary {
    /// Whether any of the run's topic queries admits the supplementary
    /// provider.
    pub fn admits(&self, request: &ResearchRequest, topics: &[Topic]) -> bool {
        topics
            .iter()
            .any(|&topic| self.policy.should_include(&build_query(request, topic), topic))
    }

    fn search_request(&self, request: &ResearchRequest) -> SearchRequest {
        SearchRequest::new(&request.subject, Topic::General, self.max_results)
            .with_region(request.region.clone())
    }
}

/// Shared, read-only context for every branch of a run.
pub struct BranchContext {
    pub generator: Arc<PromptGenerator>,
    pub research: ResearchConfig,
}

/// One concurrent unit of a run.
pub enum BranchTask<'a> {
    /// Topic-scoped search against a primary or academic provider.
    Topic {
        topic: Topic,
        provider: &'a GuardedProvider,
    },
    /// The run's single supplementary search.
    Supplementary(&'a Supplementary),
}

/// Query text for `topic`: the subject, any focus keywords, then the
/// topic's own terms.
pub fn build_query(request: &ResearchRequest, topic: Topic) -> String {
    let mut parts = vec![request.subject.trim().to_string()];
    parts.extend(request.focus_keywords.iter().map(|k| k.trim().to_string()));
    let terms = topic.query_terms();
    if !terms.is_empty() {
        parts.push(terms.to_string());
    }
    parts.join(" ")
}

/// Run one task to completion.
pub async fn run_task(
    ctx: &BranchContext,
    task: BranchTask<'_>,
    request: &ResearchRequest,
) -> BranchOutcome {
    match task {
        BranchTask::Topic { topic, provider } => run_branch(ctx, provider, topic, request).await,
        BranchTask::Supplementary(supplementary) => {
            run_supplementary(ctx, supplementary, request).await
        }
    }
}

/// Run one topic branch to completion. Never fails: provider and
/// extraction errors are folded into the outcome.
pub async fn run_branch(
    ctx: &BranchContext,
    provider: &GuardedProvider,
    topic: Topic,
    request: &ResearchRequest,
) -> BranchOutcome {
    let mut outcome = BranchOutcome::new(topic);
    let query = build_query(request, topic);
    let search_request =
        SearchRequest::new(&query, topic, request.max_results).with_region(request.region.clone());

    let response = provider.search(&search_request).await;
    if response.is_failure() {
        outcome.search_failed = true;
        outcome.errors.push(describe_failure(topic, &response));
    }
    outcome.sources = distinct(response.results);

    extract_all(ctx, request, &mut outcome).await;
    outcome
}

/// Run the supplementary search once for the whole run. A failure is
/// recorded as an error but never marks the run's search as failed.
pub async fn run_supplementary(
    ctx: &BranchContext,
    supplementary: &Supplementary,
    request: &ResearchRequest,
) -> BranchOutcome {
    let mut outcome = BranchOutcome::new(Topic::General);
    let response = supplementary
        .provider
        .search(&supplementary.search_request(request))
        .await;

    if response.is_failure() {
        warn!(
            provider = %response.provider,
            error = response.error_message.as_deref().unwrap_or_default(),
            "Supplementary search failed"
        );
        outcome.errors.push(describe_failure(Topic::General, &response));
    }
    outcome.sources = distinct(response.results);

    extract_all(ctx, request, &mut outcome).await;
    outcome
}

/// Drop repeated urls so no source is extracted twice.
fn distinct(sources: Vec<Source>) -> Vec<Source> {
    let mut set = SourceSet::new();
    set.extend(sources);
    set.into_vec()
}

async fn extract_all(ctx: &BranchContext, request: &ResearchRequest, outcome: &mut BranchOutcome) {
    let topic = outcome.topic;
    debug!(topic = %topic, sources = outcome.sources.len(), "Branch search complete");

    let extractions: Vec<(Vec<KeyPoint>, UsageRecord)> = stream::iter(outcome.sources.iter())
        .map(|source| extract(ctx, request, source))
        .buffer_unordered(ctx.research.extraction_concurrency.max(1))
        .collect()
        .await;

    for (points, usage) in extractions {
        if let Some(ref error) = usage.error {
            outcome.errors.push(format!("{topic} extraction: {error}"));
        }
        outcome.key_points.extend(points);
        outcome.usage.push(usage);
    }

    info!(
        topic = %topic,
        sources = outcome.sources.len(),
        key_points = outcome.key_points.len(),
        search_failed = outcome.search_failed,
        "Branch complete"
    );
}

async fn extract(
    ctx: &BranchContext,
    request: &ResearchRequest,
    source: &Source,
) -> (Vec<KeyPoint>, UsageRecord) {
    let inputs = json!({
        "subject": request.subject,
        "topic": source.topic.as_str(),
        "title": source.title,
        "url": source.url,
        "date": source.date,
        "content": truncate_chars(&source.content, ctx.research.max_content_chars),
    });

    let generation = ctx
        .generator
        .generate_or(PromptId::ExtractKeyPoints, &inputs, |_| {
            ExtractedPoints::default()
        })
        .await;

    let points = generation
        .value
        .key_points
        .into_iter()
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .map(|text| KeyPoint::new(text, source.topic).attach(source))
        .collect();
    (points, generation.usage)
}

fn describe_failure(topic: Topic, response: &SearchResponse) -> String {
    format!(
        "{topic} search via {}: {}",
        response.provider,
        response.error_message.as_deref().unwrap_or("unknown error")
    )
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
