//! End-to-end research runs against scripted LLM and search providers.

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use riskscout_core::llm::{CompletionRequest, CompletionResponse, Message, Role, TokenUsage};
use riskscout_core::research::{
    NO_EXTERNAL_DATA, NO_KEY_POINTS, NO_RECENT_INFORMATION, RecordingCallback, ResearchEvent,
    ResearchPhase,
};
use riskscout_core::{
    GuardedProvider, LlmError, LlmProvider, MockSearchProvider, ProviderSet, ResearchOrchestrator,
    ResearchRequest, ScoutConfig, ScoutError, SearchError, SearchProvider, SearchRequest, Source,
    Topic, ValidationError,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Answers extraction prompts with one fact per source and synthesis
/// prompts with a fixed narrative. Every call costs 10 tokens.
struct ScriptedLlm {
    /// When set, every extraction returns this same fact.
    shared_fact: Option<String>,
    fail: bool,
    calls: AtomicUsize,
}

impl ScriptedLlm {
    fn new() -> Self {
        Self {
            shared_fact: None,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    fn with_shared_fact(fact: &str) -> Self {
        Self {
            shared_fact: Some(fact.to_string()),
            ..Self::new()
        }
    }

    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(LlmError::Connection {
                message: "model endpoint unreachable".into(),
            });
        }

        let prompt = request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.clone())
            .unwrap_or_default();

        let text = match prompt.lines().find_map(|l| l.strip_prefix("Source url: ")) {
            Some(url) => {
                let fact = self
                    .shared_fact
                    .clone()
                    .unwrap_or_else(|| format!("Distinct finding reported by {url}"));
                serde_json::json!({ "key_points": [fact] }).to_string()
            }
            None => serde_json::json!({
                "narrative": "Acme faces elevated operational risk [1].",
                "key_risks": ["Port disruption"],
                "insights": ["Diversify carriers"],
                "references": [{ "title": "Report", "url": "https://news.io/a" }]
            })
            .to_string(),
        };

        Ok(CompletionResponse {
            message: Message::assistant(text),
            usage: TokenUsage {
                input_tokens: 8,
                output_tokens: 2,
            },
            model: "scripted-model".into(),
            finish_reason: Some("stop".into()),
        })
    }

    fn cost_per_token(&self) -> (f64, f64) {
        (0.001, 0.0)
    }

    fn model_name(&self) -> &str {
        "scripted-model"
    }
}

/// Fails the regulatory branch only; answers every other topic.
struct RegulatoryOutage;

#[async_trait]
impl SearchProvider for RegulatoryOutage {
    fn name(&self) -> &str {
        "partial"
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<Source>, SearchError> {
        if request.topic == Topic::Regulatory {
            return Err(SearchError::Status {
                provider: "partial".into(),
                status: 503,
            });
        }
        Ok(vec![Source::new(
            format!("{} result", request.topic),
            format!("https://{}.io/1", request.topic),
            request.topic,
            "Body text.",
        )])
    }
}

/// Returns one url shared by every branch (spelled differently each time)
/// plus one url unique to the branch.
struct OverlappingResults;

#[async_trait]
impl SearchProvider for OverlappingResults {
    fn name(&self) -> &str {
        "overlap"
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<Source>, SearchError> {
        let shared = match request.topic {
            Topic::News => "https://shared.io/report",
            Topic::Professional => "https://SHARED.io/report/",
            _ => " https://shared.io/Report",
        };
        Ok(vec![
            Source::new("Shared", shared, request.topic, "Shared body."),
            Source::new(
                "Own",
                format!("https://{}.io/own", request.topic),
                request.topic,
                "Own body.",
            ),
        ])
    }
}

/// Only the news branch gets results.
struct NewsOnly(Vec<Source>);

#[async_trait]
impl SearchProvider for NewsOnly {
    fn name(&self) -> &str {
        "news-only"
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<Source>, SearchError> {
        if request.topic == Topic::News {
            Ok(self.0.clone())
        } else {
            Ok(Vec::new())
        }
    }
}

fn config() -> ScoutConfig {
    let mut config = ScoutConfig::default();
    config.search.supplementary.enabled = false;
    config
}

fn providers(provider: Arc<dyn SearchProvider>, config: &ScoutConfig) -> ProviderSet {
    ProviderSet::new(GuardedProvider::from_config(provider, config))
}

fn orchestrator(llm: Arc<ScriptedLlm>, provider: Arc<dyn SearchProvider>) -> ResearchOrchestrator {
    let config = config();
    let providers = providers(provider, &config);
    ResearchOrchestrator::with_llm(config, llm, providers).unwrap()
}

#[tokio::test]
async fn test_all_providers_down_reports_no_external_data() {
    let llm = Arc::new(ScriptedLlm::new());
    let orchestrator = orchestrator(llm.clone(), Arc::new(MockSearchProvider::failing("web")));

    let report = orchestrator
        .research(&ResearchRequest::new("Acme Logistics"))
        .await
        .unwrap();

    assert_eq!(report.summary, NO_EXTERNAL_DATA);
    assert!(report.full_report.is_none());
    assert!(report.search_failed);
    assert!(report.key_risks.is_empty());
    assert!(report.insights.is_empty());
    assert_eq!(report.usage.total_tokens, 0);
    assert_eq!(report.usage.total_cost, 0.0);
    assert_eq!(report.errors.len(), 3);
    assert_eq!(llm.calls(), 0);
}

#[tokio::test]
async fn test_empty_results_report_no_recent_information() {
    let llm = Arc::new(ScriptedLlm::new());
    let orchestrator = orchestrator(llm, Arc::new(MockSearchProvider::returning("web", Vec::new())));

    let report = orchestrator
        .research(&ResearchRequest::new("Acme Logistics"))
        .await
        .unwrap();

    assert_eq!(report.summary, NO_RECENT_INFORMATION);
    assert!(report.full_report.is_none());
    assert!(!report.search_failed);
}

#[tokio::test]
async fn test_one_failed_branch_sets_search_failed() {
    let llm = Arc::new(ScriptedLlm::new());
    let callback = Arc::new(RecordingCallback::new());
    let orchestrator =
        orchestrator(llm, Arc::new(RegulatoryOutage)).with_callback(callback.clone());

    let report = orchestrator
        .research(&ResearchRequest::new("Acme Logistics"))
        .await
        .unwrap();

    assert!(report.search_failed);
    assert!(report.partial_failure);
    assert_eq!(report.sources.len(), 2);
    assert!(report.full_report.is_some());
    assert!(report.errors.iter().any(|e| e.contains("503")));

    let failed_branches: Vec<Topic> = callback
        .events()
        .into_iter()
        .filter_map(|e| match e {
            ResearchEvent::BranchComplete {
                topic,
                search_failed: true,
                ..
            } => Some(topic),
            _ => None,
        })
        .collect();
    assert_eq!(failed_branches, vec![Topic::Regulatory]);
}

#[tokio::test]
async fn test_sources_are_deduplicated_by_url_across_branches() {
    let llm = Arc::new(ScriptedLlm::new());
    let orchestrator = orchestrator(llm, Arc::new(OverlappingResults));

    let report = orchestrator
        .research(&ResearchRequest::new("Acme Logistics"))
        .await
        .unwrap();

    // Three spellings of one url plus three unique urls.
    assert_eq!(report.sources.len(), 4);
    let mut urls: Vec<String> = report.sources.iter().map(|s| s.dedup_key()).collect();
    urls.sort();
    urls.dedup();
    assert_eq!(urls.len(), 4);
    assert_eq!(report.summary, "Collected 4 distinct sources for Acme Logistics.");
}

#[tokio::test]
async fn test_review_shortlist_ranks_by_score_with_stable_ties() {
    let sources = ["a", "b", "c", "d"]
        .iter()
        .zip([0.5, 0.9, 0.9, 0.1])
        .map(|(name, score)| {
            Source::new(*name, format!("https://{name}.io"), Topic::News, "Body.").with_score(score)
        })
        .collect();
    let llm = Arc::new(ScriptedLlm::new());
    let orchestrator = orchestrator(llm, Arc::new(NewsOnly(sources)));

    let report = orchestrator
        .research(&ResearchRequest::new("Acme Logistics"))
        .await
        .unwrap();

    let shortlist: Vec<&str> = report
        .recommended_sources
        .iter()
        .map(|s| s.title.as_str())
        .collect();
    assert_eq!(shortlist, vec!["b", "c"]);
}

#[tokio::test]
async fn test_usage_totals_cover_every_llm_call() {
    let llm = Arc::new(ScriptedLlm::new());
    let orchestrator = orchestrator(llm.clone(), Arc::new(OverlappingResults));

    let report = orchestrator
        .research(&ResearchRequest::new("Acme Logistics"))
        .await
        .unwrap();

    // Six extraction calls (two sources per branch) plus one synthesis call.
    assert_eq!(llm.calls(), 7);
    assert_eq!(report.usage.total_tokens, 70);
    assert!((report.usage.total_cost - 7.0 * 0.008).abs() < 1e-9);
    assert_eq!(report.usage.model_name, "scripted-model");
    assert_eq!(report.key_risks, vec!["Port disruption"]);
    assert!(
        report
            .full_report
            .as_deref()
            .unwrap()
            .contains("[1] Report - https://news.io/a")
    );
}

#[tokio::test]
async fn test_identical_facts_merge_with_all_sources() {
    let llm = Arc::new(ScriptedLlm::with_shared_fact("Dock workers began a strike"));
    let callback = Arc::new(RecordingCallback::new());
    let orchestrator =
        orchestrator(llm, Arc::new(RegulatoryOutage)).with_callback(callback.clone());

    let report = orchestrator
        .research(&ResearchRequest::new("Acme Logistics"))
        .await
        .unwrap();

    assert_eq!(report.key_points.len(), 1);
    let mut sources = report.key_points[0].all_sources();
    sources.sort();
    assert_eq!(sources, vec!["https://news.io/1", "https://professional.io/1"]);
    assert!(
        callback
            .events()
            .contains(&ResearchEvent::KeyPointsMerged { before: 2, after: 1 })
    );
}

#[tokio::test]
async fn test_llm_outage_still_produces_report() {
    let llm = Arc::new(ScriptedLlm::failing());
    let orchestrator = orchestrator(llm, Arc::new(RegulatoryOutage));

    let report = orchestrator
        .research(&ResearchRequest::new("Acme Logistics"))
        .await
        .unwrap();

    assert_eq!(report.sources.len(), 2);
    assert!(report.key_points.is_empty());
    assert!(report.full_report.as_deref().unwrap().starts_with(NO_KEY_POINTS));
    assert_eq!(report.references.len(), 2);
    assert_eq!(report.usage.total_tokens, 0);
    assert_eq!(report.usage.failed_calls, 2);
    assert!(report.partial_failure);
}

#[tokio::test]
async fn test_phases_are_reported_in_order() {
    let callback = Arc::new(RecordingCallback::new());
    let orchestrator = orchestrator(Arc::new(ScriptedLlm::new()), Arc::new(OverlappingResults))
        .with_callback(callback.clone());

    orchestrator
        .research(&ResearchRequest::new("Acme Logistics"))
        .await
        .unwrap();

    assert_eq!(
        callback.phases(),
        vec![
            ResearchPhase::Searching,
            ResearchPhase::Summarizing,
            ResearchPhase::Aggregating,
            ResearchPhase::Complete,
        ]
    );
    let branches = callback
        .events()
        .iter()
        .filter(|e| matches!(e, ResearchEvent::BranchComplete { .. }))
        .count();
    assert_eq!(branches, 3);
}

#[tokio::test]
async fn test_supplementary_provider_runs_when_regulatory_qualifies() {
    let mut config = ScoutConfig::default();
    config.search.supplementary.default_include = false;
    let wiki = Arc::new(MockSearchProvider::returning(
        "wikipedia",
        vec![
            Source::new("Wiki 1", "https://wiki.io/1", Topic::General, "Background."),
            Source::new("Wiki 2", "https://wiki.io/2", Topic::General, "Background."),
            Source::new("Wiki 3", "https://wiki.io/3", Topic::General, "Background."),
        ],
    ));
    let providers = providers(Arc::new(MockSearchProvider::returning("web", Vec::new())), &config)
        .with_supplementary(GuardedProvider::from_config(wiki.clone(), &config));
    let orchestrator =
        ResearchOrchestrator::with_llm(config, Arc::new(ScriptedLlm::new()), providers).unwrap();

    let report = orchestrator
        .research(&ResearchRequest::new("Acme Logistics"))
        .await
        .unwrap();

    // Only the regulatory query qualifies; results are capped at 2.
    assert_eq!(wiki.call_count(), 1);
    assert_eq!(wiki.requests()[0].max_results, 2);
    assert_eq!(report.sources.len(), 2);
    assert!(report.sources.iter().all(|s| s.topic == Topic::General));
    assert!(!report.search_failed);
}

#[tokio::test]
async fn test_supplementary_search_runs_once_per_run() {
    let config = ScoutConfig::default();
    let wiki = Arc::new(MockSearchProvider::returning(
        "wikipedia",
        vec![
            Source::new("Wiki 1", "https://wiki.io/1", Topic::General, "Background."),
            Source::new("Wiki 2", "https://wiki.io/2", Topic::General, "Background."),
        ],
    ));
    let providers = providers(Arc::new(MockSearchProvider::returning("web", Vec::new())), &config)
        .with_supplementary(GuardedProvider::from_config(wiki.clone(), &config));
    let llm = Arc::new(ScriptedLlm::new());
    let callback = Arc::new(RecordingCallback::new());
    let orchestrator = ResearchOrchestrator::with_llm(config, llm.clone(), providers)
        .unwrap()
        .with_callback(callback.clone());

    let report = orchestrator
        .research(&ResearchRequest::new("Acme Logistics"))
        .await
        .unwrap();

    // Professional and regulatory both qualify, yet one search is issued.
    assert_eq!(wiki.call_count(), 1);
    assert_eq!(wiki.requests()[0].query, "Acme Logistics");
    assert_eq!(report.sources.len(), 2);
    // One extraction per distinct source plus the synthesis call.
    assert_eq!(llm.calls(), 3);
    assert_eq!(report.usage.total_tokens, 30);

    let general_branches = callback
        .events()
        .into_iter()
        .filter(|e| {
            matches!(
                e,
                ResearchEvent::BranchComplete {
                    topic: Topic::General,
                    ..
                }
            )
        })
        .count();
    assert_eq!(general_branches, 1);
}

#[tokio::test]
async fn test_invalid_request_is_rejected_before_any_call() {
    let llm = Arc::new(ScriptedLlm::new());
    let provider = Arc::new(MockSearchProvider::returning("web", Vec::new()));
    let orchestrator = orchestrator(llm.clone(), provider.clone());

    let err = orchestrator
        .research(&ResearchRequest::new("Acme").with_max_results(500))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ScoutError::Validation(ValidationError::MaxResultsOutOfRange { value: 500, .. })
    ));
    assert_eq!(provider.call_count(), 0);
    assert_eq!(llm.calls(), 0);
}
