//! Research orchestrator: fan out topic branches, join, summarize,
//! aggregate.

use super::branch::{BranchContext, BranchTask, Supplementary, run_task};
use super::callback::{NoOpResearchCallback, ResearchCallback, ResearchPhase};
use super::dedup::KeyPointDeduplicator;
use super::inclusion::InclusionPolicy;
use super::report::{ReportResponse, build_report};
use super::request::ResearchRequest;
use super::state::RunState;
use super::summarize::summarize_key_points;
use crate::breaker::Breaker;
use crate::config::ScoutConfig;
use crate::error::{LlmError, Result};
use crate::llm::{LlmProvider, PromptGenerator};
use crate::provider::{GuardedProvider, ProviderSet};
use crate::types::Topic;
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Runs the multi-branch research pipeline.
///
/// Holds no per-run state; concurrent calls to [`research`](Self::research)
/// each get their own [`RunState`]. Breakers inside the generator and
/// providers are shared across runs.
pub struct ResearchOrchestrator {
    config: ScoutConfig,
    generator: Arc<PromptGenerator>,
    providers: ProviderSet,
    callback: Arc<dyn ResearchCallback>,
}

impl ResearchOrchestrator {
    pub fn new(config: ScoutConfig, generator: Arc<PromptGenerator>, providers: ProviderSet) -> Self {
        Self {
            config,
            generator,
            providers,
            callback: Arc::new(NoOpResearchCallback),
        }
    }

    /// Build the prompt generator and its LLM breaker from `config`.
    pub fn with_llm(
        config: ScoutConfig,
        llm: Arc<dyn LlmProvider>,
        providers: ProviderSet,
    ) -> std::result::Result<Self, LlmError> {
        let breaker = Arc::new(Breaker::from_settings("llm", &config.breaker.llm));
        let generator = PromptGenerator::new(llm, breaker, &config.llm)?;
        Ok(Self::new(config, Arc::new(generator), providers))
    }

    pub fn with_callback(mut self, callback: Arc<dyn ResearchCallback>) -> Self {
        self.callback = callback;
        self
    }

    pub fn config(&self) -> &ScoutConfig {
        &self.config
    }

    pub fn providers(&self) -> &ProviderSet {
        &self.providers
    }

    /// Topic branches for a run, each paired with the provider it uses.
    pub fn branch_plan(&self) -> Vec<(Topic, &GuardedProvider)> {
        let primary = self.providers.primary.as_ref();
        let mut plan = vec![
            (Topic::News, primary),
            (Topic::Professional, primary),
            (Topic::Regulatory, primary),
        ];
        if self.config.search.enable_academic {
            if let Some(ref academic) = self.providers.academic {
                plan.push((Topic::Academic, academic.as_ref()));
            }
        }
        plan
    }

    /// Research `request` end to end.
    ///
    /// Only request validation errors are returned; every dependency
    /// failure degrades into the report.
    pub async fn research(&self, request: &ResearchRequest) -> Result<ReportResponse> {
        request.validate()?;

        let run_id = Uuid::new_v4();
        let plan = self.branch_plan();
        let topics: Vec<Topic> = plan.iter().map(|(topic, _)| *topic).collect();
        let supplementary = self
            .supplementary()
            .filter(|s| s.admits(request, &topics));

        let mut tasks: Vec<BranchTask<'_>> = plan
            .into_iter()
            .map(|(topic, provider)| BranchTask::Topic { topic, provider })
            .collect();
        if let Some(ref supplementary) = supplementary {
            tasks.push(BranchTask::Supplementary(supplementary));
        }
        info!(
            run_id = %run_id,
            subject = %request.subject,
            branches = topics.len(),
            supplementary = supplementary.is_some(),
            "Starting research run"
        );
        self.enter(ResearchPhase::Searching);

        let ctx = self.branch_context();
        let mut branches: FuturesUnordered<_> = tasks
            .into_iter()
            .map(|task| run_task(&ctx, task, request))
            .collect();

        let mut state = RunState::new();
        while let Some(outcome) = branches.next().await {
            self.callback.on_branch_complete(
                outcome.topic,
                outcome.sources.len(),
                outcome.search_failed,
            );
            state.merge(outcome);
        }
        drop(branches);

        self.enter(ResearchPhase::Summarizing);
        let key_points = std::mem::take(&mut state.key_points);
        let before = key_points.len();
        let deduplicator = KeyPointDeduplicator::new(
            self.config.research.similarity_threshold,
            self.config.research.max_key_points,
        );
        let focus = request.focus();
        let summary = summarize_key_points(
            &self.generator,
            &deduplicator,
            &request.subject,
            focus.as_deref(),
            key_points,
        )
        .await;
        self.callback
            .on_key_points_merged(before, summary.key_points.len());

        self.enter(ResearchPhase::Aggregating);
        let report = build_report(
            run_id,
            &request.subject,
            state,
            summary,
            self.config.research.review_shortlist,
        );

        info!(
            run_id = %run_id,
            sources = report.sources.len(),
            key_points = report.key_points.len(),
            search_failed = report.search_failed,
            tokens = report.usage.total_tokens,
            cost = report.usage.total_cost,
            "Research run complete"
        );
        self.enter(ResearchPhase::Complete);
        Ok(report)
    }

    fn branch_context(&self) -> BranchContext {
        BranchContext {
            generator: Arc::clone(&self.generator),
            research: self.config.research.clone(),
        }
    }

    fn supplementary(&self) -> Option<Supplementary> {
        self.providers.supplementary.as_ref().map(|provider| Supplementary {
            provider: Arc::clone(provider),
            policy: InclusionPolicy::new(&self.config.search.supplementary),
            max_results: self.config.search.supplementary.max_results,
        })
    }

    fn enter(&self, phase: ResearchPhase) {
        self.callback.on_phase_change(phase, phase.progress());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmProvider;
    use crate::provider::MockSearchProvider;
    use std::time::Duration;

    fn guarded(name: &str) -> GuardedProvider {
        GuardedProvider::new(
            Arc::new(MockSearchProvider::returning(name, Vec::new())),
            Arc::new(Breaker::new(format!("search:{name}"), 3, Duration::from_secs(30))),
            Duration::from_secs(5),
        )
    }

    fn orchestrator(config: ScoutConfig, providers: ProviderSet) -> ResearchOrchestrator {
        ResearchOrchestrator::with_llm(config, Arc::new(MockLlmProvider::new()), providers).unwrap()
    }

    #[test]
    fn test_branch_plan_without_academic() {
        let orchestrator = orchestrator(
            ScoutConfig::default(),
            ProviderSet::new(guarded("web")).with_academic(guarded("scholar")),
        );
        let topics: Vec<_> = orchestrator.branch_plan().into_iter().map(|(t, _)| t).collect();
        assert_eq!(topics, vec![Topic::News, Topic::Professional, Topic::Regulatory]);
    }

    #[test]
    fn test_branch_plan_with_academic() {
        let mut config = ScoutConfig::default();
        config.search.enable_academic = true;
        let orchestrator = orchestrator(
            config,
            ProviderSet::new(guarded("web")).with_academic(guarded("scholar")),
        );
        let plan = orchestrator.branch_plan();
        assert_eq!(plan.len(), 4);
        assert_eq!(plan[3].0, Topic::Academic);
        assert_eq!(plan[3].1.name(), "scholar");
    }

    #[tokio::test]
    async fn test_validation_error_is_surfaced() {
        let orchestrator = orchestrator(ScoutConfig::default(), ProviderSet::new(guarded("web")));
        let err = orchestrator
            .research(&ResearchRequest::new(""))
            .await
            .unwrap_err();
        assert!(matches!(err, crate::error::ScoutError::Validation(_)));
    }
}
