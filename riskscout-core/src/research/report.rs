//! Aggregate step: turn the run state and synthesis into the final report.

use super::state::RunState;
use super::summarize::{Reference, Summary};
use super::usage::{UsageSummary, aggregate_usage};
use crate::types::{KeyPoint, Source};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use uuid::Uuid;

/// Summary when nothing was collected and a provider failed.
pub const NO_EXTERNAL_DATA: &str =
    "No external data retrieved due to network or dependency restrictions.";

/// Summary when nothing was collected and every provider answered.
pub const NO_RECENT_INFORMATION: &str = "No recent relevant information found.";

/// Narrative used when sources were found but yielded no key points.
pub const NO_KEY_POINTS: &str =
    "No key points could be extracted from the collected sources.";

/// The aggregated research report. Every field is always present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportResponse {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub subject: String,
    pub summary: String,
    /// Narrative plus reference list. `None` when no sources were collected.
    pub full_report: Option<String>,
    pub key_risks: Vec<String>,
    pub insights: Vec<String>,
    /// Highest-scored sources, recommended for manual review.
    pub recommended_sources: Vec<Source>,
    pub sources: Vec<Source>,
    pub key_points: Vec<KeyPoint>,
    pub references: Vec<Reference>,
    /// At least one primary provider call failed.
    pub search_failed: bool,
    /// Sources were collected but some step degraded along the way.
    pub partial_failure: bool,
    pub errors: Vec<String>,
    pub usage: UsageSummary,
}

impl ReportResponse {
    pub fn has_sources(&self) -> bool {
        !self.sources.is_empty()
    }
}

/// Top `n` sources by score, descending. Equal scores keep their original
/// order; non-finite scores rank last.
pub fn rank_sources(sources: &[Source], n: usize) -> Vec<Source> {
    let mut ranked: Vec<&Source> = sources.iter().collect();
    ranked.sort_by(|a, b| rank_key(b).total_cmp(&rank_key(a)));
    ranked.into_iter().take(n).cloned().collect()
}

fn rank_key(source: &Source) -> f64 {
    if source.score.is_finite() {
        source.score
    } else {
        f64::NEG_INFINITY
    }
}

/// Build the final report from a finished run.
pub fn build_report(
    run_id: Uuid,
    subject: &str,
    mut state: RunState,
    summary: Summary,
    review_shortlist: usize,
) -> ReportResponse {
    if let Some(usage) = summary.usage {
        state.usage.push(usage);
    }
    let usage = aggregate_usage(&state.usage);
    let sources = state.sources.into_vec();

    if sources.is_empty() {
        let summary_text = if state.search_failed {
            NO_EXTERNAL_DATA
        } else {
            NO_RECENT_INFORMATION
        };
        return ReportResponse {
            run_id,
            generated_at: Utc::now(),
            subject: subject.to_string(),
            summary: summary_text.to_string(),
            full_report: None,
            key_risks: Vec::new(),
            insights: Vec::new(),
            recommended_sources: Vec::new(),
            sources,
            key_points: Vec::new(),
            references: Vec::new(),
            search_failed: state.search_failed,
            partial_failure: false,
            errors: state.errors,
            usage,
        };
    }

    let (narrative, key_risks, insights, mut references, synthesis_error) = match summary.synthesis {
        Some(s) => (s.narrative, s.key_risks, s.insights, s.references, s.error),
        None => (NO_KEY_POINTS.to_string(), Vec::new(), Vec::new(), Vec::new(), None),
    };
    if references.is_empty() {
        references = sources
            .iter()
            .map(|s| Reference {
                title: s.title.clone(),
                url: s.url.clone(),
            })
            .collect();
    }

    let mut errors = state.errors;
    if let Some(error) = synthesis_error {
        errors.push(format!("synthesis: {error}"));
    }

    ReportResponse {
        run_id,
        generated_at: Utc::now(),
        subject: subject.to_string(),
        summary: format!(
            "Collected {} distinct sources for {}.",
            sources.len(),
            subject
        ),
        full_report: Some(render_full_report(&narrative, &references)),
        key_risks,
        insights,
        recommended_sources: rank_sources(&sources, review_shortlist),
        sources,
        key_points: summary.key_points,
        references,
        search_failed: state.search_failed,
        partial_failure: !errors.is_empty(),
        errors,
        usage,
    }
}

/// Narrative followed by a numbered reference list.
pub fn render_full_report(narrative: &str, references: &[Reference]) -> String {
    let mut out = narrative.trim().to_string();
    if references.is_empty() {
        return out;
    }
    out.push_str("\n\nReferences:\n");
    for (i, reference) in references.iter().enumerate() {
        let title = if reference.title.trim().is_empty() {
            reference.url.as_str()
        } else {
            reference.title.as_str()
        };
        let _ = writeln!(out, "[{}] {} - {}", i + 1, title, reference.url);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::research::state::BranchOutcome;
    use crate::research::summarize::Synthesis;
    use crate::types::{Topic, UsageRecord};
    use pretty_assertions::assert_eq;

    fn scored(title: &str, score: f64) -> Source {
        Source::new(title, format!("https://{title}.io"), Topic::News, "c").with_score(score)
    }

    fn empty_summary() -> Summary {
        Summary {
            key_points: Vec::new(),
            synthesis: None,
            usage: None,
        }
    }

    #[test]
    fn test_rank_sources_is_stable() {
        let sources = vec![
            scored("a", 0.5),
            scored("b", 0.9),
            scored("c", 0.9),
            scored("d", 0.1),
        ];
        let titles: Vec<_> = rank_sources(&sources, 2)
            .into_iter()
            .map(|s| s.title)
            .collect();
        assert_eq!(titles, vec!["b", "c"]);
    }

    #[test]
    fn test_rank_sources_puts_non_finite_scores_last() {
        let mut nan = scored("nan", 0.0);
        nan.score = f64::NAN;
        let mut inf = scored("inf", 0.0);
        inf.score = f64::INFINITY;
        let sources = vec![nan, scored("low", 0.1), inf, scored("high", 0.8)];
        let titles: Vec<_> = rank_sources(&sources, 4)
            .into_iter()
            .map(|s| s.title)
            .collect();
        assert_eq!(titles, vec!["high", "low", "nan", "inf"]);
    }

    #[test]
    fn test_no_sources_with_failure_uses_restriction_sentinel() {
        let mut state = RunState::new();
        let mut outcome = BranchOutcome::new(Topic::News);
        outcome.search_failed = true;
        state.merge(outcome);

        let report = build_report(Uuid::new_v4(), "Acme", state, empty_summary(), 2);
        assert_eq!(report.summary, NO_EXTERNAL_DATA);
        assert!(report.full_report.is_none());
        assert_eq!(report.usage.total_tokens, 0);
        assert_eq!(report.usage.total_cost, 0.0);
    }

    #[test]
    fn test_no_sources_without_failure_uses_no_information_sentinel() {
        let report = build_report(Uuid::new_v4(), "Acme", RunState::new(), empty_summary(), 2);
        assert_eq!(report.summary, NO_RECENT_INFORMATION);
        assert!(report.key_risks.is_empty());
        assert!(!report.search_failed);
    }

    #[test]
    fn test_sources_present_builds_full_report() {
        let mut state = RunState::new();
        let mut outcome = BranchOutcome::new(Topic::News);
        outcome.sources = vec![scored("a", 0.2), scored("b", 0.7)];
        outcome
            .usage
            .push(UsageRecord::new("extract_key_points", "m1", 10, 0.01));
        state.merge(outcome);

        let summary = Summary {
            key_points: vec![KeyPoint::new("Fact", Topic::News).with_source_url("https://a.io")],
            synthesis: Some(Synthesis {
                narrative: "Acme faces strikes [1].".into(),
                key_risks: vec!["Strike".into()],
                insights: vec![],
                references: vec![Reference {
                    title: "a".into(),
                    url: "https://a.io".into(),
                }],
                error: None,
            }),
            usage: Some(UsageRecord::new("summarize_key_points", "m2", 5, 0.02)),
        };

        let report = build_report(Uuid::new_v4(), "Acme", state, summary, 1);
        assert_eq!(report.summary, "Collected 2 distinct sources for Acme.");
        assert_eq!(
            report.full_report.as_deref(),
            Some("Acme faces strikes [1].\n\nReferences:\n[1] a - https://a.io\n")
        );
        assert_eq!(report.recommended_sources[0].title, "b");
        assert_eq!(report.usage.total_tokens, 15);
        assert_eq!(report.usage.model_name, "m2");
        assert!(!report.partial_failure);
    }

    #[test]
    fn test_fallback_synthesis_marks_partial_failure() {
        let mut state = RunState::new();
        let mut outcome = BranchOutcome::new(Topic::News);
        outcome.sources = vec![scored("a", 0.2)];
        state.merge(outcome);

        let summary = Summary {
            key_points: vec![KeyPoint::new("Fact", Topic::News).with_source_url("https://a.io")],
            synthesis: Some(Synthesis::fallback("circuit open")),
            usage: Some(UsageRecord::failed("summarize_key_points", "circuit open")),
        };
        let report = build_report(Uuid::new_v4(), "Acme", state, summary, 2);
        assert!(report.partial_failure);
        assert_eq!(report.references.len(), 1);
        assert!(report.errors[0].contains("circuit open"));
    }
}
