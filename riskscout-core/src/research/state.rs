//! Per-run accumulation.
//!
//! Each branch builds its own [`BranchOutcome`]; the orchestrator folds the
//! outcomes into a [`RunState`] only after every branch has finished.

use crate::types::{KeyPoint, Source, Topic, UsageRecord};
use std::collections::HashSet;

/// Sources keyed by normalized url, in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct SourceSet {
    seen: HashSet<String>,
    sources: Vec<Source>,
}

impl SourceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `source` unless its url is already present. Returns whether it
    /// was added.
    pub fn insert(&mut self, source: Source) -> bool {
        if self.seen.insert(source.dedup_key()) {
            self.sources.push(source);
            true
        } else {
            false
        }
    }

    pub fn extend(&mut self, sources: impl IntoIterator<Item = Source>) {
        for source in sources {
            self.insert(source);
        }
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn as_slice(&self) -> &[Source] {
        &self.sources
    }

    pub fn into_vec(self) -> Vec<Source> {
        self.sources
    }
}

/// Everything one topic branch produced.
#[derive(Debug, Clone)]
pub struct BranchOutcome {
    pub topic: Topic,
    pub sources: Vec<Source>,
    pub key_points: Vec<KeyPoint>,
    pub usage: Vec<UsageRecord>,
    /// The primary provider call for this branch failed.
    pub search_failed: bool,
    /// Errors that degraded this branch, for the report.
    pub errors: Vec<String>,
}

impl BranchOutcome {
    pub fn new(topic: Topic) -> Self {
        Self {
            topic,
            sources: Vec::new(),
            key_points: Vec::new(),
            usage: Vec::new(),
            search_failed: false,
            errors: Vec::new(),
        }
    }
}

/// Accumulated state of one research invocation. Never shared between
/// invocations.
#[derive(Debug, Default)]
pub struct RunState {
    pub sources: SourceSet,
    pub key_points: Vec<KeyPoint>,
    pub usage: Vec<UsageRecord>,
    /// OR of every branch's failure flag. Never reset within a run.
    pub search_failed: bool,
    pub errors: Vec<String>,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a finished branch into the run by concatenation.
    pub fn merge(&mut self, outcome: BranchOutcome) {
        self.sources.extend(outcome.sources);
        self.key_points.extend(outcome.key_points);
        self.usage.extend(outcome.usage);
        self.search_failed |= outcome.search_failed;
        self.errors.extend(outcome.errors);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(url: &str) -> Source {
        Source::new("t", url, Topic::News, "c")
    }

    #[test]
    fn test_source_set_dedups_by_normalized_url() {
        let mut set = SourceSet::new();
        // N = 3 variants of one url, M = 2 distinct urls.
        set.extend([
            source("https://a.io/report"),
            source("https://A.io/report/"),
            source("https://b.io"),
            source("  https://a.io/REPORT"),
            source("https://c.io"),
        ]);
        assert_eq!(set.len(), 3);
        assert_eq!(set.as_slice()[0].url, "https://a.io/report");
    }

    #[test]
    fn test_search_failed_is_monotonic() {
        let mut state = RunState::new();
        let mut failed = BranchOutcome::new(Topic::Regulatory);
        failed.search_failed = true;
        let mut ok = BranchOutcome::new(Topic::News);
        ok.sources.push(source("https://a.io"));

        state.merge(failed);
        state.merge(ok);
        assert!(state.search_failed);
        assert_eq!(state.sources.len(), 1);
    }

    #[test]
    fn test_merge_concatenates_in_order() {
        let mut state = RunState::new();
        let mut a = BranchOutcome::new(Topic::News);
        a.key_points.push(KeyPoint::new("first", Topic::News));
        a.usage.push(UsageRecord::new("extract_key_points", "m", 1, 0.0));
        let mut b = BranchOutcome::new(Topic::Professional);
        b.key_points.push(KeyPoint::new("second", Topic::Professional));

        state.merge(a);
        state.merge(b);
        let contents: Vec<_> = state.key_points.iter().map(|k| k.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second"]);
        assert_eq!(state.usage.len(), 1);
    }
}
