//! Progress reporting for research runs.

use crate::types::Topic;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Phase of a research run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResearchPhase {
    Searching,
    Summarizing,
    Aggregating,
    Complete,
}

impl ResearchPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResearchPhase::Searching => "searching",
            ResearchPhase::Summarizing => "summarizing",
            ResearchPhase::Aggregating => "aggregating",
            ResearchPhase::Complete => "complete",
        }
    }

    /// Progress fraction reported when entering this phase.
    pub fn progress(&self) -> f32 {
        match self {
            ResearchPhase::Searching => 0.0,
            ResearchPhase::Summarizing => 0.6,
            ResearchPhase::Aggregating => 0.9,
            ResearchPhase::Complete => 1.0,
        }
    }
}

/// Callback for research progress events.
///
/// Callbacks run on the orchestrator's task and must not block.
pub trait ResearchCallback: Send + Sync {
    /// Called when the research phase changes.
    fn on_phase_change(&self, phase: ResearchPhase, progress: f32);
    /// Called when a topic branch has finished searching and extracting.
    fn on_branch_complete(&self, topic: Topic, sources_found: usize, search_failed: bool);
    /// Called after deduplication with the key point counts before and after.
    fn on_key_points_merged(&self, before: usize, after: usize);
}

/// No-op callback.
pub struct NoOpResearchCallback;

impl ResearchCallback for NoOpResearchCallback {
    fn on_phase_change(&self, _phase: ResearchPhase, _progress: f32) {}
    fn on_branch_complete(&self, _topic: Topic, _sources_found: usize, _search_failed: bool) {}
    fn on_key_points_merged(&self, _before: usize, _after: usize) {}
}

/// An event captured by [`RecordingCallback`].
#[derive(Debug, Clone, PartialEq)]
pub enum ResearchEvent {
    Phase(ResearchPhase),
    BranchComplete {
        topic: Topic,
        sources_found: usize,
        search_failed: bool,
    },
    KeyPointsMerged {
        before: usize,
        after: usize,
    },
}

/// Records every event in arrival order.
#[derive(Default)]
pub struct RecordingCallback {
    events: Mutex<Vec<ResearchEvent>>,
}

impl RecordingCallback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ResearchEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn phases(&self) -> Vec<ResearchPhase> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ResearchEvent::Phase(phase) => Some(phase),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: ResearchEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl ResearchCallback for RecordingCallback {
    fn on_phase_change(&self, phase: ResearchPhase, _progress: f32) {
        self.push(ResearchEvent::Phase(phase));
    }

    fn on_branch_complete(&self, topic: Topic, sources_found: usize, search_failed: bool) {
        self.push(ResearchEvent::BranchComplete {
            topic,
            sources_found,
            search_failed,
        });
    }

    fn on_key_points_merged(&self, before: usize, after: usize) {
        self.push(ResearchEvent::KeyPointsMerged { before, after });
    }
}
