//! External-context research pipeline.
//!
//! A run moves through four steps:
//! 1. **Fan out** topic branches (news, professional, regulatory, and
//!    optionally academic), plus one supplementary search when any topic
//!    query admits it. Each searches, then extracts key points from every
//!    distinct source it found.
//! 2. **Join** once every branch has finished, folding outcomes into one
//!    run state.
//! 3. **Summarize**: deduplicate key points and synthesize a narrative.
//! 4. **Aggregate** into a [`ReportResponse`] with usage totals.

pub mod branch;
pub mod callback;
pub mod dedup;
pub mod inclusion;
pub mod orchestrator;
pub mod report;
pub mod request;
pub mod state;
pub mod summarize;
pub mod usage;

pub use callback::{
    NoOpResearchCallback, RecordingCallback, ResearchCallback, ResearchEvent, ResearchPhase,
};
pub use dedup::{KeyPointDeduplicator, similarity};
pub use inclusion::InclusionPolicy;
pub use orchestrator::ResearchOrchestrator;
pub use report::{NO_EXTERNAL_DATA, NO_KEY_POINTS, NO_RECENT_INFORMATION, ReportResponse, rank_sources};
pub use request::ResearchRequest;
pub use state::{BranchOutcome, RunState, SourceSet};
pub use summarize::{Reference, SYNTHESIS_UNAVAILABLE, Synthesis};
pub use usage::{UsageSummary, aggregate_usage};
