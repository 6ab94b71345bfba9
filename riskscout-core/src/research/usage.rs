//! Usage aggregation across every LLM-backed call in a run.

use crate::types::UsageRecord;
use serde::{Deserialize, Serialize};

/// Totals attached to every report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageSummary {
    pub total_tokens: usize,
    pub total_cost: f64,
    /// Model of the last record in call order that named one.
    pub model_name: String,
    /// Number of calls that recorded an error.
    #[serde(default)]
    pub failed_calls: usize,
}

/// Sum tokens and cost over `records`, in call order.
pub fn aggregate_usage(records: &[UsageRecord]) -> UsageSummary {
    records.iter().fold(UsageSummary::default(), |mut acc, record| {
        acc.total_tokens += record.tokens;
        acc.total_cost += record.cost;
        if !record.model.is_empty() {
            acc.model_name = record.model.clone();
        }
        if record.error.is_some() {
            acc.failed_calls += 1;
        }
        acc
    })
}
