//! Key-point deduplication.
//!
//! Two passes, in this order:
//! 1. **Exact**: key points with identical content collapse onto the first
//!    occurrence, which collects every distinct source url of the group.
//! 2. **Fuzzy**: pairs whose similarity ratio reaches the threshold merge;
//!    the longer content survives and source attribution is unioned.
//!
//! The fuzzy pass repeats until no pair is at or above the threshold, so
//! the output is a fixed point: deduplicating it again changes nothing.

use crate::types::KeyPoint;
use similar::TextDiff;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Similarity ratio in `0.0..=1.0` of two strings, computed over matching
/// character blocks (`2 * matches / total_len`).
pub fn similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    f64::from(TextDiff::from_chars(a, b).ratio())
}

/// Collapses redundant key points into a minimal, well-cited set.
#[derive(Debug, Clone)]
pub struct KeyPointDeduplicator {
    threshold: f64,
    max_key_points: usize,
}

impl KeyPointDeduplicator {
    pub fn new(threshold: f64, max_key_points: usize) -> Self {
        Self {
            threshold,
            max_key_points: max_key_points.max(1),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Run both passes over `key_points`.
    pub fn deduplicate(&self, key_points: Vec<KeyPoint>) -> Vec<KeyPoint> {
        let input_len = key_points.len();
        let mut exact = exact_pass(key_points);

        if exact.len() > self.max_key_points {
            warn!(
                kept = self.max_key_points,
                dropped = exact.len() - self.max_key_points,
                "Key point count exceeds fuzzy-merge cap; truncating"
            );
            exact.truncate(self.max_key_points);
        }

        let merged = self.fuzzy_pass(exact);
        debug!(input = input_len, output = merged.len(), "Key points deduplicated");
        merged
    }

    fn fuzzy_pass(&self, mut points: Vec<KeyPoint>) -> Vec<KeyPoint> {
        loop {
            let mut merged_any = false;
            let mut i = 0;
            while i < points.len() {
                let mut j = i + 1;
                while j < points.len() {
                    if similarity(&points[i].content, &points[j].content) >= self.threshold {
                        let absorbed = points.remove(j);
                        merge_into(&mut points[i], absorbed);
                        merged_any = true;
                        // The survivor may have new content; rescan from i.
                        j = i + 1;
                    } else {
                        j += 1;
                    }
                }
                i += 1;
            }
            if !merged_any {
                return points;
            }
        }
    }
}

/// Group by literal content, keeping the first member of each group.
fn exact_pass(key_points: Vec<KeyPoint>) -> Vec<KeyPoint> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut out: Vec<KeyPoint> = Vec::new();

    for kp in key_points {
        match index.get(&kp.content) {
            Some(&pos) => {
                let keeper = &mut out[pos];
                if keeper.source_url.is_none() {
                    keeper.source_url = kp.source_url.clone();
                    keeper.citation = kp.citation.clone();
                } else if let Some(ref url) = kp.source_url {
                    keeper.add_source(url);
                }
                for url in &kp.additional_sources {
                    keeper.add_source(url);
                }
                absorb_citations(keeper, &kp);
            }
            None => {
                index.insert(kp.content.clone(), out.len());
                out.push(kp);
            }
        }
    }
    out
}

/// Merge `other` into `keeper`: the longer content wins and attribution is
/// the union of both.
fn merge_into(keeper: &mut KeyPoint, other: KeyPoint) {
    if other.content.chars().count() > keeper.content.chars().count() {
        keeper.content = other.content.clone();
    }
    match (&keeper.source_url, &other.source_url) {
        (None, Some(url)) => {
            keeper.source_url = Some(url.clone());
            if keeper.citation.is_none() {
                keeper.citation = other.citation.clone();
            }
        }
        (Some(_), Some(url)) => keeper.add_source(url),
        _ => {}
    }
    for url in &other.additional_sources {
        keeper.add_source(url);
    }
    absorb_citations(keeper, &other);
}

fn absorb_citations(keeper: &mut KeyPoint, other: &KeyPoint) {
    if let Some(ref citation) = other.citation {
        keeper.add_citation(citation);
    }
    for citation in &other.additional_citations {
        keeper.add_citation(citation);
    }
}
