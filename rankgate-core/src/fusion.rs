//! Reciprocal Rank Fusion: merge per-source rankings into one
//! deduplicated, deterministically ordered list.
//!
//! An item appearing at 1-based rank `r` in a source's list contributes
//! `1 / (rrf_k + r)` to its aggregate score. Raw source scores are kept
//! for provenance but never compared across sources.
//!
//! Ordering is fully pinned: aggregate score descending, then the rank
//! the item held when first seen ascending, then item ID ascending.
//! Hash-map iteration order never reaches the output — a separate
//! first-seen ID list drives the final sort.

use std::collections::HashMap;

use crate::config::CombineConfig;
use crate::types::{Contribution, FusedItem, SourceResult};

/// Merge ranked per-source result lists via Reciprocal Rank Fusion.
///
/// Items sharing an ID across sources are merged into one [`FusedItem`]
/// whose score is the sum of per-source RRF weights; the payload comes
/// from the first source that reported the item. Items below
/// `cfg.score_floor` (if set) are dropped. The output is truncated to
/// `min(cfg.top_k_init, distinct ids, cfg.top_k_max)`.
///
/// Within one source's list the fusion weight is strictly decreasing in
/// rank, so a single-source merge preserves that source's order.
pub fn combine(results: &[SourceResult], cfg: &CombineConfig) -> Vec<FusedItem> {
    let mut accumulator: HashMap<String, FusedItem> = HashMap::new();
    // First-seen order, kept separately: HashMap iteration order is not
    // stable across runs and must not influence the output.
    let mut seen_order: Vec<String> = Vec::new();

    for result in results {
        for (index, item) in result.items.iter().enumerate() {
            let rank = index + 1;
            let weight = 1.0 / (cfg.rrf_k + rank as f64);
            let contribution = Contribution {
                source: result.source.clone(),
                rank,
                raw_score: item.score,
                weight,
            };

            match accumulator.get_mut(&item.id) {
                Some(fused) => {
                    fused.score += weight;
                    fused.contributions.push(contribution);
                    fused.source_scores.insert(result.source.clone(), item.score);
                }
                None => {
                    seen_order.push(item.id.clone());
                    let mut fused = FusedItem {
                        id: item.id.clone(),
                        score: weight,
                        payload: item.payload.clone(),
                        primary_source: result.source.clone(),
                        first_rank: rank,
                        contributions: vec![contribution],
                        source_scores: Default::default(),
                    };
                    fused.source_scores.insert(result.source.clone(), item.score);
                    accumulator.insert(item.id.clone(), fused);
                }
            }
        }
    }

    let mut fused: Vec<FusedItem> = seen_order
        .into_iter()
        .filter_map(|id| accumulator.remove(&id))
        .filter(|item| cfg.score_floor.is_none_or(|floor| item.score >= floor))
        .collect();

    // Stable sort with a total tie-break: score desc, first-seen rank
    // asc, then ID asc.
    fused.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.first_rank.cmp(&b.first_rank))
            .then_with(|| a.id.cmp(&b.id))
    });

    fused.truncate(cfg.top_k_init.min(cfg.top_k_max));
    fused
}
