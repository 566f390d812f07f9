//! Core types for ranked source results and fused gateway output.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single ranked hit returned by one upstream source.
///
/// Items are created by source adapters and are read-only to the core.
/// The `payload` is opaque: the gateway carries it through fusion without
/// inspecting it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    /// Identifier, unique within one source's result list (adapter contract).
    pub id: String,
    /// The source's own relevance score. Not comparable across sources;
    /// fusion uses rank positions, not raw scores.
    pub score: f64,
    /// Opaque document payload, passed through untouched.
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// One source's complete ranked list for a single request.
///
/// Created per request and discarded after fusion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceResult {
    /// Name of the source that produced this list.
    pub source: String,
    /// Items in the source's own rank order, best first.
    pub items: Vec<Item>,
}

/// One source's influence on a fused item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contribution {
    /// Which source contributed.
    pub source: String,
    /// 1-based rank of the item in that source's list.
    pub rank: usize,
    /// The source's raw score for the item.
    pub raw_score: f64,
    /// The RRF weight `1 / (rrf_k + rank)` this contribution added.
    pub weight: f64,
}

/// A merged, deduplicated output item.
///
/// IDs are unique within the returned list. The payload comes from the
/// first source that reported the item (first source wins).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusedItem {
    /// Item identifier, unique in the fused output.
    pub id: String,
    /// Aggregate RRF score: sum of contribution weights.
    pub score: f64,
    /// Payload from the first source that reported this item.
    pub payload: serde_json::Value,
    /// Name of that first source.
    pub primary_source: String,
    /// Rank the item held when first seen (tie-break key).
    pub first_rank: usize,
    /// Every source's contribution, in processing order.
    pub contributions: Vec<Contribution>,
    /// Original per-source scores, keyed by source name.
    pub source_scores: BTreeMap<String, f64>,
}
