//! Tiered per-category candidate pools.
//!
//! Assembly asks for "the best shoes for this request". The pool builder
//! answers with the weather-appropriate subset when it can, relaxing to
//! mildly-penalized items and finally to the whole category. The adopted
//! tier travels with the pool so callers can tell a confident pool from a
//! last-resort one.

use tracing::debug;

use crate::models::{canonical_category, CatalogItem};
use crate::services::degrade::{degrade, Stage};

/// Tier 2 keeps items whose weather score is no worse than this.
pub const TIER2_MIN_SCORE: i32 = -2;

/// A category pool and the ladder tier that produced it. Tier 1 is
/// weather-appropriate, tier 2 mildly penalized, tier 3 unfiltered.
#[derive(Debug, Clone)]
pub struct PoolResult {
    pub pool: Vec<CatalogItem>,
    pub tier: usize,
}

/// Builds the candidate pool for one category.
///
/// Items are matched on canonical category, ordered by weather fit and then
/// stored preference, and tiered so that a non-empty category never yields
/// an empty pool.
pub fn build_pool(items: &[CatalogItem], category: &str) -> PoolResult {
    let wanted = canonical_category(category);
    let mut matched: Vec<CatalogItem> = items
        .iter()
        .filter(|item| item.canonical_category() == wanted)
        .cloned()
        .collect();
    matched.sort_by(|a, b| {
        b.weather_score
            .cmp(&a.weather_score)
            .then(b.feedback_score.cmp(&a.feedback_score))
    });

    let stages = vec![
        Stage {
            name: "pool-weather-fit",
            min_keep: 1,
            apply: Box::new(|| {
                matched
                    .iter()
                    .filter(|item| item.weather_score >= 0)
                    .cloned()
                    .collect()
            }),
        },
        Stage {
            name: "pool-mild-penalty",
            min_keep: 1,
            apply: Box::new(|| {
                matched
                    .iter()
                    .filter(|item| item.weather_score >= TIER2_MIN_SCORE)
                    .cloned()
                    .collect()
            }),
        },
        Stage {
            name: "pool-unfiltered",
            min_keep: 0,
            apply: Box::new(|| matched.clone()),
        },
    ];
    let (pool, stage_idx) = degrade(stages);
    let tier = stage_idx + 1;
    debug!(
        category = %wanted,
        tier,
        pool_size = pool.len(),
        matched = matched.len(),
        "Built category pool"
    );
    PoolResult { pool, tier }
}
