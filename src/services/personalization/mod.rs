//! Personalization and exploration scoring.
//!
//! Everything upstream filters and pools; this stage is where a ranking
//! becomes *this user's* ranking. Stored preference signals blend into a
//! bounded boost on each outfit's base score, strongly disliked items knock
//! their outfits out entirely, and an occasional epsilon-greedy swap feeds
//! one novel item into the top outfit.
//!
//! The preference store is read once per request; scoring itself is pure
//! over the fetched maps. The exploration draw is the only randomness in
//! the pipeline, so the RNG comes in as a parameter and tests can pin it.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use rand::{Rng, RngCore};
use tracing::{debug, info};

use crate::error::Result;
use crate::models::{BlendWeights, CatalogItem, OutfitCandidate, ScoredOutfit, WeatherContext};
use crate::services::features::extract_features;
use crate::store::PreferenceStore;

pub const DEFAULT_EXPLORATION_RATE: f64 = 0.1;

/// Personalization may move a score by at most this much in either
/// direction; retrieval order dominates unless signals are strong.
pub const BOOST_MIN: f64 = -0.5;
pub const BOOST_MAX: f64 = 0.5;

/// A user-item score at or below this drops the whole outfit.
pub const HARD_BLOCK_THRESHOLD: f64 = -4.0;

const EXPLORATION_POOL_TOP_N: usize = 10;
const EXPLORATION_PENALTY: f64 = 0.01;
const EXPLORATION_SUFFIX: &str = "#x";

/// Inputs for one personalization pass.
#[derive(Debug, Clone)]
pub struct PersonalizeParams {
    pub user_id: String,
    pub base_outfits: Vec<OutfitCandidate>,
    pub context: Option<WeatherContext>,
    pub weights: BlendWeights,
    pub exploration_rate: f64,
    pub recent_shown_item_ids: HashSet<String>,
}

/// Rescored outfits in descending final-score order, plus the signals a
/// caller needs for auditing the pass.
#[derive(Debug, Clone)]
pub struct PersonalizationOutcome {
    pub rescored: Vec<ScoredOutfit>,
    pub chosen: Option<ScoredOutfit>,
    pub debug_weights: BlendWeights,
    pub context_used: bool,
    pub hard_blocked: usize,
    pub explored: bool,
}

pub struct PersonalizationScorer {
    prefs: Arc<dyn PreferenceStore>,
}

impl PersonalizationScorer {
    pub fn new(prefs: Arc<dyn PreferenceStore>) -> Self {
        Self { prefs }
    }

    /// Rescores `base_outfits` for the user and optionally explores.
    ///
    /// Store reads happen concurrently and only once; the global item query
    /// is skipped entirely when no outfit carries item ids.
    pub async fn apply(
        &self,
        params: PersonalizeParams,
        rng: &mut dyn RngCore,
    ) -> Result<PersonalizationOutcome> {
        let PersonalizeParams {
            user_id,
            base_outfits,
            context,
            weights,
            exploration_rate,
            recent_shown_item_ids,
        } = params;
        let context_used = context.is_some();

        if base_outfits.is_empty() {
            return Ok(PersonalizationOutcome {
                rescored: Vec::new(),
                chosen: None,
                debug_weights: weights,
                context_used,
                hard_blocked: 0,
                explored: false,
            });
        }

        // Feature sets are materialized sorted so the float sums below are
        // reproducible across runs.
        let outfit_features: Vec<Vec<String>> = base_outfits
            .iter()
            .map(|outfit| {
                let mut features: Vec<String> = extract_features(outfit).into_iter().collect();
                features.sort();
                features
            })
            .collect();
        let outfit_ids: Vec<Vec<String>> =
            base_outfits.iter().map(OutfitCandidate::all_item_ids).collect();

        let feature_keys = sorted_union(outfit_features.iter());
        let item_keys = sorted_union(outfit_ids.iter());

        let (user_features, user_items, global_features, global_items) = tokio::try_join!(
            self.prefs.user_feature_scores(&user_id, &feature_keys),
            self.prefs.user_item_scores(&user_id, &item_keys),
            self.prefs.global_feature_quality(&feature_keys),
            async {
                if item_keys.is_empty() {
                    Ok(HashMap::new())
                } else {
                    self.prefs.global_item_quality(&item_keys).await
                }
            },
        )?;

        let mut hard_blocked = 0usize;
        let mut rescored: Vec<ScoredOutfit> = Vec::with_capacity(base_outfits.len());
        for ((outfit, features), ids) in base_outfits
            .into_iter()
            .zip(outfit_features)
            .zip(outfit_ids)
        {
            let blocked = ids
                .iter()
                .any(|id| user_items.get(id).is_some_and(|s| *s <= HARD_BLOCK_THRESHOLD));
            if blocked {
                hard_blocked += 1;
                debug!(
                    outfit_id = %outfit.outfit_id,
                    "Dropped outfit containing a strongly disliked item"
                );
                continue;
            }

            let personal = mean_score(&features, &user_features);
            let item_bias = mean_score(&ids, &user_items);
            let g_feat_avg = mean_score(&features, &global_features);
            let g_item_avg = mean_score(&ids, &global_items);
            let diversity = if ids.iter().any(|id| !recent_shown_item_ids.contains(id)) {
                1.0
            } else {
                0.0
            };

            let raw = weights.alpha * personal
                + weights.beta * item_bias
                + weights.gamma * diversity
                + weights.delta * g_item_avg
                + weights.epsilon * g_feat_avg;
            let boost = raw.clamp(BOOST_MIN, BOOST_MAX);

            let mut entry = ScoredOutfit::from_candidate(outfit);
            entry.final_score += boost;
            rescored.push(entry);
        }

        rescored.sort_by(|a, b| {
            b.final_score
                .partial_cmp(&a.final_score)
                .unwrap_or(Ordering::Equal)
        });

        let mut explored = false;
        if exploration_rate > 0.0 && !rescored.is_empty() && rng.gen::<f64>() < exploration_rate {
            explored = explore_top(&mut rescored, &recent_shown_item_ids, rng);
        }

        let chosen = rescored.first().cloned();
        info!(
            user_id = %user_id,
            rescored = rescored.len(),
            hard_blocked,
            explored,
            "Personalized outfit scores"
        );
        Ok(PersonalizationOutcome {
            rescored,
            chosen,
            debug_weights: weights,
            context_used,
            hard_blocked,
            explored,
        })
    }
}

/// Swaps one random item of the top outfit for a novel id drawn from the
/// other leading outfits. Swapped outfits are marked with an id suffix and
/// a small score markdown so the variant never reads as the exploit choice.
fn explore_top(
    rescored: &mut [ScoredOutfit],
    recent_shown_item_ids: &HashSet<String>,
    rng: &mut dyn RngCore,
) -> bool {
    let top_ids: HashSet<String> = rescored[0].outfit.all_item_ids().into_iter().collect();
    let mut pool: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    for entry in rescored.iter().take(EXPLORATION_POOL_TOP_N) {
        for id in entry.outfit.all_item_ids() {
            if !top_ids.contains(&id)
                && !recent_shown_item_ids.contains(&id)
                && seen.insert(id.clone())
            {
                pool.push(id);
            }
        }
    }

    let top = &mut rescored[0];
    if pool.is_empty() || top.outfit.item_ids.is_empty() {
        debug!("Exploration draw had no usable candidates");
        return false;
    }

    let slot = rng.gen_range(0..top.outfit.item_ids.len());
    let replacement = pool[rng.gen_range(0..pool.len())].clone();
    top.outfit.item_ids[slot] = replacement.clone();
    if slot < top.outfit.items.len() {
        // The swapped-in item is known only by id here; redaction falls back
        // to the default display name for it.
        top.outfit.items[slot] = CatalogItem {
            id: replacement.clone(),
            ..Default::default()
        };
    }
    top.outfit.outfit_id.push_str(EXPLORATION_SUFFIX);
    top.final_score -= EXPLORATION_PENALTY;
    info!(
        outfit_id = %top.outfit.outfit_id,
        slot,
        replacement = %replacement,
        "Exploration swapped one item in the top outfit"
    );
    true
}

/// Mean of the stored scores over `keys`, treating absent keys as zero.
/// An empty key set contributes nothing rather than dividing by zero.
fn mean_score(keys: &[String], scores: &HashMap<String, f64>) -> f64 {
    if keys.is_empty() {
        return 0.0;
    }
    let sum: f64 = keys
        .iter()
        .map(|key| scores.get(key).copied().unwrap_or(0.0))
        .sum();
    sum / keys.len() as f64
}

fn sorted_union<'a, I>(groups: I) -> Vec<String>
where
    I: Iterator<Item = &'a Vec<String>>,
{
    let mut keys: Vec<String> = groups
        .flat_map(|group| group.iter().cloned())
        .collect::<HashSet<String>>()
        .into_iter()
        .collect();
    keys.sort();
    keys
}
