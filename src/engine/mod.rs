//! The ranking engine: one façade over the whole pipeline.
//!
//! `prepare_catalog` runs the raw catalog through contextual and feedback
//! filtering, then stamps weather and preference scores on the survivors
//! and builds per-category pools for outfit assembly. `rank_outfits` takes
//! assembled candidates through personalization, exploration, anchor dedup,
//! and redaction, and logs the full run for audit. `record_feedback` closes
//! the loop.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{RankingError, Result};
use crate::models::{
    BlendWeights, CatalogItem, FeedbackRow, GenerationRecord, OutfitCandidate, PublicOutfit,
    WeatherContext,
};
use crate::services::contextual::{apply_contextual_filters, FilterOptions};
use crate::services::ingestion::FeedbackIngestor;
use crate::services::personalization::{PersonalizationScorer, PersonalizeParams};
use crate::services::pool::build_pool;
use crate::services::ranking;
use crate::services::rules::{apply_feedback_filters, compile_rules, FeedbackFilterOptions};
use crate::services::weather::{score_catalog, WeatherWeights};
use crate::store::{EventLog, PreferenceStore};

/// Catalog preparation request. `categories` names the pools the caller
/// wants built; `min_keep` overrides the configured scarcity floor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogRequest {
    #[serde(alias = "user_id")]
    pub user_id: String,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub catalog: Vec<CatalogItem>,
    #[serde(default, alias = "feedback_rows")]
    pub feedback_rows: Vec<FeedbackRow>,
    #[serde(default)]
    pub weather: Option<WeatherContext>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default, alias = "min_keep")]
    pub min_keep: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryPool {
    pub category: String,
    pub tier: usize,
    pub items: Vec<CatalogItem>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreparationStats {
    pub input_items: usize,
    pub after_contextual: usize,
    pub after_feedback: usize,
    pub rules_compiled: usize,
}

/// Filtered, scored catalog plus the requested pools.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogPreparation {
    pub items: Vec<CatalogItem>,
    pub pools: Vec<CategoryPool>,
    pub stats: PreparationStats,
}

/// Ranking request over assembled outfit candidates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankRequest {
    #[serde(alias = "user_id")]
    pub user_id: String,
    #[serde(default)]
    pub candidates: Vec<OutfitCandidate>,
    #[serde(default)]
    pub weather: Option<WeatherContext>,
    /// Tie-break seed. Defaults to user id plus the current date, so equal
    /// scores hold their order within a day and reshuffle across days.
    #[serde(default)]
    pub seed: Option<String>,
    #[serde(default, alias = "exploration_rate")]
    pub exploration_rate: Option<f64>,
    #[serde(default, alias = "recent_shown_item_ids")]
    pub recent_shown_item_ids: Vec<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankStats {
    pub candidates_in: usize,
    pub hard_blocked: usize,
    pub unique_anchors: usize,
    pub explored: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankResponse {
    pub request_id: String,
    pub outfits: Vec<PublicOutfit>,
    /// Outfit id at the top of the full ranking.
    pub chosen: Option<String>,
    pub seed: String,
    pub context_used: bool,
    pub debug_weights: BlendWeights,
    pub stats: RankStats,
}

pub struct RankingEngine {
    config: Config,
    weather_weights: WeatherWeights,
    prefs: Arc<dyn PreferenceStore>,
    scorer: PersonalizationScorer,
    ingestor: FeedbackIngestor,
}

impl RankingEngine {
    pub fn new(
        config: Config,
        prefs: Arc<dyn PreferenceStore>,
        events: Arc<dyn EventLog>,
    ) -> Self {
        Self {
            scorer: PersonalizationScorer::new(prefs.clone()),
            ingestor: FeedbackIngestor::new(prefs.clone(), events),
            prefs,
            weather_weights: WeatherWeights::default(),
            config,
        }
    }

    pub fn with_weather_weights(mut self, weights: WeatherWeights) -> Self {
        self.weather_weights = weights;
        self
    }

    /// Filters and scores the catalog, then builds the requested pools.
    pub async fn prepare_catalog(&self, request: CatalogRequest) -> Result<CatalogPreparation> {
        ensure_user_id(&request.user_id)?;
        if let Some(idx) = request.catalog.iter().position(|item| item.id.trim().is_empty()) {
            return Err(RankingError::InvalidInput(format!(
                "catalog item at index {idx} is missing an id"
            )));
        }

        let min_keep = request.min_keep.unwrap_or(self.config.min_keep);
        let query = request.query.as_deref().unwrap_or_default();

        let after_contextual =
            apply_contextual_filters(query, &request.catalog, &FilterOptions { min_keep });

        let rules = compile_rules(&request.feedback_rows);
        let mut items = apply_feedback_filters(
            &after_contextual,
            &rules,
            &FeedbackFilterOptions {
                min_keep,
                soften_when_below: true,
            },
        );

        score_catalog(&mut items, request.weather.as_ref(), &self.weather_weights);

        let ids: Vec<String> = items.iter().map(|item| item.id.clone()).collect();
        let preference_scores = if ids.is_empty() {
            Default::default()
        } else {
            self.prefs.user_item_scores(&request.user_id, &ids).await?
        };
        for item in items.iter_mut() {
            item.feedback_score = preference_scores
                .get(&item.id)
                .copied()
                .unwrap_or(0.0)
                .round() as i32;
        }

        let pools: Vec<CategoryPool> = request
            .categories
            .iter()
            .map(|category| {
                let result = build_pool(&items, category);
                CategoryPool {
                    category: category.clone(),
                    tier: result.tier,
                    items: result.pool,
                }
            })
            .collect();

        let stats = PreparationStats {
            input_items: request.catalog.len(),
            after_contextual: after_contextual.len(),
            after_feedback: items.len(),
            rules_compiled: rules.len(),
        };
        info!(
            user_id = %request.user_id,
            input = stats.input_items,
            after_contextual = stats.after_contextual,
            after_feedback = stats.after_feedback,
            rules = stats.rules_compiled,
            pools = pools.len(),
            "Prepared catalog"
        );
        Ok(CatalogPreparation { items, pools, stats })
    }

    /// Personalizes, ranks, and redacts candidates using a thread-local RNG
    /// for the exploration draw.
    pub async fn rank_outfits(&self, request: RankRequest) -> Result<RankResponse> {
        let mut rng = rand::thread_rng();
        self.rank_outfits_with_rng(request, &mut rng).await
    }

    /// Same as [`rank_outfits`](Self::rank_outfits) with the exploration RNG
    /// supplied by the caller, which pins the one non-deterministic step.
    pub async fn rank_outfits_with_rng(
        &self,
        request: RankRequest,
        rng: &mut dyn RngCore,
    ) -> Result<RankResponse> {
        ensure_user_id(&request.user_id)?;
        let request_id = Uuid::new_v4().to_string();
        let candidates_in = request.candidates.len();

        let mut candidates = request.candidates;
        for outfit in candidates.iter_mut() {
            score_catalog(
                &mut outfit.items,
                request.weather.as_ref(),
                &self.weather_weights,
            );
        }

        let seed = request.seed.unwrap_or_else(|| {
            format!("{}-{}", request.user_id, Utc::now().format("%Y-%m-%d"))
        });

        let outcome = self
            .scorer
            .apply(
                PersonalizeParams {
                    user_id: request.user_id.clone(),
                    base_outfits: candidates,
                    context: request.weather.clone(),
                    weights: self.config.blend.clone(),
                    exploration_rate: request
                        .exploration_rate
                        .unwrap_or(self.config.exploration_rate),
                    recent_shown_item_ids: request
                        .recent_shown_item_ids
                        .iter()
                        .cloned()
                        .collect::<HashSet<String>>(),
                },
                rng,
            )
            .await?;

        let ranked = ranking::rank_outfits(outcome.rescored, &seed);
        let selected = ranking::select_top_n(&ranked, request.limit);
        let outfits = ranking::redact(&selected);
        let chosen = ranked.first().map(|entry| entry.outfit.outfit_id.clone());
        let unique_anchors = ranked.iter().filter(|entry| entry.unique_anchor).count();

        let record = GenerationRecord {
            request_id: request_id.clone(),
            user_id: request.user_id.clone(),
            query: None,
            weather: request.weather.clone(),
            candidates: ranked
                .iter()
                .map(serde_json::to_value)
                .collect::<std::result::Result<Vec<_>, _>>()?,
            chosen: selected
                .first()
                .map(serde_json::to_value)
                .transpose()?,
            created_at: Utc::now(),
        };
        self.ingestor.log_generation(&record).await?;

        info!(
            user_id = %request.user_id,
            request_id = %request_id,
            candidates = candidates_in,
            returned = outfits.len(),
            hard_blocked = outcome.hard_blocked,
            explored = outcome.explored,
            "Ranked outfits"
        );
        Ok(RankResponse {
            request_id,
            outfits,
            chosen,
            seed,
            context_used: outcome.context_used,
            debug_weights: outcome.debug_weights,
            stats: RankStats {
                candidates_in,
                hard_blocked: outcome.hard_blocked,
                unique_anchors,
                explored: outcome.explored,
            },
        })
    }

    /// Records one feedback event and folds it into the preference tables.
    pub async fn record_feedback(&self, row: &FeedbackRow) -> Result<()> {
        self.ingestor.record_feedback(row).await
    }

    /// Appends a caller-assembled generation record to the audit log.
    pub async fn log_generation(&self, record: &GenerationRecord) -> Result<()> {
        self.ingestor.log_generation(record).await
    }
}

fn ensure_user_id(user_id: &str) -> Result<()> {
    if user_id.trim().is_empty() {
        return Err(RankingError::InvalidInput(
            "user_id must not be empty".to_string(),
        ));
    }
    Ok(())
}
