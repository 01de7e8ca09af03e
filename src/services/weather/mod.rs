//! Weather-fit scoring.
//!
//! A pure additive heuristic: each band contributes independently and there
//! is no early exit, so a single item can collect boosts and penalties at
//! once. Absent context is a no-op by policy; weather is an enhancement,
//! never a requirement.

use serde::{Deserialize, Serialize};

use crate::models::{CatalogItem, Precipitation, WeatherContext};

/// Thresholds and magnitudes for the scoring bands, each independently
/// overridable. Penalties are stored as positive magnitudes and subtracted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherWeights {
    pub hot_temp_min_f: f32,
    pub cold_temp_max_f: f32,
    pub wind_mph_min: f32,
    pub shorts_temp_min_f: f32,
    pub hot_boost_short_sleeve: i32,
    pub hot_penalize_outer: i32,
    pub cold_boost_outer: i32,
    pub cold_penalize_short_sleeve: i32,
    pub rain_boost_waterproof: i32,
    pub rain_penalize_suede: i32,
    pub wind_boost_shell: i32,
    pub shorts_penalty: i32,
}

impl Default for WeatherWeights {
    fn default() -> Self {
        Self {
            hot_temp_min_f: 78.0,
            cold_temp_max_f: 55.0,
            wind_mph_min: 15.0,
            shorts_temp_min_f: 60.0,
            hot_boost_short_sleeve: 6,
            hot_penalize_outer: 4,
            cold_boost_outer: 8,
            cold_penalize_short_sleeve: 5,
            rain_boost_waterproof: 8,
            rain_penalize_suede: 6,
            wind_boost_shell: 4,
            shorts_penalty: 8,
        }
    }
}

/// Scores one item against the weather context. Returns 0 when the context
/// or its temperature is missing.
pub fn score_item(
    item: &CatalogItem,
    context: Option<&WeatherContext>,
    weights: &WeatherWeights,
) -> i32 {
    let Some(context) = context else { return 0 };
    let Some(temp_f) = context.temp_f else { return 0 };

    let mut score = 0;

    if temp_f >= weights.hot_temp_min_f {
        if has_short_sleeve(item) {
            score += weights.hot_boost_short_sleeve;
        }
        if is_outerwear(item) {
            score -= weights.hot_penalize_outer;
        }
    }

    // The hot and cold bands cannot both fire for one temperature.
    if temp_f <= weights.cold_temp_max_f {
        if is_outerwear(item) {
            score += weights.cold_boost_outer;
        }
        if has_short_sleeve(item) {
            score -= weights.cold_penalize_short_sleeve;
        }
    }

    if context.precipitation == Some(Precipitation::Rain) {
        if is_rain_ready(item) {
            score += weights.rain_boost_waterproof;
        }
        if mentions_suede(item) {
            score -= weights.rain_penalize_suede;
        }
    }

    if context.wind_mph.is_some_and(|wind| wind >= weights.wind_mph_min) && is_wind_shell(item) {
        score += weights.wind_boost_shell;
    }

    if is_shorts(item) && temp_f < weights.shorts_temp_min_f {
        score -= weights.shorts_penalty;
    }

    score
}

/// Stamps `weather_score` on every item in place.
pub fn score_catalog(
    items: &mut [CatalogItem],
    context: Option<&WeatherContext>,
    weights: &WeatherWeights,
) {
    for item in items.iter_mut() {
        item.weather_score = score_item(item, context, weights);
    }
}

fn has_short_sleeve(item: &CatalogItem) -> bool {
    item.sleeve_length
        .as_deref()
        .is_some_and(|sleeve| sleeve.to_lowercase().contains("short"))
}

fn is_outerwear(item: &CatalogItem) -> bool {
    item.main_category.eq_ignore_ascii_case("outerwear")
        || item
            .layering
            .as_deref()
            .is_some_and(|layer| layer.eq_ignore_ascii_case("outer"))
}

fn is_rain_ready(item: &CatalogItem) -> bool {
    item.rain_ok == Some(true) || item.waterproof_rating.is_some_and(|rating| rating > 0.0)
}

fn mentions_suede(item: &CatalogItem) -> bool {
    item.material
        .as_deref()
        .is_some_and(|material| material.to_lowercase().contains("suede"))
}

fn is_wind_shell(item: &CatalogItem) -> bool {
    item.layering
        .as_deref()
        .is_some_and(|layer| layer.eq_ignore_ascii_case("outer"))
        || item.subcategory.as_deref().is_some_and(|sub| {
            let sub = sub.to_lowercase();
            sub.contains("jacket") || sub.contains("shell")
        })
}

fn is_shorts(item: &CatalogItem) -> bool {
    item.subcategory
        .as_deref()
        .is_some_and(|sub| sub.eq_ignore_ascii_case("shorts"))
}
