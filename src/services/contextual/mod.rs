//! Occasion-intent detection and contextual category filtering.
//!
//! Each intent runs a strong allowlist first and falls back to a soft
//! blocklist when the wardrobe is too sparse to survive it. Intents apply
//! in fixed precedence order, each narrowing the previous stage's output,
//! and a final safety valve guarantees a non-empty input never maps to an
//! empty result.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info};

use crate::models::CatalogItem;
use crate::services::degrade::{degrade, Stage, DEFAULT_MIN_KEEP};

/// Formality floor for upscale queries when the catalog carries explicit
/// scores (1 = athleisure, 5 = black tie).
const UPSCALE_MIN_FORMALITY: f32 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Gym,
    BlackTie,
    Beach,
    Wedding,
    Upscale,
}

#[derive(Debug, Clone)]
pub struct FilterOptions {
    pub min_keep: usize,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            min_keep: DEFAULT_MIN_KEEP,
        }
    }
}

// ============================================================================
// Query detectors
// ============================================================================

static GYM_QUERY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(gym|workout|work\s*out|training|exercise|athletic|run(?:ning)?)\b")
        .expect("valid gym query regex")
});

static BLACK_TIE_QUERY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"black[\s-]?tie|tuxedo|\bgala\b|formal\s+(?:event|dinner|affair)")
        .expect("valid black-tie query regex")
});

static BEACH_QUERY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(beach|pool(?:side)?|swim(?:ming)?|resort|boardwalk)\b")
        .expect("valid beach query regex")
});

static WEDDING_QUERY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(wedding|bridal|bride|groom)\b").expect("valid wedding query regex")
});

static UPSCALE_QUERY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(upscale|fancy|elegant|cocktail|dressy|fine\s+dining|date\s+night|rooftop)\b")
        .expect("valid upscale query regex")
});

// ============================================================================
// Item classifiers
// ============================================================================

static GYM_ALLOW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"sneaker|trainer|running|athletic|jogger|sweat|legging|tank|t-?shirt|\btees?\b|\bshorts\b|track|gym|workout|performance",
    )
    .expect("valid gym allow regex")
});

static GYM_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"dress\s+shoe|oxford|derby|loafer|heel|\bboots?\b|trouser|slack|chino|\bjeans?\b|denim|blazer|suit|gown|\bdress\b",
    )
    .expect("valid gym block regex")
});

static BLACK_TIE_ALLOW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"tuxedo|\btux\b|cummerbund|bow\s*tie|dress\s+shirt|dress\s+shoe|patent|oxford|derby|gown|evening|suit|blazer|pocket\s+square|cufflink|heel",
    )
    .expect("valid black-tie allow regex")
});

static BLACK_TIE_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"sneaker|trainer|hoodie|sweat|jogger|\bshorts\b|t-?shirt|\btees?\b|tank|flip[\s-]?flop|sandal|denim|\bjeans?\b|graphic|legging|athletic",
    )
    .expect("valid black-tie block regex")
});

static BEACH_ALLOW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"sandal|flip[\s-]?flop|\bslides?\b|swim|board\s*short|\bshorts\b|tank|t-?shirt|\btees?\b|linen|sun\s*hat|rash\s*guard|espadrille|cover[\s-]?up",
    )
    .expect("valid beach allow regex")
});

static BEACH_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\bboots?\b|coat|parka|puffer|sweater|wool|suit|blazer|tuxedo|oxford|dress\s+shoe|heel|trouser|turtleneck",
    )
    .expect("valid beach block regex")
});

static WEDDING_ALLOW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"suit|blazer|sport\s+coat|dress\s+shirt|\bdress(es)?\b|gown|heel|pump|oxford|derby|loafer|dress\s+shoe|\btie\b|blouse|slack|trouser",
    )
    .expect("valid wedding allow regex")
});

static WEDDING_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\bshorts\b|t-?shirt|\btees?\b|tank|hoodie|sweat|jogger|flip[\s-]?flop|sneaker|trainer|graphic|distressed|swim",
    )
    .expect("valid wedding block regex")
});

static ULTRA_CASUAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"graphic|hoodie|sweat(?:shirt|pant)?s?\b|jogger|\bshorts\b|flip[\s-]?flop|tank|slogan|distressed|ripped",
    )
    .expect("valid ultra-casual regex")
});

static DENIM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"denim|\bjeans?\b").expect("valid denim regex"));

static LOW_FORMALITY_DENIM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"distressed|ripped|light\s+wash|baggy|raw\s+hem").expect("valid denim wash regex")
});

fn is_gym_ready(item: &CatalogItem) -> bool {
    let text = item.search_text();
    GYM_ALLOW.is_match(&text) && !GYM_BLOCK.is_match(&text)
}

fn is_gym_violation(item: &CatalogItem) -> bool {
    GYM_BLOCK.is_match(&item.search_text())
}

fn is_black_tie_ready(item: &CatalogItem) -> bool {
    let text = item.search_text();
    BLACK_TIE_ALLOW.is_match(&text) && !BLACK_TIE_BLOCK.is_match(&text)
}

fn is_black_tie_violation(item: &CatalogItem) -> bool {
    BLACK_TIE_BLOCK.is_match(&item.search_text())
}

fn is_beach_ready(item: &CatalogItem) -> bool {
    let text = item.search_text();
    BEACH_ALLOW.is_match(&text) && !BEACH_BLOCK.is_match(&text)
}

fn is_beach_violation(item: &CatalogItem) -> bool {
    BEACH_BLOCK.is_match(&item.search_text())
}

fn is_wedding_ready(item: &CatalogItem) -> bool {
    let text = item.search_text();
    WEDDING_ALLOW.is_match(&text) && !WEDDING_BLOCK.is_match(&text)
}

fn is_wedding_violation(item: &CatalogItem) -> bool {
    WEDDING_BLOCK.is_match(&item.search_text())
}

/// Ultra-casual check for upscale queries. Explicit dress-code and
/// formality fields win over the label heuristics in both directions.
fn is_ultra_casual(item: &CatalogItem) -> bool {
    if let Some(code) = item.dress_code.as_deref() {
        let code = code.to_lowercase();
        if ["athleisure", "activewear", "loungewear", "gym"]
            .iter()
            .any(|casual| code.contains(casual))
        {
            return true;
        }
        if ["business", "formal", "black tie", "cocktail", "smart"]
            .iter()
            .any(|dressy| code.contains(dressy))
        {
            return false;
        }
    }

    if let Some(formality) = item.formality_score {
        return formality < UPSCALE_MIN_FORMALITY;
    }

    let mut text = item.search_text();
    if let Some(material) = item.material.as_deref() {
        text.push(' ');
        text.push_str(&material.to_lowercase());
    }
    if ULTRA_CASUAL.is_match(&text) {
        return true;
    }
    DENIM.is_match(&text) && LOW_FORMALITY_DENIM.is_match(&text)
}

// ============================================================================
// Intent pipeline
// ============================================================================

struct IntentStage {
    intent: Intent,
    detector: &'static LazyLock<Regex>,
    allow: Option<fn(&CatalogItem) -> bool>,
    block: fn(&CatalogItem) -> bool,
}

/// Precedence order is load-bearing: each stage narrows the previous one.
static STAGES: [IntentStage; 5] = [
    IntentStage {
        intent: Intent::Gym,
        detector: &GYM_QUERY,
        allow: Some(is_gym_ready),
        block: is_gym_violation,
    },
    IntentStage {
        intent: Intent::BlackTie,
        detector: &BLACK_TIE_QUERY,
        allow: Some(is_black_tie_ready),
        block: is_black_tie_violation,
    },
    IntentStage {
        intent: Intent::Beach,
        detector: &BEACH_QUERY,
        allow: Some(is_beach_ready),
        block: is_beach_violation,
    },
    IntentStage {
        intent: Intent::Wedding,
        detector: &WEDDING_QUERY,
        allow: Some(is_wedding_ready),
        block: is_wedding_violation,
    },
    IntentStage {
        intent: Intent::Upscale,
        detector: &UPSCALE_QUERY,
        allow: None,
        block: is_ultra_casual,
    },
];

/// Intents detected in the query, in precedence order.
pub fn detected_intents(query: &str) -> Vec<Intent> {
    let lowered = query.to_lowercase();
    STAGES
        .iter()
        .filter(|stage| stage.detector.is_match(&lowered))
        .map(|stage| stage.intent)
        .collect()
}

/// Applies every detected intent to the catalog. Never returns an empty
/// list for a non-empty input: if the stages strip everything, the original
/// catalog comes back unfiltered.
pub fn apply_contextual_filters(
    query: &str,
    catalog: &[CatalogItem],
    options: &FilterOptions,
) -> Vec<CatalogItem> {
    if catalog.is_empty() {
        return Vec::new();
    }
    let lowered = query.to_lowercase();

    let filtered = STAGES
        .iter()
        .filter(|stage| stage.detector.is_match(&lowered))
        .fold(catalog.to_vec(), |current, stage| {
            run_stage(stage, current, options.min_keep)
        });

    if filtered.is_empty() {
        info!(
            query = %query,
            catalog_size = catalog.len(),
            "Contextual filters removed every item; reverting to the unfiltered catalog"
        );
        return catalog.to_vec();
    }
    filtered
}

fn run_stage(stage: &IntentStage, input: Vec<CatalogItem>, min_keep: usize) -> Vec<CatalogItem> {
    let block = stage.block;

    let Some(allow) = stage.allow else {
        let kept: Vec<CatalogItem> = input.iter().filter(|item| !block(item)).cloned().collect();
        debug!(
            intent = ?stage.intent,
            kept = kept.len(),
            dropped = input.len() - kept.len(),
            "Blocklist-only intent stage applied"
        );
        return kept;
    };

    let source = &input;
    let (kept, adopted) = degrade(vec![
        Stage {
            name: "strong-allow",
            min_keep,
            apply: Box::new(move || source.iter().filter(|item| allow(item)).cloned().collect()),
        },
        Stage {
            name: "soft-block",
            min_keep: 0,
            apply: Box::new(move || source.iter().filter(|item| !block(item)).cloned().collect()),
        },
    ]);
    debug!(
        intent = ?stage.intent,
        kept = kept.len(),
        softened = adopted == 1,
        "Intent stage applied"
    );
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, label: &str) -> CatalogItem {
        CatalogItem {
            id: id.to_string(),
            label: label.to_string(),
            ..Default::default()
        }
    }

    fn activewear_catalog() -> Vec<CatalogItem> {
        vec![
            item("i1", "Running Sneakers"),
            item("i2", "Track Joggers"),
            item("i3", "Performance Tank"),
            item("i4", "Gym Shorts"),
            item("i5", "Sweat Hoodie"),
            item("i6", "Athletic Tee"),
            item("i7", "Leather Oxford Shoes"),
            item("i8", "Wool Blazer"),
        ]
    }

    #[test]
    fn test_detected_intents_in_precedence_order() {
        let intents = detected_intents("Wedding on the beach");
        assert_eq!(intents, vec![Intent::Beach, Intent::Wedding]);
        assert!(detected_intents("casual friday").is_empty());
    }

    #[test]
    fn test_gym_strong_allowlist_adopted_when_rich() {
        let filtered = apply_contextual_filters(
            "outfit for the gym",
            &activewear_catalog(),
            &FilterOptions::default(),
        );
        let ids: Vec<&str> = filtered.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["i1", "i2", "i3", "i4", "i5", "i6"]);
    }

    #[test]
    fn test_gym_sparse_wardrobe_falls_back_to_soft_blocklist() {
        let catalog = vec![
            item("i1", "Running Sneakers"),
            item("i2", "Linen Shirt"),
            item("i3", "Leather Oxford Shoes"),
            item("i4", "Plain Henley"),
        ];
        let filtered =
            apply_contextual_filters("gym session", &catalog, &FilterOptions::default());
        // Strong allow keeps only the sneakers, below the floor; the soft
        // pass drops only the unambiguous violation.
        let ids: Vec<&str> = filtered.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["i1", "i2", "i4"]);
    }

    #[test]
    fn test_safety_valve_reverts_to_original_catalog() {
        let catalog = vec![
            item("i1", "Navy Suit"),
            item("i2", "Leather Oxford Shoes"),
            item("i3", "Silk Dress"),
        ];
        let filtered = apply_contextual_filters("gym time", &catalog, &FilterOptions::default());
        assert_eq!(filtered.len(), catalog.len());
    }

    #[test]
    fn test_no_intent_leaves_catalog_unchanged() {
        let catalog = activewear_catalog();
        let filtered =
            apply_contextual_filters("something for tomorrow", &catalog, &FilterOptions::default());
        assert_eq!(filtered.len(), catalog.len());
    }

    #[test]
    fn test_black_tie_allowlist_keeps_formalwear() {
        let catalog = vec![
            item("i1", "Black Tuxedo"),
            item("i2", "Patent Dress Shoes"),
            item("i3", "Evening Gown"),
            item("i4", "Silk Bow Tie"),
            item("i5", "White Dress Shirt"),
            item("i6", "Velvet Blazer"),
            item("i7", "Graphic Tee"),
            item("i8", "Running Sneakers"),
        ];
        let filtered =
            apply_contextual_filters("black tie gala", &catalog, &FilterOptions::default());
        let ids: Vec<&str> = filtered.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["i1", "i2", "i3", "i4", "i5", "i6"]);
    }

    #[test]
    fn test_upscale_blocks_ultra_casual_only() {
        let catalog = vec![
            item("i1", "Graphic Tee"),
            item("i2", "Zip Hoodie"),
            item("i3", "Silk Blouse"),
            item("i4", "Dark Jeans"),
            item("i5", "Distressed Jeans"),
        ];
        let filtered =
            apply_contextual_filters("fancy dinner", &catalog, &FilterOptions::default());
        let ids: Vec<&str> = filtered.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["i3", "i4"]);
    }

    #[test]
    fn test_upscale_respects_explicit_fields_over_labels() {
        let mut scored_hoodie = item("i1", "Cashmere Hoodie");
        scored_hoodie.formality_score = Some(4.0);
        let mut athleisure_shirt = item("i2", "Crisp Shirt");
        athleisure_shirt.dress_code = Some("athleisure".to_string());

        let filtered = apply_contextual_filters(
            "upscale lounge",
            &[scored_hoodie, athleisure_shirt],
            &FilterOptions::default(),
        );
        let ids: Vec<&str> = filtered.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["i1"]);
    }

    #[test]
    fn test_stages_compose_in_order() {
        let catalog = vec![
            item("i1", "Linen Shirt"),
            item("i2", "Tailored Suit"),
            item("i3", "Swim Trunks"),
            item("i4", "Leather Sandals"),
            item("i5", "Graphic Tank"),
        ];
        let filtered =
            apply_contextual_filters("beach wedding", &catalog, &FilterOptions::default());
        // Beach soft-block drops the suit; the wedding stage then drops
        // swimwear and the graphic tank from what beach kept.
        let ids: Vec<&str> = filtered.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["i1", "i4"]);
    }

    #[test]
    fn test_shoe_style_counts_as_item_text() {
        let mut dress_shoe = item("i1", "Black Leather Lace-ups");
        dress_shoe.shoe_style = Some("dress".to_string());
        let catalog = vec![
            dress_shoe,
            item("i2", "Running Sneakers"),
            item("i3", "Gym Tee"),
        ];
        let filtered = apply_contextual_filters("workout", &catalog, &FilterOptions::default());
        assert!(filtered.iter().all(|i| i.id != "i1"));
    }
}
