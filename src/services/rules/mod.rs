//! Feedback rule compilation and catalog filtering.
//!
//! Historical feedback rows compile into a flat list of [`FeedbackRule`]
//! exclusions: disliked outfits ban their member items, and free-text tags
//! and notes compile into color, brand, and subcategory bans. Filtering
//! applies every rule, then softens to explicit item bans only when the
//! strict pass leaves too little to rank.

mod extract;
mod normalize;

pub use extract::extract_rules_from_text;
pub use normalize::{normalize_outfit, normalize_rating, normalize_tags, Rating};

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::{CatalogItem, FeedbackRow};
use crate::services::degrade::{degrade, Stage, DEFAULT_MIN_KEEP};

/// Which item text a substring ban inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextField {
    Label,
    Subcategory,
}

/// One compiled exclusion. The union is closed on purpose: filtering never
/// needs to know how a rule was derived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeedbackRule {
    ExcludeItemIds {
        ids: BTreeSet<String>,
    },
    ExcludeBrand {
        brand: String,
        category: Option<String>,
    },
    ExcludeColorOnCategory {
        color: String,
        category: String,
    },
    ExcludeColor {
        color: String,
    },
    ExcludeSubstring {
        field: TextField,
        needle: String,
        category: Option<String>,
    },
}

impl FeedbackRule {
    /// Explicit per-item bans survive scarcity softening; inferred stylistic
    /// bans do not.
    pub fn is_item_ban(&self) -> bool {
        matches!(self, FeedbackRule::ExcludeItemIds { .. })
    }
}

/// Compiles one user's feedback history into exclusion rules.
///
/// Item ids from every disliked outfit coalesce into a single
/// `ExcludeItemIds` rule at the front of the list. Text-derived rules keep
/// first-seen order with exact duplicates dropped.
pub fn compile_rules(rows: &[FeedbackRow]) -> Vec<FeedbackRule> {
    let mut banned_ids: BTreeSet<String> = BTreeSet::new();
    let mut rules: Vec<FeedbackRule> = Vec::new();

    for row in rows {
        let rating = row.rating.as_ref().and_then(normalize_rating);
        if rating.is_some_and(Rating::is_dislike) {
            if let Some(outfit) = row.outfit_json.as_ref().and_then(normalize_outfit) {
                banned_ids.extend(outfit.all_item_ids());
            }
        }

        if let Some(tags) = row.tags.as_ref() {
            for tag in normalize_tags(tags) {
                push_unique(&mut rules, extract_rules_from_text(&tag));
            }
        }
        if let Some(notes) = row.notes.as_deref() {
            push_unique(&mut rules, extract_rules_from_text(notes));
        }
    }

    if !banned_ids.is_empty() {
        rules.insert(0, FeedbackRule::ExcludeItemIds { ids: banned_ids });
    }
    debug!(rule_count = rules.len(), rows = rows.len(), "Compiled feedback rules");
    rules
}

fn push_unique(rules: &mut Vec<FeedbackRule>, extracted: Vec<FeedbackRule>) {
    for rule in extracted {
        if !rules.contains(&rule) {
            rules.push(rule);
        }
    }
}

/// True when `item` is excluded by `rule`.
pub fn violates(item: &CatalogItem, rule: &FeedbackRule) -> bool {
    match rule {
        FeedbackRule::ExcludeItemIds { ids } => ids.contains(&item.id),
        FeedbackRule::ExcludeBrand { brand, category } => {
            item.brand
                .as_deref()
                .is_some_and(|b| b.eq_ignore_ascii_case(brand))
                && category_in_scope(item, category.as_deref())
        }
        FeedbackRule::ExcludeColorOnCategory { color, category } => {
            has_color(item, color) && item.canonical_category() == *category
        }
        FeedbackRule::ExcludeColor { color } => has_color(item, color),
        FeedbackRule::ExcludeSubstring {
            field,
            needle,
            category,
        } => {
            let text = match field {
                TextField::Label => Some(item.label.as_str()),
                TextField::Subcategory => item.subcategory.as_deref(),
            };
            text.is_some_and(|t| t.to_lowercase().contains(needle))
                && category_in_scope(item, category.as_deref())
        }
    }
}

fn has_color(item: &CatalogItem, color: &str) -> bool {
    [item.color_family.as_deref(), item.color.as_deref()]
        .into_iter()
        .flatten()
        .any(|value| value.to_lowercase().contains(color))
}

fn category_in_scope(item: &CatalogItem, category: Option<&str>) -> bool {
    category.map_or(true, |c| item.canonical_category() == c)
}

#[derive(Debug, Clone)]
pub struct FeedbackFilterOptions {
    /// Strict filtering softens when it would keep fewer items than this.
    pub min_keep: usize,
    /// When false, a non-empty strict result always stands.
    pub soften_when_below: bool,
}

impl Default for FeedbackFilterOptions {
    fn default() -> Self {
        Self {
            min_keep: DEFAULT_MIN_KEEP,
            soften_when_below: true,
        }
    }
}

/// Applies compiled rules to the catalog with scarcity softening.
///
/// Ladder: all rules, then item-id bans only, then the unfiltered catalog.
/// Explicit dislikes are the last constraint to give way, and a non-empty
/// catalog never filters to nothing.
pub fn apply_feedback_filters(
    catalog: &[CatalogItem],
    rules: &[FeedbackRule],
    options: &FeedbackFilterOptions,
) -> Vec<CatalogItem> {
    if catalog.is_empty() || rules.is_empty() {
        return catalog.to_vec();
    }

    let id_bans: Vec<&FeedbackRule> = rules.iter().filter(|rule| rule.is_item_ban()).collect();

    let strong_min = if options.soften_when_below {
        options.min_keep
    } else {
        1
    };
    let mut stages = vec![Stage {
        name: "feedback-strict",
        min_keep: strong_min,
        apply: Box::new(|| {
            catalog
                .iter()
                .filter(|item| !rules.iter().any(|rule| violates(item, rule)))
                .cloned()
                .collect()
        }),
    }];
    if options.soften_when_below {
        stages.push(Stage {
            name: "feedback-id-bans",
            min_keep: 1,
            apply: Box::new(|| {
                catalog
                    .iter()
                    .filter(|item| !id_bans.iter().any(|rule| violates(item, rule)))
                    .cloned()
                    .collect()
            }),
        });
    }
    stages.push(Stage {
        name: "feedback-identity",
        min_keep: 0,
        apply: Box::new(|| catalog.to_vec()),
    });

    let (kept, stage_idx) = degrade(stages);
    debug!(
        kept = kept.len(),
        input = catalog.len(),
        rule_count = rules.len(),
        softened = stage_idx > 0,
        "Applied feedback filters"
    );
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OutfitCandidate, OutfitJson, RatingValue, TagList};

    fn item(id: &str, label: &str, category: &str) -> CatalogItem {
        CatalogItem {
            id: id.to_string(),
            label: label.to_string(),
            main_category: category.to_string(),
            ..Default::default()
        }
    }

    fn dislike_row(outfit_id: &str, item_ids: &[&str]) -> FeedbackRow {
        FeedbackRow {
            request_id: None,
            user_id: "u1".to_string(),
            outfit_json: Some(OutfitJson::Parsed(OutfitCandidate {
                outfit_id: outfit_id.to_string(),
                item_ids: item_ids.iter().map(|id| id.to_string()).collect(),
                ..Default::default()
            })),
            rating: Some(RatingValue::Text("dislike".to_string())),
            tags: None,
            notes: None,
        }
    }

    #[test]
    fn test_disliked_outfits_coalesce_into_one_id_ban() {
        let rows = vec![
            dislike_row("o1", &["a", "b"]),
            dislike_row("o2", &["b", "c"]),
        ];
        let rules = compile_rules(&rows);
        assert_eq!(rules.len(), 1);
        assert_eq!(
            rules[0],
            FeedbackRule::ExcludeItemIds {
                ids: ["a", "b", "c"].iter().map(|s| s.to_string()).collect(),
            }
        );
    }

    #[test]
    fn test_one_star_rating_bans_items_like_a_dislike() {
        let mut row = dislike_row("o1", &["a"]);
        row.rating = Some(RatingValue::Int(1));
        let rules = compile_rules(&[row]);
        assert!(rules.iter().any(FeedbackRule::is_item_ban));
    }

    #[test]
    fn test_liked_outfits_ban_nothing() {
        let mut row = dislike_row("o1", &["a", "b"]);
        row.rating = Some(RatingValue::Text("like".to_string()));
        assert!(compile_rules(&[row]).is_empty());
    }

    #[test]
    fn test_unparseable_outfit_json_is_skipped() {
        let mut row = dislike_row("o1", &[]);
        row.outfit_json = Some(OutfitJson::Raw("{broken".to_string()));
        assert!(compile_rules(&[row]).is_empty());
    }

    #[test]
    fn test_text_rules_from_tags_and_notes_dedup() {
        let row = FeedbackRow {
            request_id: None,
            user_id: "u1".to_string(),
            outfit_json: None,
            rating: None,
            tags: Some(TagList::Csv("no red shoes, no red shoes".to_string())),
            notes: Some("no red shoes and nothing with hoodies".to_string()),
        };
        let rules = compile_rules(&[row]);
        assert_eq!(rules.len(), 2);
        assert_eq!(
            rules[0],
            FeedbackRule::ExcludeColorOnCategory {
                color: "red".to_string(),
                category: "shoes".to_string(),
            }
        );
        assert!(matches!(rules[1], FeedbackRule::ExcludeSubstring { .. }));
    }

    #[test]
    fn test_violates_brand_scoped_to_category() {
        let mut sneaker = item("s1", "Runner", "shoes");
        sneaker.brand = Some("Acme".to_string());
        let mut shirt = item("t1", "Oxford", "tops");
        shirt.brand = Some("Acme".to_string());

        let scoped = FeedbackRule::ExcludeBrand {
            brand: "acme".to_string(),
            category: Some("shoes".to_string()),
        };
        assert!(violates(&sneaker, &scoped));
        assert!(!violates(&shirt, &scoped));

        let global = FeedbackRule::ExcludeBrand {
            brand: "acme".to_string(),
            category: None,
        };
        assert!(violates(&shirt, &global));
    }

    #[test]
    fn test_violates_color_prefers_family_then_color() {
        let mut boot = item("b1", "Chelsea Boot", "shoes");
        boot.color = Some("Oxblood Red".to_string());
        let rule = FeedbackRule::ExcludeColor {
            color: "red".to_string(),
        };
        assert!(violates(&boot, &rule));

        boot.color_family = Some("brown".to_string());
        // Family says brown, but the raw color still mentions red.
        assert!(violates(&boot, &rule));
    }

    #[test]
    fn test_substring_rule_checks_its_field_only() {
        let mut loafer = item("l1", "Penny Shoe", "shoes");
        loafer.subcategory = Some("Loafers".to_string());
        let labeled = item("l2", "Suede Loafer", "shoes");

        let rule = FeedbackRule::ExcludeSubstring {
            field: TextField::Subcategory,
            needle: "loafer".to_string(),
            category: Some("shoes".to_string()),
        };
        assert!(violates(&loafer, &rule));
        assert!(!violates(&labeled, &rule));
    }

    #[test]
    fn test_filter_removes_violators_when_plenty_remains() {
        let catalog: Vec<CatalogItem> = (0..8)
            .map(|i| item(&format!("i{i}"), "Tee", "tops"))
            .collect();
        let rules = vec![FeedbackRule::ExcludeItemIds {
            ids: ["i0".to_string()].into_iter().collect(),
        }];
        let kept = apply_feedback_filters(&catalog, &rules, &FeedbackFilterOptions::default());
        assert_eq!(kept.len(), 7);
        assert!(kept.iter().all(|i| i.id != "i0"));
    }

    #[test]
    fn test_scarcity_softens_to_id_bans_only() {
        // Three items: one explicitly banned, two hoodies. Strict filtering
        // keeps nothing, so only the id ban survives.
        let mut catalog = vec![
            item("i0", "Zip Hoodie", "tops"),
            item("i1", "Pullover Hoodie", "tops"),
            item("i2", "Oxford", "tops"),
        ];
        catalog[2].id = "banned".to_string();
        let rules = vec![
            FeedbackRule::ExcludeItemIds {
                ids: ["banned".to_string()].into_iter().collect(),
            },
            FeedbackRule::ExcludeSubstring {
                field: TextField::Label,
                needle: "hoodie".to_string(),
                category: None,
            },
        ];
        let kept = apply_feedback_filters(&catalog, &rules, &FeedbackFilterOptions::default());
        assert_eq!(
            kept.iter().map(|i| i.id.as_str()).collect::<Vec<_>>(),
            vec!["i0", "i1"]
        );
    }

    #[test]
    fn test_everything_banned_falls_back_to_identity() {
        let catalog = vec![item("i0", "Tee", "tops"), item("i1", "Tee", "tops")];
        let rules = vec![FeedbackRule::ExcludeItemIds {
            ids: ["i0".to_string(), "i1".to_string()].into_iter().collect(),
        }];
        let kept = apply_feedback_filters(&catalog, &rules, &FeedbackFilterOptions::default());
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_soften_disabled_keeps_small_strict_result() {
        let catalog = vec![
            item("i0", "Zip Hoodie", "tops"),
            item("i1", "Oxford", "tops"),
        ];
        let rules = vec![FeedbackRule::ExcludeSubstring {
            field: TextField::Label,
            needle: "hoodie".to_string(),
            category: None,
        }];
        let options = FeedbackFilterOptions {
            min_keep: 6,
            soften_when_below: false,
        };
        let kept = apply_feedback_filters(&catalog, &rules, &options);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, "i1");
    }

    #[test]
    fn test_no_rules_is_identity() {
        let catalog = vec![item("i0", "Tee", "tops")];
        let kept = apply_feedback_filters(&catalog, &[], &FeedbackFilterOptions::default());
        assert_eq!(kept.len(), 1);
    }
}
