//! Free-text rule extraction from feedback tags and notes.
//!
//! This is deliberately shallow pattern matching over a small vocabulary,
//! not NLP. A phrase like "no red shoes" compiles to a color-on-category
//! ban; "ban acme sneakers" to a scoped brand ban; garment keywords such as
//! "loafers" to substring bans whether or not the phrase is negated.

use std::sync::LazyLock;

use regex::Regex;

use super::{FeedbackRule, TextField};
use crate::utils::contains_word;

static NEGATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:no|not|avoid|without|exclude|ban|don'?t|never)\b")
        .expect("negation pattern must compile")
});

static BAN_BRAND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bban\s+([a-z0-9][a-z0-9'&.-]*(?:\s+[a-z0-9][a-z0-9'&.-]*)?)")
        .expect("brand ban pattern must compile")
});

/// Single-token color vocabulary recognized in feedback text.
const COLOR_WORDS: &[&str] = &[
    "black", "white", "grey", "gray", "beige", "tan", "cream", "ivory", "brown",
    "red", "orange", "yellow", "green", "olive", "teal", "blue", "navy",
    "purple", "lavender", "pink", "maroon", "burgundy", "gold", "silver",
    "khaki",
];

/// Category aliases mapped to the canonical bucket names used by
/// `CatalogItem::canonical_category`.
const CATEGORY_ALIASES: &[(&str, &[&str])] = &[
    (
        "shoes",
        &["shoe", "shoes", "sneakers", "boots", "footwear", "heels", "sandals", "loafers"],
    ),
    (
        "tops",
        &["top", "tops", "shirt", "shirts", "tee", "tees", "blouse", "blouses", "sweater", "sweaters"],
    ),
    (
        "bottoms",
        &["pants", "trousers", "jeans", "bottoms", "shorts", "skirt", "skirts", "chinos", "slacks"],
    ),
    (
        "outerwear",
        &["jacket", "jackets", "coat", "coats", "outerwear", "blazer", "blazers", "parka"],
    ),
    ("dress", &["dress", "dresses", "gown", "gowns"]),
    (
        "accessories",
        &["accessory", "accessories", "bag", "bags", "hat", "hats", "scarf", "scarves", "belt", "belts"],
    ),
];

/// Garment keywords that always compile to substring bans when mentioned.
/// Shoppers rarely name a subcategory unless they want less of it; the
/// softening ladder absorbs the occasional misread.
const SUBCATEGORY_KEYWORDS: &[(&str, &[&str], TextField, Option<&str>)] = &[
    ("loafer", &["loafer", "loafers"], TextField::Subcategory, Some("shoes")),
    (
        "sneaker",
        &["sneaker", "sneakers", "trainer", "trainers"],
        TextField::Subcategory,
        Some("shoes"),
    ),
    ("hoodie", &["hoodie", "hoodies"], TextField::Label, None),
];

/// Compiles whatever rules one tag or note supports. Order is stable:
/// color bans, then brand bans, then subcategory bans.
pub fn extract_rules_from_text(text: &str) -> Vec<FeedbackRule> {
    let lowered = text.to_lowercase();
    if lowered.trim().is_empty() {
        return Vec::new();
    }

    let mut rules = Vec::new();
    let negated = NEGATION.is_match(&lowered);
    let category = detected_category(&lowered);

    if negated {
        for color in COLOR_WORDS.iter().filter(|c| contains_word(&lowered, c)) {
            rules.push(match category {
                Some(cat) => FeedbackRule::ExcludeColorOnCategory {
                    color: (*color).to_string(),
                    category: cat.to_string(),
                },
                None => FeedbackRule::ExcludeColor {
                    color: (*color).to_string(),
                },
            });
        }
    }

    if let Some(rule) = extract_brand_ban(&lowered) {
        rules.push(rule);
    }

    for (needle, keywords, field, scope) in SUBCATEGORY_KEYWORDS {
        if keywords.iter().any(|keyword| contains_word(&lowered, keyword)) {
            rules.push(FeedbackRule::ExcludeSubstring {
                field: *field,
                needle: (*needle).to_string(),
                category: scope.map(str::to_string),
            });
        }
    }

    rules
}

fn detected_category(text: &str) -> Option<&'static str> {
    CATEGORY_ALIASES
        .iter()
        .find(|(_, aliases)| aliases.iter().any(|alias| contains_word(text, alias)))
        .map(|(canonical, _)| *canonical)
}

fn alias_category(word: &str) -> Option<&'static str> {
    CATEGORY_ALIASES
        .iter()
        .find(|(_, aliases)| aliases.contains(&word))
        .map(|(canonical, _)| *canonical)
}

fn is_garment_word(word: &str) -> bool {
    alias_category(word).is_some()
        || SUBCATEGORY_KEYWORDS
            .iter()
            .any(|(_, keywords, _, _)| keywords.contains(&word))
}

/// "ban <name>" with up to two name words. Color and garment words after
/// "ban" are negations handled elsewhere, not brand names; a trailing
/// garment word scopes the ban to that category instead of extending the
/// name ("ban acme sneakers" bans the brand acme within shoes).
fn extract_brand_ban(text: &str) -> Option<FeedbackRule> {
    let captured = BAN_BRAND.captures(text)?.get(1)?.as_str();
    let mut words = captured.split_whitespace();
    let first = words.next()?;
    if COLOR_WORDS.contains(&first) || is_garment_word(first) {
        return None;
    }
    let (brand, category) = match words.next() {
        Some(word) => match alias_category(word) {
            Some(canonical) => (first.to_string(), Some(canonical.to_string())),
            None if is_garment_word(word) => (first.to_string(), None),
            None => (format!("{first} {word}"), None),
        },
        None => (first.to_string(), None),
    };
    Some(FeedbackRule::ExcludeBrand { brand, category })
}
