use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Wardrobe item as it arrives from the catalog service.
///
/// Catalog payloads come from several producers with inconsistent casing, so
/// every multi-word field accepts both the camelCase wire name and the
/// snake_case database column name. Taxonomy fields are optional; scoring
/// treats missing metadata as "no signal" rather than an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogItem {
    #[serde(alias = "item_id", alias = "itemId")]
    pub id: String,
    #[serde(default, alias = "name", alias = "title")]
    pub label: String,
    #[serde(default, alias = "main_category", alias = "category")]
    pub main_category: String,
    #[serde(default, alias = "sub_category", alias = "subCategory")]
    pub subcategory: Option<String>,
    #[serde(default, alias = "shoe_style")]
    pub shoe_style: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default, alias = "color_family")]
    pub color_family: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub material: Option<String>,
    #[serde(default, alias = "sleeve_length")]
    pub sleeve_length: Option<String>,
    #[serde(default)]
    pub layering: Option<String>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default, alias = "waterproof_rating")]
    pub waterproof_rating: Option<f32>,
    #[serde(default, alias = "rain_ok")]
    pub rain_ok: Option<bool>,
    #[serde(default, alias = "dress_code")]
    pub dress_code: Option<String>,
    #[serde(default, alias = "formality_score")]
    pub formality_score: Option<f32>,
    #[serde(default, alias = "temp_rating")]
    pub temp_rating: Option<String>,
    #[serde(default)]
    pub seasonality: Option<String>,
    #[serde(default, alias = "touched_up_image_url")]
    pub touched_up_image_url: Option<String>,
    #[serde(default, alias = "processed_image_url")]
    pub processed_image_url: Option<String>,
    #[serde(default, alias = "image_url")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    /// Session-local weather fit, stamped during catalog preparation.
    #[serde(default, alias = "weather_score")]
    pub weather_score: i32,
    /// Session-local rounded preference score, stamped during preparation.
    #[serde(default, alias = "feedback_score")]
    pub feedback_score: i32,
}

impl CatalogItem {
    /// Canonical category bucket ("tops", "bottoms", "shoes", ...).
    pub fn canonical_category(&self) -> String {
        canonical_category(&self.main_category)
    }

    /// Lowercased label, subcategory, and shoe style joined for keyword
    /// matching. Absent fields contribute nothing.
    pub fn search_text(&self) -> String {
        let mut text = self.label.to_lowercase();
        for part in [self.subcategory.as_deref(), self.shoe_style.as_deref()] {
            if let Some(part) = part {
                text.push(' ');
                text.push_str(&part.to_lowercase());
            }
        }
        text
    }

    /// First present image in display-preference order.
    pub fn display_image_url(&self) -> Option<&str> {
        self.touched_up_image_url
            .as_deref()
            .or(self.processed_image_url.as_deref())
            .or(self.image_url.as_deref())
            .or(self.image.as_deref())
    }
}

/// Maps the free-form category strings producers send into the small set of
/// buckets the pipeline reasons about. Unknown categories pass through
/// lowercased so they can still be matched exactly.
pub fn canonical_category(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    match lowered.as_str() {
        "shoe" | "shoes" | "footwear" | "sneakers" => "shoes".to_string(),
        "top" | "tops" | "shirt" | "shirts" => "tops".to_string(),
        "bottom" | "bottoms" | "pant" | "pants" => "bottoms".to_string(),
        "outerwear" | "jacket" | "jackets" | "coat" | "coats" => "outerwear".to_string(),
        "dress" | "dresses" | "gown" | "gowns" => "dress".to_string(),
        "accessory" | "accessories" => "accessories".to_string(),
        _ => lowered,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precipitation {
    None,
    Rain,
    Snow,
}

/// Weather snapshot for the rendering location. Every field is optional;
/// scoring only applies the bands whose inputs are present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherContext {
    #[serde(default, alias = "temp_f")]
    pub temp_f: Option<f32>,
    #[serde(default)]
    pub precipitation: Option<Precipitation>,
    #[serde(default, alias = "wind_mph")]
    pub wind_mph: Option<f32>,
    #[serde(default, alias = "is_indoors")]
    pub is_indoors: Option<bool>,
    #[serde(default, alias = "location_name")]
    pub location_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutfitMeta {
    #[serde(default)]
    pub occasion: Option<String>,
    #[serde(default)]
    pub style: Option<String>,
}

/// One assembled outfit candidate, before personalization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutfitCandidate {
    #[serde(alias = "id", alias = "outfit_id")]
    pub outfit_id: String,
    #[serde(default, alias = "item_ids")]
    pub item_ids: Vec<String>,
    #[serde(default, alias = "base_score", alias = "score")]
    pub base_score: f64,
    #[serde(default)]
    pub items: Vec<CatalogItem>,
    #[serde(default, alias = "title")]
    pub summary: Option<String>,
    #[serde(default)]
    pub reasoning: Option<String>,
    #[serde(default)]
    pub meta: Option<OutfitMeta>,
}

impl OutfitCandidate {
    /// All item ids the outfit references: the explicit id list plus any
    /// embedded item objects, deduplicated in first-seen order.
    pub fn all_item_ids(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        self.item_ids
            .iter()
            .cloned()
            .chain(self.items.iter().map(|item| item.id.clone()))
            .filter(|id| !id.is_empty() && seen.insert(id.clone()))
            .collect()
    }
}

/// Blend weights for the personalization boost. Each field falls back to its
/// own default, so a config document can override a single weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlendWeights {
    /// Personal feature affinity.
    #[serde(default = "default_alpha")]
    pub alpha: f64,
    /// Personal item bias.
    #[serde(default = "default_beta")]
    pub beta: f64,
    /// Novelty relative to recently shown items.
    #[serde(default = "default_gamma")]
    pub gamma: f64,
    /// Global item quality.
    #[serde(default = "default_delta")]
    pub delta: f64,
    /// Global feature quality.
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,
}

fn default_alpha() -> f64 {
    0.2
}

fn default_beta() -> f64 {
    0.3
}

fn default_gamma() -> f64 {
    0.05
}

fn default_delta() -> f64 {
    0.1
}

fn default_epsilon() -> f64 {
    0.05
}

impl Default for BlendWeights {
    fn default() -> Self {
        Self {
            alpha: default_alpha(),
            beta: default_beta(),
            gamma: default_gamma(),
            delta: default_delta(),
            epsilon: default_epsilon(),
        }
    }
}

/// Rating as stored across several producer generations: integers, floats,
/// or labels such as "like". Anything unrecognized deserializes into
/// `Other` and is treated as no signal downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RatingValue {
    Int(i64),
    Float(f64),
    Text(String),
    Other(serde_json::Value),
}

/// Tags arrive either as a JSON array or a comma/semicolon separated string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagList {
    List(Vec<String>),
    Csv(String),
    Other(serde_json::Value),
}

/// The outfit attached to a feedback row: a pre-parsed object, a JSON string,
/// or something unusable that degrades to no outfit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutfitJson {
    Parsed(OutfitCandidate),
    Raw(String),
    Other(serde_json::Value),
}

/// Raw feedback event row, used both as the ingestion payload and as the
/// shape replayed into rule compilation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRow {
    #[serde(default, alias = "request_id")]
    pub request_id: Option<String>,
    #[serde(alias = "user_id")]
    pub user_id: String,
    #[serde(default, alias = "outfit_json")]
    pub outfit_json: Option<OutfitJson>,
    #[serde(default)]
    pub rating: Option<RatingValue>,
    #[serde(default)]
    pub tags: Option<TagList>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Feedback row as persisted to the event log, with identifiers and receipt
/// time filled in. The payload fields are stored exactly as received.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackEventRecord {
    #[serde(alias = "request_id")]
    pub request_id: String,
    #[serde(alias = "user_id")]
    pub user_id: String,
    #[serde(default, alias = "outfit_json")]
    pub outfit_json: Option<OutfitJson>,
    #[serde(default)]
    pub rating: Option<RatingValue>,
    #[serde(default)]
    pub tags: Option<TagList>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(alias = "received_at")]
    pub received_at: DateTime<Utc>,
}

impl FeedbackEventRecord {
    pub fn from_row(row: &FeedbackRow) -> Self {
        Self {
            request_id: row
                .request_id
                .clone()
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            user_id: row.user_id.clone(),
            outfit_json: row.outfit_json.clone(),
            rating: row.rating.clone(),
            tags: row.tags.clone(),
            notes: row.notes.clone(),
            received_at: Utc::now(),
        }
    }
}

/// Full ranking run persisted for offline audit. Candidate dumps keep their
/// internal double-underscore fields; redaction only applies to the client
/// response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRecord {
    #[serde(alias = "request_id")]
    pub request_id: String,
    #[serde(alias = "user_id")]
    pub user_id: String,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub weather: Option<WeatherContext>,
    #[serde(default)]
    pub candidates: Vec<serde_json::Value>,
    #[serde(default)]
    pub chosen: Option<serde_json::Value>,
    #[serde(alias = "created_at")]
    pub created_at: DateTime<Utc>,
}

/// Outfit with ranking state attached. Serializes to the legacy audit shape:
/// candidate fields at the top level plus `__`-prefixed internals.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredOutfit {
    #[serde(flatten)]
    pub outfit: OutfitCandidate,
    #[serde(rename = "__weatherScore")]
    pub weather_score: i32,
    #[serde(rename = "__finalScore")]
    pub final_score: f64,
    #[serde(rename = "__anchor")]
    pub anchor: String,
    #[serde(rename = "__uniqueAnchor")]
    pub unique_anchor: bool,
    #[serde(rename = "__tieBreaker")]
    pub tie_breaker: u32,
}

impl ScoredOutfit {
    /// Wraps a candidate before personalization. The outfit-level weather
    /// score is the sum of the stamped item scores; anchor fields are filled
    /// in by the ranking pass.
    pub fn from_candidate(outfit: OutfitCandidate) -> Self {
        let weather_score = outfit.items.iter().map(|item| item.weather_score).sum();
        let base_score = outfit.base_score;
        Self {
            outfit,
            weather_score,
            final_score: base_score,
            anchor: String::new(),
            unique_anchor: false,
            tie_breaker: 0,
        }
    }
}

/// Item projection sent to clients: exactly id, name, imageUrl, category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicItem {
    pub id: String,
    pub name: String,
    pub image_url: Option<String>,
    pub category: String,
}

/// Client-facing outfit. Internal scoring fields never appear here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicOutfit {
    pub id: String,
    pub rank: usize,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub reasoning: Option<String>,
    pub items: Vec<PublicItem>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_item_accepts_both_casings() {
        let camel: CatalogItem = serde_json::from_str(
            r#"{"id":"i1","label":"Rain Shell","mainCategory":"Outerwear","rainOk":true}"#,
        )
        .unwrap();
        let snake: CatalogItem = serde_json::from_str(
            r#"{"item_id":"i1","name":"Rain Shell","main_category":"Outerwear","rain_ok":true}"#,
        )
        .unwrap();
        assert_eq!(camel.id, snake.id);
        assert_eq!(camel.label, snake.label);
        assert_eq!(camel.main_category, snake.main_category);
        assert_eq!(camel.rain_ok, Some(true));
        assert_eq!(snake.rain_ok, Some(true));
    }

    #[test]
    fn test_canonical_category_buckets() {
        assert_eq!(canonical_category("Shoes"), "shoes");
        assert_eq!(canonical_category("  Footwear "), "shoes");
        assert_eq!(canonical_category("Dresses"), "dress");
        assert_eq!(canonical_category("Swimwear"), "swimwear");
    }

    #[test]
    fn test_display_image_url_preference_chain() {
        let mut item = CatalogItem {
            id: "i1".to_string(),
            image: Some("raw.jpg".to_string()),
            image_url: Some("url.jpg".to_string()),
            processed_image_url: Some("processed.jpg".to_string()),
            touched_up_image_url: Some("touched.jpg".to_string()),
            ..Default::default()
        };
        assert_eq!(item.display_image_url(), Some("touched.jpg"));
        item.touched_up_image_url = None;
        assert_eq!(item.display_image_url(), Some("processed.jpg"));
        item.processed_image_url = None;
        assert_eq!(item.display_image_url(), Some("url.jpg"));
        item.image_url = None;
        assert_eq!(item.display_image_url(), Some("raw.jpg"));
        item.image = None;
        assert_eq!(item.display_image_url(), None);
    }

    #[test]
    fn test_all_item_ids_dedupes_in_order() {
        let outfit = OutfitCandidate {
            outfit_id: "o1".to_string(),
            item_ids: vec!["a".to_string(), "b".to_string()],
            items: vec![
                CatalogItem {
                    id: "b".to_string(),
                    ..Default::default()
                },
                CatalogItem {
                    id: "c".to_string(),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        assert_eq!(outfit.all_item_ids(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_blend_weights_partial_override() {
        let weights: BlendWeights = serde_json::from_str(r#"{"beta":0.9}"#).unwrap();
        assert_eq!(weights.beta, 0.9);
        assert_eq!(weights.alpha, 0.2);
        assert_eq!(weights.gamma, 0.05);
        assert_eq!(weights.delta, 0.1);
        assert_eq!(weights.epsilon, 0.05);
    }

    #[test]
    fn test_feedback_row_tolerates_mixed_encodings() {
        let row: FeedbackRow = serde_json::from_str(
            r#"{"user_id":"u1","rating":"like","tags":"too warm, no loafers","outfit_json":"{\"id\":\"o1\",\"itemIds\":[\"a\"]}"}"#,
        )
        .unwrap();
        assert!(matches!(row.rating, Some(RatingValue::Text(_))));
        assert!(matches!(row.tags, Some(TagList::Csv(_))));
        assert!(matches!(row.outfit_json, Some(OutfitJson::Raw(_))));

        let row: FeedbackRow = serde_json::from_str(
            r#"{"userId":"u1","rating":4,"tags":["boring"],"outfitJson":{"id":"o1"}}"#,
        )
        .unwrap();
        assert!(matches!(row.rating, Some(RatingValue::Int(4))));
        assert!(matches!(row.tags, Some(TagList::List(_))));
        assert!(matches!(row.outfit_json, Some(OutfitJson::Parsed(_))));
    }

    #[test]
    fn test_unusable_rating_degrades_to_other() {
        let row: FeedbackRow =
            serde_json::from_str(r#"{"userId":"u1","rating":{"stars":4}}"#).unwrap();
        assert!(matches!(row.rating, Some(RatingValue::Other(_))));
    }

    #[test]
    fn test_scored_outfit_serializes_legacy_audit_keys() {
        let outfit = ScoredOutfit {
            outfit: OutfitCandidate {
                outfit_id: "o1".to_string(),
                ..Default::default()
            },
            weather_score: 3,
            final_score: 1.5,
            anchor: "t1+b1".to_string(),
            unique_anchor: true,
            tie_breaker: 42,
        };
        let value = serde_json::to_value(&outfit).unwrap();
        assert_eq!(value["outfitId"], "o1");
        assert_eq!(value["__weatherScore"], 3);
        assert_eq!(value["__finalScore"], 1.5);
        assert_eq!(value["__anchor"], "t1+b1");
        assert_eq!(value["__uniqueAnchor"], true);
        assert_eq!(value["__tieBreaker"], 42);
    }

    #[test]
    fn test_feedback_event_record_fills_request_id() {
        let record = FeedbackEventRecord::from_row(&FeedbackRow {
            user_id: "u1".to_string(),
            ..Default::default()
        });
        assert!(!record.request_id.is_empty());
        assert_eq!(record.user_id, "u1");

        let record = FeedbackEventRecord::from_row(&FeedbackRow {
            request_id: Some("req-7".to_string()),
            user_id: "u1".to_string(),
            ..Default::default()
        });
        assert_eq!(record.request_id, "req-7");
    }
}
