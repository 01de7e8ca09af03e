//! Tolerant normalization of heterogeneous feedback fields.
//!
//! Ratings, tags, and outfit JSON arrive in the encodings of several
//! producer generations. Each normalizer returns a typed optional and never
//! fails; ambiguity stops here instead of leaking into rule compilation.

use tracing::debug;

use crate::models::{OutfitCandidate, OutfitJson, RatingValue, TagList};

/// Rating after normalization. Numeric ratings use the 1..5 star scale;
/// legacy labels map to `Like`/`Dislike`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rating {
    Like,
    Dislike,
    Stars(u8),
}

impl Rating {
    /// Preference delta for this rating. Three stars is neutral and moves
    /// nothing; one star carries the same weight as a legacy dislike.
    pub fn delta(self) -> f64 {
        match self {
            Rating::Like => 1.0,
            Rating::Dislike => -1.0,
            Rating::Stars(1) => -1.0,
            Rating::Stars(stars) => (f64::from(stars) - 3.0) * 0.7,
        }
    }

    /// True for explicit negative signals that justify item-id bans.
    pub fn is_dislike(self) -> bool {
        matches!(self, Rating::Dislike | Rating::Stars(1))
    }
}

/// Maps any supported rating encoding to a `Rating`. Unknown encodings
/// yield `None`, which downstream treats as "no signal".
pub fn normalize_rating(value: &RatingValue) -> Option<Rating> {
    match value {
        RatingValue::Int(n) => rating_from_int(*n),
        RatingValue::Float(f) if f.fract() == 0.0 => rating_from_int(*f as i64),
        RatingValue::Float(_) => None,
        RatingValue::Text(text) => {
            let text = text.trim().to_lowercase();
            match text.as_str() {
                "like" | "liked" | "love" => Some(Rating::Like),
                "dislike" | "disliked" | "hate" => Some(Rating::Dislike),
                _ => text.parse::<i64>().ok().and_then(rating_from_int),
            }
        }
        RatingValue::Other(_) => None,
    }
}

fn rating_from_int(n: i64) -> Option<Rating> {
    match n {
        -1 => Some(Rating::Dislike),
        1..=5 => Some(Rating::Stars(n as u8)),
        _ => None,
    }
}

/// Flattens either tag encoding into trimmed, non-empty strings.
pub fn normalize_tags(tags: &TagList) -> Vec<String> {
    match tags {
        TagList::List(items) => items
            .iter()
            .map(|tag| tag.trim().to_string())
            .filter(|tag| !tag.is_empty())
            .collect(),
        TagList::Csv(raw) => raw
            .split([',', ';'])
            .map(|tag| tag.trim().to_string())
            .filter(|tag| !tag.is_empty())
            .collect(),
        TagList::Other(_) => Vec::new(),
    }
}

/// Resolves the attached outfit, whatever shape it arrived in. Parse
/// failures degrade to `None` rather than failing the row.
pub fn normalize_outfit(json: &OutfitJson) -> Option<OutfitCandidate> {
    match json {
        OutfitJson::Parsed(outfit) => Some(outfit.clone()),
        OutfitJson::Raw(text) => match serde_json::from_str(text) {
            Ok(outfit) => Some(outfit),
            Err(err) => {
                debug!(error = %err, "Discarding unparseable outfit_json string");
                None
            }
        },
        OutfitJson::Other(value) => serde_json::from_value(value.clone()).ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_encodings_normalize() {
        assert_eq!(
            normalize_rating(&RatingValue::Text("like".to_string())),
            Some(Rating::Like)
        );
        assert_eq!(
            normalize_rating(&RatingValue::Text(" Dislike ".to_string())),
            Some(Rating::Dislike)
        );
        assert_eq!(normalize_rating(&RatingValue::Int(-1)), Some(Rating::Dislike));
        assert_eq!(normalize_rating(&RatingValue::Int(4)), Some(Rating::Stars(4)));
        assert_eq!(normalize_rating(&RatingValue::Float(5.0)), Some(Rating::Stars(5)));
        assert_eq!(
            normalize_rating(&RatingValue::Text("2".to_string())),
            Some(Rating::Stars(2))
        );
    }

    #[test]
    fn test_unknown_ratings_are_no_signal() {
        assert_eq!(normalize_rating(&RatingValue::Int(0)), None);
        assert_eq!(normalize_rating(&RatingValue::Int(7)), None);
        assert_eq!(normalize_rating(&RatingValue::Float(4.5)), None);
        assert_eq!(normalize_rating(&RatingValue::Text("meh".to_string())), None);
        assert_eq!(
            normalize_rating(&RatingValue::Other(serde_json::json!({"stars": 4}))),
            None
        );
    }

    #[test]
    fn test_delta_table() {
        assert_eq!(Rating::Like.delta(), 1.0);
        assert_eq!(Rating::Dislike.delta(), -1.0);
        assert_eq!(Rating::Stars(1).delta(), -1.0);
        assert_eq!(Rating::Stars(2).delta(), -0.7);
        assert_eq!(Rating::Stars(3).delta(), 0.0);
        assert_eq!(Rating::Stars(4).delta(), 0.7);
        assert_eq!(Rating::Stars(5).delta(), 1.4);
    }

    #[test]
    fn test_one_star_counts_as_dislike() {
        assert!(Rating::Stars(1).is_dislike());
        assert!(Rating::Dislike.is_dislike());
        assert!(!Rating::Stars(2).is_dislike());
        assert!(!Rating::Like.is_dislike());
    }

    #[test]
    fn test_tags_from_list_and_csv() {
        let list = TagList::List(vec![" too warm ".to_string(), String::new(), "boring".to_string()]);
        assert_eq!(normalize_tags(&list), vec!["too warm", "boring"]);

        let csv = TagList::Csv("no loafers; too tight,  ".to_string());
        assert_eq!(normalize_tags(&csv), vec!["no loafers", "too tight"]);

        let other = TagList::Other(serde_json::json!(42));
        assert!(normalize_tags(&other).is_empty());
    }

    #[test]
    fn test_outfit_json_shapes() {
        let parsed = OutfitJson::Parsed(OutfitCandidate {
            outfit_id: "o1".to_string(),
            ..Default::default()
        });
        assert_eq!(normalize_outfit(&parsed).unwrap().outfit_id, "o1");

        let raw = OutfitJson::Raw(r#"{"id":"o2","itemIds":["a","b"]}"#.to_string());
        let outfit = normalize_outfit(&raw).unwrap();
        assert_eq!(outfit.outfit_id, "o2");
        assert_eq!(outfit.item_ids, vec!["a", "b"]);

        let garbage = OutfitJson::Raw("not json {".to_string());
        assert!(normalize_outfit(&garbage).is_none());

        let unusable = OutfitJson::Other(serde_json::json!({"foo": "bar"}));
        assert!(normalize_outfit(&unusable).is_none());
    }
}
