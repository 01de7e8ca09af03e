//! Canonical preference-feature extraction.
//!
//! Features are `"key:value"` strings matched against the preference store.
//! Values are used as stored on the item so the keys line up with what
//! ingestion wrote from earlier feedback.

use std::collections::HashSet;

use crate::models::OutfitCandidate;

/// Derives the feature set for an outfit from its items plus outfit-level
/// meta. Missing and empty values are silently skipped; the result is a
/// set, so repeated attributes collapse.
pub fn extract_features(outfit: &OutfitCandidate) -> HashSet<String> {
    let mut features = HashSet::new();

    for item in &outfit.items {
        push(
            &mut features,
            "color",
            item.color_family.as_deref().or(item.color.as_deref()),
        );
        push(&mut features, "pattern", item.pattern.as_deref());
        push(&mut features, "main_category", some_non_empty(&item.main_category));
        push(&mut features, "dress_code", item.dress_code.as_deref());
        push(&mut features, "brand", item.brand.as_deref());
        push(&mut features, "temp", item.temp_rating.as_deref());
        push(&mut features, "seasonality", item.seasonality.as_deref());
    }

    if let Some(meta) = &outfit.meta {
        push(&mut features, "occasion", meta.occasion.as_deref());
        push(&mut features, "style", meta.style.as_deref());
    }

    features
}

fn push(features: &mut HashSet<String>, key: &str, value: Option<&str>) {
    if let Some(value) = value {
        let value = value.trim();
        if !value.is_empty() {
            features.insert(format!("{key}:{value}"));
        }
    }
}

fn some_non_empty(value: &str) -> Option<&str> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}
