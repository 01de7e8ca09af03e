//! Anchor dedup, deterministic ordering, and response redaction.
//!
//! An outfit's anchor names its defining pairing: the dress, or the
//! top+bottom combination. Outfits sharing an anchor are near-duplicates
//! whatever their shoes and accessories, so only the first occurrence in
//! ranked order is marked unique. Ties in final score break on a hash of
//! seed plus anchor, which keeps the order stable within a seed and varied
//! across seeds.

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::models::{CatalogItem, OutfitCandidate, PublicItem, PublicOutfit, ScoredOutfit};
use crate::utils::hash_string;

pub const TIE_BREAKER_MOD: u32 = 1000;

/// Display name used when an item never got a label.
pub const DEFAULT_ITEM_NAME: &str = "Item";

/// Canonical key for the outfit's defining pairing. A dress defines the
/// outfit on its own; otherwise the first top and first bottom do, with the
/// literal "none" standing in for a missing slot.
pub fn anchor_for(outfit: &OutfitCandidate) -> String {
    if let Some(dress) = outfit
        .items
        .iter()
        .find(|item| item.canonical_category() == "dress")
    {
        return format!("dress:{}", dress.id);
    }
    let top = first_id_in(outfit, "tops").unwrap_or("none");
    let bottom = first_id_in(outfit, "bottoms").unwrap_or("none");
    format!("{top}+{bottom}")
}

fn first_id_in<'a>(outfit: &'a OutfitCandidate, category: &str) -> Option<&'a str> {
    outfit
        .items
        .iter()
        .find(|item| item.canonical_category() == category)
        .map(|item| item.id.as_str())
}

fn tie_breaker_for(seed: &str, anchor: &str) -> u32 {
    hash_string(&format!("{seed}{anchor}")) % TIE_BREAKER_MOD
}

/// Stamps anchors and tie-breakers, sorts by (final score desc, tie-breaker
/// desc), and marks the first occurrence of each anchor unique.
pub fn rank_outfits(mut outfits: Vec<ScoredOutfit>, seed: &str) -> Vec<ScoredOutfit> {
    for entry in outfits.iter_mut() {
        entry.anchor = anchor_for(&entry.outfit);
        entry.tie_breaker = tie_breaker_for(seed, &entry.anchor);
    }
    outfits.sort_by(|a, b| {
        b.final_score
            .partial_cmp(&a.final_score)
            .unwrap_or(Ordering::Equal)
            .then(b.tie_breaker.cmp(&a.tie_breaker))
    });

    let mut used_anchors: HashSet<String> = HashSet::new();
    for entry in outfits.iter_mut() {
        entry.unique_anchor = used_anchors.insert(entry.anchor.clone());
    }
    outfits
}

/// Picks up to `limit` outfits in ranked order, unique anchors first. When
/// uniques run short the remaining slots fill with anchor duplicates, still
/// in ranked order. No limit means the whole list.
pub fn select_top_n(outfits: &[ScoredOutfit], limit: Option<usize>) -> Vec<ScoredOutfit> {
    let Some(limit) = limit else {
        return outfits.to_vec();
    };
    let mut keep = vec![false; outfits.len()];
    let mut count = 0usize;
    for (idx, entry) in outfits.iter().enumerate() {
        if count == limit {
            break;
        }
        if entry.unique_anchor {
            keep[idx] = true;
            count += 1;
        }
    }
    if count < limit {
        for kept in keep.iter_mut() {
            if count == limit {
                break;
            }
            if !*kept {
                *kept = true;
                count += 1;
            }
        }
    }
    outfits
        .iter()
        .zip(keep)
        .filter_map(|(entry, kept)| kept.then(|| entry.clone()))
        .collect()
}

/// Projects ranked outfits to the client payload. Every internal
/// double-underscore field is dropped and items carry exactly id, name,
/// imageUrl, and category.
pub fn redact(outfits: &[ScoredOutfit]) -> Vec<PublicOutfit> {
    outfits
        .iter()
        .enumerate()
        .map(|(idx, entry)| PublicOutfit {
            id: entry.outfit.outfit_id.clone(),
            rank: idx + 1,
            summary: entry.outfit.summary.clone(),
            reasoning: entry.outfit.reasoning.clone(),
            items: entry.outfit.items.iter().map(project_item).collect(),
        })
        .collect()
}

fn project_item(item: &CatalogItem) -> PublicItem {
    let name = if item.label.trim().is_empty() {
        DEFAULT_ITEM_NAME.to_string()
    } else {
        item.label.clone()
    };
    PublicItem {
        id: item.id.clone(),
        name,
        image_url: item.display_image_url().map(str::to_string),
        category: item.main_category.clone(),
    }
}
