pub mod memory;
pub mod redis;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{FeedbackEventRecord, GenerationRecord};

pub use memory::{InMemoryEventLog, InMemoryPreferenceStore};
pub use self::redis::{RedisEventLog, RedisPreferenceStore, SharedConnectionManager};

/// Preference scores are clamped into this band so no single user or item
/// can accumulate unbounded influence.
pub const SCORE_MIN: f64 = -5.0;
pub const SCORE_MAX: f64 = 5.0;

pub fn clamp_score(score: f64) -> f64 {
    score.clamp(SCORE_MIN, SCORE_MAX)
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Decode error: {0}")]
    Decode(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// One stored preference cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreferenceRecord {
    pub score: f64,
    pub updated_at: DateTime<Utc>,
}

/// Bounded per-user and global preference state.
///
/// Reads return only the keys that exist; callers treat missing keys as
/// zero. Adjustments are atomic read-modify-write operations that clamp
/// into [`SCORE_MIN`, `SCORE_MAX`] at the storage layer, so concurrent
/// feedback for the same key can interleave without racing past the bounds.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    async fn user_feature_scores(
        &self,
        user_id: &str,
        features: &[String],
    ) -> StoreResult<HashMap<String, f64>>;

    async fn user_item_scores(
        &self,
        user_id: &str,
        item_ids: &[String],
    ) -> StoreResult<HashMap<String, f64>>;

    async fn global_feature_quality(
        &self,
        features: &[String],
    ) -> StoreResult<HashMap<String, f64>>;

    async fn global_item_quality(
        &self,
        item_ids: &[String],
    ) -> StoreResult<HashMap<String, f64>>;

    /// Applies `delta` and clamps. Returns the score now stored.
    async fn adjust_user_feature(
        &self,
        user_id: &str,
        feature: &str,
        delta: f64,
    ) -> StoreResult<f64>;

    async fn adjust_user_item(&self, user_id: &str, item_id: &str, delta: f64)
        -> StoreResult<f64>;

    async fn adjust_global_feature(&self, feature: &str, delta: f64) -> StoreResult<f64>;

    async fn adjust_global_item(&self, item_id: &str, delta: f64) -> StoreResult<f64>;
}

/// Append-only audit log. Append order is the replay order.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventLog: Send + Sync {
    async fn append_feedback(&self, record: &FeedbackEventRecord) -> StoreResult<()>;

    async fn append_generation(&self, record: &GenerationRecord) -> StoreResult<()>;
}

/// Key builders for the Redis layout. Versioned so a layout change can roll
/// out alongside live data.
pub struct PrefKey;

impl PrefKey {
    pub const VERSION: &'static str = "v1";

    /// Hash of feature -> score for one user.
    pub fn user_features(user_id: &str) -> String {
        format!("prefs:{}:user:{}:features", Self::VERSION, user_id)
    }

    /// Hash of item id -> score for one user.
    pub fn user_items(user_id: &str) -> String {
        format!("prefs:{}:user:{}:items", Self::VERSION, user_id)
    }

    pub fn global_features() -> String {
        format!("prefs:{}:global:features", Self::VERSION)
    }

    pub fn global_items() -> String {
        format!("prefs:{}:global:items", Self::VERSION)
    }

    /// Shadow hash of field -> last-update unix timestamp for a score hash.
    pub fn touched(score_key: &str) -> String {
        format!("{score_key}:ts")
    }

    pub fn feedback_events() -> String {
        format!("events:{}:feedback", Self::VERSION)
    }

    pub fn generations() -> String {
        format!("events:{}:generations", Self::VERSION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_score_band() {
        assert_eq!(clamp_score(7.3), SCORE_MAX);
        assert_eq!(clamp_score(-9.0), SCORE_MIN);
        assert_eq!(clamp_score(1.25), 1.25);
    }

    #[test]
    fn test_pref_keys_are_namespaced_per_user() {
        assert_eq!(PrefKey::user_features("u1"), "prefs:v1:user:u1:features");
        assert_eq!(PrefKey::user_items("u1"), "prefs:v1:user:u1:items");
        assert_ne!(PrefKey::user_features("u1"), PrefKey::user_features("u2"));
    }

    #[test]
    fn test_touched_key_shadows_score_key() {
        let key = PrefKey::global_items();
        assert_eq!(PrefKey::touched(&key), format!("{key}:ts"));
    }
}
