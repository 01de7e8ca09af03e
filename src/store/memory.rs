use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::Mutex;

use super::{clamp_score, EventLog, PreferenceRecord, PreferenceStore, StoreResult};
use crate::models::{FeedbackEventRecord, GenerationRecord};

/// In-memory preference store backed by `DashMap`.
///
/// Used by tests and single-process deployments. The entry API holds the
/// shard lock across the read-modify-write, which gives the same atomicity
/// the Redis script provides.
#[derive(Debug, Default)]
pub struct InMemoryPreferenceStore {
    user_features: DashMap<(String, String), PreferenceRecord>,
    user_items: DashMap<(String, String), PreferenceRecord>,
    global_features: DashMap<String, PreferenceRecord>,
    global_items: DashMap<String, PreferenceRecord>,
}

impl InMemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn adjust_scoped(
        map: &DashMap<(String, String), PreferenceRecord>,
        scope: &str,
        key: &str,
        delta: f64,
    ) -> f64 {
        let mut entry = map
            .entry((scope.to_string(), key.to_string()))
            .or_insert_with(|| PreferenceRecord {
                score: 0.0,
                updated_at: Utc::now(),
            });
        entry.score = clamp_score(entry.score + delta);
        entry.updated_at = Utc::now();
        entry.score
    }

    fn adjust_flat(map: &DashMap<String, PreferenceRecord>, key: &str, delta: f64) -> f64 {
        let mut entry = map.entry(key.to_string()).or_insert_with(|| PreferenceRecord {
            score: 0.0,
            updated_at: Utc::now(),
        });
        entry.score = clamp_score(entry.score + delta);
        entry.updated_at = Utc::now();
        entry.score
    }

    fn read_scoped(
        map: &DashMap<(String, String), PreferenceRecord>,
        scope: &str,
        keys: &[String],
    ) -> HashMap<String, f64> {
        keys.iter()
            .filter_map(|key| {
                map.get(&(scope.to_string(), key.clone()))
                    .map(|record| (key.clone(), record.score))
            })
            .collect()
    }

    fn read_flat(map: &DashMap<String, PreferenceRecord>, keys: &[String]) -> HashMap<String, f64> {
        keys.iter()
            .filter_map(|key| map.get(key).map(|record| (key.clone(), record.score)))
            .collect()
    }

    /// Current score for one user feature, if any. Test helper.
    pub fn user_feature(&self, user_id: &str, feature: &str) -> Option<f64> {
        self.user_features
            .get(&(user_id.to_string(), feature.to_string()))
            .map(|record| record.score)
    }

    /// Current score for one user item, if any. Test helper.
    pub fn user_item(&self, user_id: &str, item_id: &str) -> Option<f64> {
        self.user_items
            .get(&(user_id.to_string(), item_id.to_string()))
            .map(|record| record.score)
    }
}

#[async_trait]
impl PreferenceStore for InMemoryPreferenceStore {
    async fn user_feature_scores(
        &self,
        user_id: &str,
        features: &[String],
    ) -> StoreResult<HashMap<String, f64>> {
        Ok(Self::read_scoped(&self.user_features, user_id, features))
    }

    async fn user_item_scores(
        &self,
        user_id: &str,
        item_ids: &[String],
    ) -> StoreResult<HashMap<String, f64>> {
        Ok(Self::read_scoped(&self.user_items, user_id, item_ids))
    }

    async fn global_feature_quality(
        &self,
        features: &[String],
    ) -> StoreResult<HashMap<String, f64>> {
        Ok(Self::read_flat(&self.global_features, features))
    }

    async fn global_item_quality(&self, item_ids: &[String]) -> StoreResult<HashMap<String, f64>> {
        Ok(Self::read_flat(&self.global_items, item_ids))
    }

    async fn adjust_user_feature(
        &self,
        user_id: &str,
        feature: &str,
        delta: f64,
    ) -> StoreResult<f64> {
        Ok(Self::adjust_scoped(&self.user_features, user_id, feature, delta))
    }

    async fn adjust_user_item(
        &self,
        user_id: &str,
        item_id: &str,
        delta: f64,
    ) -> StoreResult<f64> {
        Ok(Self::adjust_scoped(&self.user_items, user_id, item_id, delta))
    }

    async fn adjust_global_feature(&self, feature: &str, delta: f64) -> StoreResult<f64> {
        Ok(Self::adjust_flat(&self.global_features, feature, delta))
    }

    async fn adjust_global_item(&self, item_id: &str, delta: f64) -> StoreResult<f64> {
        Ok(Self::adjust_flat(&self.global_items, item_id, delta))
    }
}

/// In-memory append-only log with inspection helpers for tests.
#[derive(Debug, Default)]
pub struct InMemoryEventLog {
    feedback: Mutex<Vec<FeedbackEventRecord>>,
    generations: Mutex<Vec<GenerationRecord>>,
}

impl InMemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn feedback_events(&self) -> Vec<FeedbackEventRecord> {
        self.feedback.lock().await.clone()
    }

    pub async fn generations(&self) -> Vec<GenerationRecord> {
        self.generations.lock().await.clone()
    }
}

#[async_trait]
impl EventLog for InMemoryEventLog {
    async fn append_feedback(&self, record: &FeedbackEventRecord) -> StoreResult<()> {
        self.feedback.lock().await.push(record.clone());
        Ok(())
    }

    async fn append_generation(&self, record: &GenerationRecord) -> StoreResult<()> {
        self.generations.lock().await.push(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use futures::future::join_all;

    use super::*;
    use crate::store::{SCORE_MAX, SCORE_MIN};

    #[tokio::test]
    async fn test_adjust_accumulates_and_clamps() {
        let store = InMemoryPreferenceStore::new();
        for _ in 0..4 {
            store.adjust_user_item("u1", "i1", 2.0).await.unwrap();
        }
        assert_eq!(store.user_item("u1", "i1"), Some(SCORE_MAX));

        for _ in 0..8 {
            store.adjust_user_item("u1", "i1", -2.0).await.unwrap();
        }
        assert_eq!(store.user_item("u1", "i1"), Some(SCORE_MIN));
    }

    #[tokio::test]
    async fn test_reads_omit_missing_keys() {
        let store = InMemoryPreferenceStore::new();
        store.adjust_user_feature("u1", "color:navy", 1.0).await.unwrap();

        let keys = vec!["color:navy".to_string(), "brand:acme".to_string()];
        let scores = store.user_feature_scores("u1", &keys).await.unwrap();
        assert_eq!(scores.len(), 1);
        assert_eq!(scores.get("color:navy"), Some(&1.0));
        assert!(!scores.contains_key("brand:acme"));
    }

    #[tokio::test]
    async fn test_scores_are_scoped_per_user() {
        let store = InMemoryPreferenceStore::new();
        store.adjust_user_item("u1", "i1", 2.0).await.unwrap();

        let keys = vec!["i1".to_string()];
        let other = store.user_item_scores("u2", &keys).await.unwrap();
        assert!(other.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_adjustments_do_not_lose_updates() {
        let store = Arc::new(InMemoryPreferenceStore::new());
        let tasks: Vec<_> = (0..10)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    store.adjust_global_item("i1", 0.3).await.unwrap();
                })
            })
            .collect();
        join_all(tasks).await;

        let keys = vec!["i1".to_string()];
        let scores = store.global_item_quality(&keys).await.unwrap();
        let total = scores.get("i1").copied().unwrap_or_default();
        assert!((total - 3.0).abs() < 1e-9, "expected 3.0, got {total}");
    }

    #[tokio::test]
    async fn test_event_log_preserves_append_order() {
        let log = InMemoryEventLog::new();
        for idx in 0..3 {
            let record = FeedbackEventRecord::from_row(&crate::models::FeedbackRow {
                request_id: Some(format!("req-{idx}")),
                user_id: "u1".to_string(),
                ..Default::default()
            });
            log.append_feedback(&record).await.unwrap();
        }

        let events = log.feedback_events().await;
        let ids: Vec<_> = events.iter().map(|e| e.request_id.as_str()).collect();
        assert_eq!(ids, vec!["req-0", "req-1", "req-2"]);
    }
}
