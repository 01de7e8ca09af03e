use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use chrono::Utc;
use redis::aio::ConnectionManager;
use redis::Script;
use tokio::sync::Mutex;
use tracing::warn;

use super::{
    EventLog, PrefKey, PreferenceStore, StoreError, StoreResult, SCORE_MAX, SCORE_MIN,
};
use crate::models::{FeedbackEventRecord, GenerationRecord};

pub type SharedConnectionManager = Arc<Mutex<ConnectionManager>>;

/// Applies a delta to one hash field and clamps the result in a single
/// round trip. The score comes back as a string because Lua integer replies
/// would truncate fractional scores.
static ADJUST_SCRIPT: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r#"
local current = tonumber(redis.call('HGET', KEYS[1], ARGV[1]) or '0')
local updated = current + tonumber(ARGV[2])
local max = tonumber(ARGV[3])
local min = tonumber(ARGV[4])
if updated > max then updated = max end
if updated < min then updated = min end
redis.call('HSET', KEYS[1], ARGV[1], tostring(updated))
redis.call('HSET', KEYS[2], ARGV[1], ARGV[5])
return tostring(updated)
"#,
    )
});

/// Preference store backed by Redis hashes, one hash per scope.
pub struct RedisPreferenceStore {
    redis: SharedConnectionManager,
}

impl RedisPreferenceStore {
    pub async fn connect(redis_url: &str) -> StoreResult<Self> {
        let client = redis::Client::open(redis_url)?;
        let manager = ConnectionManager::new(client).await?;
        Ok(Self::new(Arc::new(Mutex::new(manager))))
    }

    pub fn new(redis: SharedConnectionManager) -> Self {
        Self { redis }
    }

    async fn connection(&self) -> ConnectionManager {
        self.redis.lock().await.clone()
    }

    async fn adjust(&self, key: String, field: &str, delta: f64) -> StoreResult<f64> {
        let mut conn = self.connection().await;
        let stored: String = ADJUST_SCRIPT
            .key(&key)
            .key(PrefKey::touched(&key))
            .arg(field)
            .arg(delta)
            .arg(SCORE_MAX)
            .arg(SCORE_MIN)
            .arg(Utc::now().timestamp())
            .invoke_async(&mut conn)
            .await?;
        stored
            .parse::<f64>()
            .map_err(|e| StoreError::Decode(format!("score at {key}/{field}: {e}")))
    }

    async fn read_hash(&self, key: String, fields: &[String]) -> StoreResult<HashMap<String, f64>> {
        if fields.is_empty() {
            return Ok(HashMap::new());
        }
        let mut conn = self.connection().await;
        let values: Vec<Option<String>> = redis::cmd("HMGET")
            .arg(&key)
            .arg(fields)
            .query_async(&mut conn)
            .await?;

        let mut scores = HashMap::with_capacity(fields.len());
        for (field, value) in fields.iter().zip(values) {
            let Some(raw) = value else { continue };
            match raw.parse::<f64>() {
                Ok(score) => {
                    scores.insert(field.clone(), score);
                }
                Err(_) => {
                    warn!(key = %key, field = %field, raw = %raw, "Skipping unparseable preference score");
                }
            }
        }
        Ok(scores)
    }
}

#[async_trait]
impl PreferenceStore for RedisPreferenceStore {
    async fn user_feature_scores(
        &self,
        user_id: &str,
        features: &[String],
    ) -> StoreResult<HashMap<String, f64>> {
        self.read_hash(PrefKey::user_features(user_id), features).await
    }

    async fn user_item_scores(
        &self,
        user_id: &str,
        item_ids: &[String],
    ) -> StoreResult<HashMap<String, f64>> {
        self.read_hash(PrefKey::user_items(user_id), item_ids).await
    }

    async fn global_feature_quality(
        &self,
        features: &[String],
    ) -> StoreResult<HashMap<String, f64>> {
        self.read_hash(PrefKey::global_features(), features).await
    }

    async fn global_item_quality(&self, item_ids: &[String]) -> StoreResult<HashMap<String, f64>> {
        self.read_hash(PrefKey::global_items(), item_ids).await
    }

    async fn adjust_user_feature(
        &self,
        user_id: &str,
        feature: &str,
        delta: f64,
    ) -> StoreResult<f64> {
        self.adjust(PrefKey::user_features(user_id), feature, delta).await
    }

    async fn adjust_user_item(
        &self,
        user_id: &str,
        item_id: &str,
        delta: f64,
    ) -> StoreResult<f64> {
        self.adjust(PrefKey::user_items(user_id), item_id, delta).await
    }

    async fn adjust_global_feature(&self, feature: &str, delta: f64) -> StoreResult<f64> {
        self.adjust(PrefKey::global_features(), feature, delta).await
    }

    async fn adjust_global_item(&self, item_id: &str, delta: f64) -> StoreResult<f64> {
        self.adjust(PrefKey::global_items(), item_id, delta).await
    }
}

/// Append-only audit log on Redis lists.
pub struct RedisEventLog {
    redis: SharedConnectionManager,
}

impl RedisEventLog {
    pub async fn connect(redis_url: &str) -> StoreResult<Self> {
        let client = redis::Client::open(redis_url)?;
        let manager = ConnectionManager::new(client).await?;
        Ok(Self::new(Arc::new(Mutex::new(manager))))
    }

    pub fn new(redis: SharedConnectionManager) -> Self {
        Self { redis }
    }

    async fn append(&self, key: String, payload: String) -> StoreResult<()> {
        let mut conn = self.redis.lock().await.clone();
        let _: i64 = redis::cmd("RPUSH")
            .arg(&key)
            .arg(payload)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl EventLog for RedisEventLog {
    async fn append_feedback(&self, record: &FeedbackEventRecord) -> StoreResult<()> {
        let payload = serde_json::to_string(record)?;
        self.append(PrefKey::feedback_events(), payload).await
    }

    async fn append_generation(&self, record: &GenerationRecord) -> StoreResult<()> {
        let payload = serde_json::to_string(record)?;
        self.append(PrefKey::generations(), payload).await
    }
}
