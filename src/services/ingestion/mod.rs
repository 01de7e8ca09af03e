//! Feedback ingestion and preference updates.
//!
//! Every feedback event is appended to the audit log before any derived
//! state moves, so the preference tables can always be rebuilt by replay.
//! Only ratings with a non-zero delta touch the tables; neutral and
//! unrecognized ratings stop after the append.

use std::sync::Arc;

use futures::future::try_join_all;
use tracing::{debug, info};

use crate::error::{RankingError, Result};
use crate::models::{FeedbackEventRecord, FeedbackRow, GenerationRecord};
use crate::services::features::extract_features;
use crate::services::rules::{normalize_outfit, normalize_rating};
use crate::store::{EventLog, PreferenceStore};

/// Direct per-item reactions weigh double relative to inferred feature
/// reactions in the per-user tables. Global tables stay single-weighted so
/// one user cannot dominate the shared signal.
pub const ITEM_DELTA_MULTIPLIER: f64 = 2.0;

pub struct FeedbackIngestor {
    prefs: Arc<dyn PreferenceStore>,
    events: Arc<dyn EventLog>,
}

impl FeedbackIngestor {
    pub fn new(prefs: Arc<dyn PreferenceStore>, events: Arc<dyn EventLog>) -> Self {
        Self { prefs, events }
    }

    /// Persists the raw event, then folds it into the preference tables.
    /// If the log append fails, no preference mutation happens at all.
    pub async fn record_feedback(&self, row: &FeedbackRow) -> Result<()> {
        if row.user_id.trim().is_empty() {
            return Err(RankingError::InvalidInput(
                "user_id must not be empty".to_string(),
            ));
        }

        let record = FeedbackEventRecord::from_row(row);
        self.events.append_feedback(&record).await?;

        let delta = row
            .rating
            .as_ref()
            .and_then(normalize_rating)
            .map_or(0.0, |rating| rating.delta());
        if delta == 0.0 {
            debug!(request_id = %record.request_id, "Feedback carries no preference signal");
            return Ok(());
        }

        let Some(outfit) = row.outfit_json.as_ref().and_then(normalize_outfit) else {
            debug!(
                request_id = %record.request_id,
                "Feedback has no usable outfit; event logged only"
            );
            return Ok(());
        };

        let mut features: Vec<String> = extract_features(&outfit).into_iter().collect();
        features.sort();
        let item_ids = outfit.all_item_ids();

        // Each adjustment targets its own store cell, so the batch can land
        // in any order.
        let user_id = row.user_id.as_str();
        try_join_all(features.iter().map(|feature| async move {
            self.prefs
                .adjust_user_feature(user_id, feature, delta)
                .await?;
            self.prefs.adjust_global_feature(feature, delta).await
        }))
        .await?;
        try_join_all(item_ids.iter().map(|item_id| async move {
            self.prefs
                .adjust_user_item(user_id, item_id, delta * ITEM_DELTA_MULTIPLIER)
                .await?;
            self.prefs.adjust_global_item(item_id, delta).await
        }))
        .await?;

        info!(
            user_id = %user_id,
            request_id = %record.request_id,
            delta,
            features = features.len(),
            items = item_ids.len(),
            "Recorded feedback and updated preferences"
        );
        Ok(())
    }

    /// Append-only audit insert capturing a full ranking run. No business
    /// logic and no derived state.
    pub async fn log_generation(&self, record: &GenerationRecord) -> Result<()> {
        self.events.append_generation(record).await?;
        Ok(())
    }
}
