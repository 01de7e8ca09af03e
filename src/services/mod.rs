//! Pipeline stages in request order. Weather scoring and feature extraction
//! feed the contextual and feedback filters; surviving items pool per
//! category for outfit assembly. Personalization and ranking turn assembled
//! candidates into the final order, and ingestion folds user reactions back
//! into the preference store.

pub mod contextual;
pub mod degrade;
pub mod features;
pub mod ingestion;
pub mod personalization;
pub mod pool;
pub mod ranking;
pub mod rules;
pub mod weather;

pub use ingestion::FeedbackIngestor;
pub use personalization::{PersonalizationOutcome, PersonalizationScorer, PersonalizeParams};
