//! Outfit ranking and personalization pipeline.
//!
//! The engine takes a retrieved catalog, the user's feedback history, and a
//! weather snapshot. Catalog preparation filters items against the request
//! context and compiled feedback rules, then builds tiered per-category
//! pools for outfit assembly. Ranking blends stored preference signals into
//! each assembled outfit and deduplicates near-identical pairings; the
//! client payload is fully redacted. User reactions feed back through
//! ingestion into a bounded preference store, closing the loop for the next
//! request.
//!
//! [`RankingEngine`] is the single entry point; the [`services`] modules
//! are usable on their own for finer-grained composition.

pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod services;
pub mod store;
pub mod utils;

pub use config::Config;
pub use engine::{
    CatalogPreparation, CatalogRequest, CategoryPool, RankRequest, RankResponse, RankingEngine,
};
pub use error::{RankingError, Result};
pub use models::{
    BlendWeights, CatalogItem, FeedbackRow, OutfitCandidate, PublicItem, PublicOutfit,
    WeatherContext,
};
pub use store::{
    EventLog, InMemoryEventLog, InMemoryPreferenceStore, PreferenceStore, RedisEventLog,
    RedisPreferenceStore,
};
