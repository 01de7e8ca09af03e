use std::env;

use anyhow::bail;

use crate::models::BlendWeights;

/// Runtime configuration, sourced from the environment with sensible
/// defaults for local development.
#[derive(Debug, Clone)]
pub struct Config {
    pub service_name: String,
    pub redis_url: String,
    /// Floor below which contextual and feedback filters degrade to their
    /// softer passes instead of starving the catalog.
    pub min_keep: usize,
    /// Probability of swapping one slot of the top outfit per request.
    pub exploration_rate: f64,
    pub blend: BlendWeights,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            service_name: env::var("SERVICE_NAME")
                .unwrap_or_else(|_| "outfit-ranking".to_string()),
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            min_keep: env::var("FILTER_MIN_KEEP")
                .unwrap_or_else(|_| "6".to_string())
                .parse()
                .expect("FILTER_MIN_KEEP must be a valid usize"),
            exploration_rate: env::var("EXPLORATION_RATE")
                .unwrap_or_else(|_| "0.1".to_string())
                .parse()
                .expect("EXPLORATION_RATE must be a valid f64"),
            blend: BlendWeights {
                alpha: env::var("BLEND_ALPHA")
                    .unwrap_or_else(|_| "0.2".to_string())
                    .parse()
                    .expect("BLEND_ALPHA must be a valid f64"),
                beta: env::var("BLEND_BETA")
                    .unwrap_or_else(|_| "0.3".to_string())
                    .parse()
                    .expect("BLEND_BETA must be a valid f64"),
                gamma: env::var("BLEND_GAMMA")
                    .unwrap_or_else(|_| "0.05".to_string())
                    .parse()
                    .expect("BLEND_GAMMA must be a valid f64"),
                delta: env::var("BLEND_DELTA")
                    .unwrap_or_else(|_| "0.1".to_string())
                    .parse()
                    .expect("BLEND_DELTA must be a valid f64"),
                epsilon: env::var("BLEND_EPSILON")
                    .unwrap_or_else(|_| "0.05".to_string())
                    .parse()
                    .expect("BLEND_EPSILON must be a valid f64"),
            },
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.min_keep == 0 {
            bail!("FILTER_MIN_KEEP must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.exploration_rate) {
            bail!(
                "EXPLORATION_RATE must be between 0.0 and 1.0, got {}",
                self.exploration_rate
            );
        }
        if !self.redis_url.starts_with("redis://") && !self.redis_url.starts_with("rediss://") {
            bail!("REDIS_URL must be a redis:// or rediss:// URL");
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "outfit-ranking".to_string(),
            redis_url: "redis://127.0.0.1:6379".to_string(),
            min_keep: 6,
            exploration_rate: 0.1,
            blend: BlendWeights::default(),
        }
    }
}
