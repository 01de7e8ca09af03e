//! Generic "try strict, then relax" filter ladder.
//!
//! Pool tiering, contextual filtering, and feedback filtering all follow the
//! same shape: run progressively weaker passes until one keeps enough items.
//! This module owns that shape so each caller only describes its passes.

use tracing::debug;

/// Floor shared by the contextual and feedback filters. Below this many
/// survivors a strict pass is considered too aggressive for the wardrobe.
pub const DEFAULT_MIN_KEEP: usize = 6;

/// One pass in a degradation ladder. `apply` is lazy; passes after the
/// adopted one never run.
pub struct Stage<'a, T> {
    pub name: &'static str,
    /// Smallest output this stage may produce and still be adopted.
    pub min_keep: usize,
    pub apply: Box<dyn Fn() -> Vec<T> + 'a>,
}

/// Runs stages in order and adopts the first output meeting its floor. When
/// none does, the last stage's output stands, however small. Returns the
/// adopted output and the index of the stage that produced it.
pub fn degrade<T>(stages: Vec<Stage<'_, T>>) -> (Vec<T>, usize) {
    let mut adopted: Vec<T> = Vec::new();
    let mut adopted_idx = 0;

    for (idx, stage) in stages.iter().enumerate() {
        let output = (stage.apply)();
        let met = output.len() >= stage.min_keep;
        debug!(
            stage = stage.name,
            kept = output.len(),
            floor = stage.min_keep,
            met,
            "Degradation stage evaluated"
        );
        adopted = output;
        adopted_idx = idx;
        if met {
            break;
        }
    }

    (adopted, adopted_idx)
}
