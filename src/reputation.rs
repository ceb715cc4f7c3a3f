//! Sender reputation: (domain, local part) -> trust score.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::Result;
use crate::store;
use crate::types::{SCORE_MAX, SCORE_MIN};

/// Persistent sender scores, grouped by domain.
///
/// Loaded whole, mutated in memory, written back whole. Entries are never
/// removed; `record` is the only mutator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReputationStore {
    #[serde(default)]
    senders: BTreeMap<String, BTreeMap<String, i64>>,
}

/// Clamp a raw score into the supported range.
pub fn clamp_score(score: i64) -> i64 {
    score.clamp(SCORE_MIN, SCORE_MAX)
}

/// `round((old + observed) / 2)` with halves rounded away from zero.
fn blend(old: i64, observed: i64) -> i64 {
    let sum = old + observed;
    if sum >= 0 { (sum + 1) / 2 } else { (sum - 1) / 2 }
}

impl ReputationStore {
    pub fn load(path: &Path) -> Self {
        store::load_or_default(path)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        store::save(path, self)
    }

    pub fn lookup(&self, domain: &str, local_part: &str) -> Option<i64> {
        self.senders.get(domain)?.get(local_part).copied()
    }

    /// Blend an observed score into the entry, or create it.
    /// Returns the stored value.
    pub fn record(&mut self, domain: &str, local_part: &str, observed: i64) -> i64 {
        let observed = clamp_score(observed);
        let slot = self
            .senders
            .entry(domain.to_string())
            .or_default()
            .entry(local_part.to_string())
            .or_insert(observed);
        *slot = blend(*slot, observed);
        *slot
    }

    pub fn len(&self) -> usize {
        self.senders.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
