use std::collections::HashMap;

use log::{error, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::modifiers::ItemId;
use crate::stat_error::StatResult;

pub type PoolId = i32;

/// Weighted table of catalog items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DropPool {
    pub indexes: Vec<ItemId>,
    #[serde(rename = "raritiesVal")]
    pub rarity_weights: Vec<u32>,
    pub min_drops: u32,
    pub max_drops: u32,
    #[serde(rename = "withRipetition", default)]
    pub with_repetition: bool,
}

impl DropPool {
    /// An index of `-1` means "no drop" and ends the draw.
    pub const NO_DROP: ItemId = -1;

    pub fn is_consistent(&self) -> bool {
        self.indexes.len() == self.rarity_weights.len()
    }

    /// Draws between `min_drops` and `max_drops` item ids (inclusive).
    ///
    /// Weights are renormalized before every pick, so without repetition the remaining
    /// entries keep their relative odds after one is taken.
    pub fn draw<R: Rng>(&self, rng: &mut R) -> Vec<ItemId> {
        if !self.is_consistent() {
            error!("Drop pool has {} indexes but {} weights", self.indexes.len(), self.rarity_weights.len());
            return Vec::new();
        }

        let low = self.min_drops.min(self.max_drops);
        let high = self.min_drops.max(self.max_drops);
        let count = rng.random_range(low..=high);

        let mut indexes = self.indexes.clone();
        let mut weights: Vec<f64> = self.rarity_weights.iter().map(|w| *w as f64).collect();
        let capacity = if self.with_repetition { count as usize } else { (count as usize).min(indexes.len()) };
        let mut drops = Vec::with_capacity(capacity);

        for _ in 0..count {
            let Some(slot) = sample_weighted(&weights, rng) else {
                break;
            };
            let item = indexes[slot];
            if item == Self::NO_DROP {
                break;
            }
            drops.push(item);
            if !self.with_repetition {
                indexes.remove(slot);
                weights.remove(slot);
            }
        }
        drops
    }
}

/// Weights scaled to sum to one, or `None` when nothing can be drawn.
pub fn normalize(weights: &[f64]) -> Option<Vec<f64>> {
    let total: f64 = weights.iter().filter(|w| **w > 0.0).sum();
    if total <= 0.0 {
        return None;
    }
    Some(weights.iter().map(|w| w.max(0.0) / total).collect())
}

fn sample_weighted<R: Rng>(weights: &[f64], rng: &mut R) -> Option<usize> {
    let probabilities = normalize(weights)?;
    let roll: f64 = rng.random();
    let mut cumulative = 0.0;
    for (slot, probability) in probabilities.iter().enumerate() {
        cumulative += probability;
        if roll < cumulative {
            return Some(slot);
        }
    }
    // Rounding left the roll just past the last bucket.
    probabilities.iter().rposition(|p| *p > 0.0)
}

/// Parses `{ "<poolId>": { indexes, raritiesVal, minDrops, maxDrops, withRipetition } }`.
/// Pools with a non-numeric id or mismatched lengths are logged and left out.
pub fn parse_drop_pools(json: &str) -> StatResult<HashMap<PoolId, DropPool>> {
    let raw: HashMap<String, DropPool> = serde_json::from_str(json)?;
    let mut pools = HashMap::with_capacity(raw.len());
    for (key, pool) in raw {
        let Ok(id) = key.trim().parse::<PoolId>() else {
            warn!("Skipping drop pool with non-numeric id '{}'", key);
            continue;
        };
        if !pool.is_consistent() {
            error!(
                "Skipping drop pool {}: {} indexes but {} weights",
                id,
                pool.indexes.len(),
                pool.rarity_weights.len()
            );
            continue;
        }
        pools.insert(id, pool);
    }
    Ok(pools)
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    fn pool(indexes: Vec<ItemId>, weights: Vec<u32>, min: u32, max: u32, with_repetition: bool) -> DropPool {
        DropPool { indexes, rarity_weights: weights, min_drops: min, max_drops: max, with_repetition }
    }

    #[test]
    fn normalize_sums_to_one() {
        let probabilities = normalize(&[1.0, 3.0]).unwrap();
        assert_eq!(probabilities, vec![0.25, 0.75]);
        assert!(normalize(&[0.0, 0.0]).is_none());
        assert!(normalize(&[]).is_none());
    }

    #[test]
    fn without_repetition_never_repeats() {
        let mut rng = StdRng::seed_from_u64(11);
        let pool = pool(vec![1, 2, 3], vec![5, 1, 1], 3, 3, false);
        for _ in 0..200 {
            let mut drops = pool.draw(&mut rng);
            drops.sort();
            assert_eq!(drops, vec![1, 2, 3]);
        }
    }

    #[test]
    fn draws_stop_when_pool_is_exhausted() {
        let mut rng = StdRng::seed_from_u64(5);
        let pool = pool(vec![4, 8], vec![1, 1], 5, 5, false);
        assert_eq!(pool.draw(&mut rng).len(), 2);
    }

    #[test]
    fn huge_max_drops_are_bounded_by_the_pool() {
        let mut rng = StdRng::seed_from_u64(8);
        let pool = pool(vec![4, 8], vec![1, 1], u32::MAX, u32::MAX, false);
        let mut drops = pool.draw(&mut rng);
        drops.sort();
        assert_eq!(drops, vec![4, 8]);
    }

    #[test]
    fn with_repetition_can_repeat() {
        let mut rng = StdRng::seed_from_u64(3);
        let pool = pool(vec![9], vec![1], 4, 4, true);
        assert_eq!(pool.draw(&mut rng), vec![9, 9, 9, 9]);
    }

    #[test]
    fn no_drop_sentinel_ends_the_draw() {
        let mut rng = StdRng::seed_from_u64(1);
        let pool = pool(vec![DropPool::NO_DROP, 12], vec![1, 0], 3, 3, false);
        assert!(pool.draw(&mut rng).is_empty());
    }

    #[test]
    fn count_stays_within_bounds() {
        let mut rng = StdRng::seed_from_u64(99);
        let pool = pool(vec![1, 2, 3, 4, 5], vec![1, 1, 1, 1, 1], 1, 3, true);
        for _ in 0..500 {
            let drops = pool.draw(&mut rng);
            assert!((1..=3).contains(&drops.len()));
        }
    }

    #[test]
    fn parses_pool_json() {
        let json = r#"{
            "1": { "indexes": [10, 20], "raritiesVal": [1, 3], "minDrops": 1, "maxDrops": 1, "withRipetition": false },
            "2": { "indexes": [10], "raritiesVal": [1, 3], "minDrops": 1, "maxDrops": 1 },
            "boss": { "indexes": [], "raritiesVal": [], "minDrops": 0, "maxDrops": 0 }
        }"#;
        let pools = parse_drop_pools(json).unwrap();
        assert_eq!(pools.len(), 1);
        assert_eq!(pools[&1].rarity_weights, vec![1, 3]);
        assert!(!pools[&1].with_repetition);
    }
}
