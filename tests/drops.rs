mod common;

use std::collections::HashMap;
use std::sync::Arc;

use effect_dispatch::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;

fn manager() -> ItemManager {
    ItemManager::new(Arc::new(common::catalog()), MemorySettings::new())
}

#[test]
fn weights_set_the_drop_rate() {
    let manager = manager();
    let mut rng = StdRng::seed_from_u64(0xD20);
    let draws = 10_000;

    let mut rare = 0;
    for _ in 0..draws {
        let drops = manager.drop_from_pool(1, &mut rng).unwrap();
        assert_eq!(drops.len(), 1);
        if drops[0].id() == 20 {
            rare += 1;
        }
    }

    let share = rare as f64 / draws as f64;
    assert!((share - 0.75).abs() <= 0.03, "item 20 dropped {:.3} of the time", share);
}

#[test]
fn equal_weights_give_uniform_permutations() {
    let manager = manager();
    let mut rng = StdRng::seed_from_u64(77);
    let draws = 24_000;

    let mut counts: HashMap<Vec<ItemId>, u32> = HashMap::new();
    for _ in 0..draws {
        let order: Vec<ItemId> = manager.drop_from_pool(2, &mut rng).unwrap().iter().map(|item| item.id()).collect();
        assert_eq!(order.len(), 4);
        *counts.entry(order).or_default() += 1;
    }

    // 4! orderings, each expected 1,000 times
    assert_eq!(counts.len(), 24);
    for (order, count) in &counts {
        assert!((800..=1_200).contains(count), "{:?} drawn {} times", order, count);
    }
}

#[test]
fn seeded_draws_repeat() {
    let manager = manager();
    let run = |seed| {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..50)
            .map(|_| manager.drop_from_pool(2, &mut rng).unwrap().iter().map(|i| i.id()).collect::<Vec<_>>())
            .collect::<Vec<_>>()
    };
    assert_eq!(run(9), run(9));
}

#[test]
fn unknown_pool_is_an_error() {
    let manager = manager();
    let mut rng = StdRng::seed_from_u64(1);
    assert!(matches!(manager.drop_from_pool(404, &mut rng), Err(StatError::UnknownPool { pool_id: 404 })));
}
