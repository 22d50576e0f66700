mod common;

use effect_dispatch::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[test]
fn bounds_hold_after_every_write() {
    let mut rng = StdRng::seed_from_u64(2024);
    let mut health = Feature::new(FeatureKind::Health, 100).with_bounds(0.0, 100.0);
    let mut shield = Feature::new(FeatureKind::Shield, 10.0f32).with_bounds(-5.5, 50.0);

    for _ in 0..5_000 {
        let raw: f32 = rng.random_range(-1_000.0..1_000.0);
        if rng.random_bool(0.5) {
            health.set_value(raw).unwrap();
        } else {
            health.set_value(raw as i32).unwrap();
        }
        shield.set_value(raw).unwrap();

        let h = health.get_value::<i32>().unwrap();
        let s = shield.get_value::<f32>().unwrap();
        assert!((0..=100).contains(&h), "health escaped its range: {}", h);
        assert!((-5.5..=50.0).contains(&s), "shield escaped its range: {}", s);
    }
}

#[test]
fn bounds_hold_through_effects() {
    let catalog = common::catalog();
    let mut player = common::dispatcher(&catalog, "Player", &["CharStats"]);
    let stats = common::store(&player, &catalog, "CharStats");

    let effect = Effect::build(
        0,
        EffectKind::PermanentArea { interval: 0.0 },
        "@CharStats.1",
        "@CharStats.1 * 3 - 70",
        false,
        catalog.store_kinds(),
    )
    .unwrap();
    player.attach_modifier(&Modifier::new(90, vec![effect], false));

    for _ in 0..10 {
        player.activate_effects(0.1);
        let health = stats.borrow().get_stat_by_id::<i32>(1);
        assert!((0..=100).contains(&health));
    }
}

#[test]
fn parsed_blocks_read_back_their_literals() {
    let catalog = common::catalog();
    let stats = FeatureStore::new(&catalog, "Player", "CharStats").unwrap();
    let weapon = FeatureStore::new(&catalog, "Player", "WeaponStats").unwrap();

    assert_eq!(stats.get_stat_by_id::<i32>(1), 100);
    assert_eq!(stats.get_stat_by_id::<f32>(2), 25.5);
    assert_eq!(stats.get_stat_by_id::<f32>(3), 4.0);
    assert!(!stats.get_stat_by_id::<bool>(4));

    assert_eq!(weapon.get_stat_by_id::<i32>(1), 30);
    assert_eq!(weapon.get_stat_by_id::<f32>(2), 2.5);
    assert!(weapon.get_stat_by_id::<bool>(4));

    let enemy = FeatureStore::new(&catalog, "Enemy", "CharStats").unwrap();
    assert_eq!(enemy.get_feature_values_by_type::<f32>(FeatureKind::Health), vec![50.0]);
}

#[test]
fn unknown_owner_gets_an_empty_store() {
    let catalog = common::catalog();
    let store = FeatureStore::new(&catalog, "Nobody", "CharStats").unwrap();
    assert_eq!(store.features().count(), 0);
    assert!(matches!(
        FeatureStore::new(&catalog, "Player", "Jetpack"),
        Err(StatError::UnknownStoreKind { .. })
    ));
}

#[test]
fn economy_features_are_seeded_not_parsed() {
    let catalog = common::catalog();
    let mut stats = FeatureStore::new(&catalog, "Player", "CharStats").unwrap();
    seed_economy(&mut stats, 120, 2);

    assert_eq!(stats.get_stat_by_id::<i32>(MONEY_ATTRIBUTE), 120);
    assert_eq!(stats.get_stat_by_id::<i32>(KEYS_ATTRIBUTE), 2);
    assert!(stats.set_stat_by_id(MONEY_ATTRIBUTE, -40));
    assert_eq!(stats.get_stat_by_id::<i32>(MONEY_ATTRIBUTE), 0);
}
