#![allow(dead_code)]

use effect_dispatch::prelude::*;

pub const STORE_KINDS: &[&str] = &["CharStats", "WeaponStats", "Shooter", "Target"];

pub const FEATURES: &str = "\
// player archetype
#>Player-CharStats
health=100 ID:1 range:0-100
shield=25.5 ID:2 range:0-50
speed=4.0 ID:3
invulnerable=false ID:4
##

#>Player-WeaponStats
magSize=30 ID:1 range:0-60
fireRate=2.5 ID:2
heat=0.0 ID:3 range:0-1
isAutomatic=true ID:4
##

#>Enemy-CharStats
health=50 ID:1 range:0-100
armor=3 ID:2
##
";

pub const ITEMS: &str = r#"{
    "mods": [
        {
            "id": 1, "name": "Medkit", "inGamePrice": 25, "description": "Heals",
            "gameIconId": 2, "grabOnWalkIn": true,
            "effects": [ { "effectType": "sa", "target": "@CharStats.1", "expr": "@CharStats.1 + 30" } ]
        },
        {
            "id": 2, "name": "Heatsink", "inGamePrice": 60, "astroCreditPrice": 15, "requiresUnlocking": true,
            "effects": [ { "effectType": "area", "target": "@WeaponStats.3", "expr": "@WeaponStats.3 * 0.5", "interval": 0.5 } ]
        },
        { "id": 10, "name": "Common", "effects": [] },
        { "id": 20, "name": "Rare", "effects": [] },
        { "id": 31, "name": "A", "effects": [] },
        { "id": 32, "name": "B", "effects": [] },
        { "id": 33, "name": "C", "effects": [] },
        { "id": 34, "name": "D", "effects": [] }
    ]
}"#;

pub const BULLETS: &str = r#"{
    "buls": [
        { "id": 100, "effects": [ { "effectType": "sa", "target": "!CharStats.1", "expr": "!CharStats.1 - @WeaponStats.2 * 4" } ] }
    ]
}"#;

pub const POOLS: &str = r#"{
    "1": { "indexes": [10, 20], "raritiesVal": [1, 3], "minDrops": 1, "maxDrops": 1, "withRipetition": false },
    "2": { "indexes": [31, 32, 33, 34], "raritiesVal": [1, 1, 1, 1], "minDrops": 4, "maxDrops": 4, "withRipetition": false }
}"#;

pub fn catalog() -> Catalog {
    Catalog::from_sources(STORE_KINDS, Some(FEATURES), Some(ITEMS), Some(BULLETS), Some(POOLS))
        .expect("fixture catalog should load")
}

/// A dispatcher with one store per entry of `classes`.
pub fn dispatcher(catalog: &Catalog, owner: &str, classes: &[&str]) -> EffectsDispatcher {
    let mut dispatcher = EffectsDispatcher::new(owner);
    for class in classes {
        dispatcher.create_status_class(catalog, class).expect("class should be registered");
    }
    dispatcher
}

pub fn store(dispatcher: &EffectsDispatcher, catalog: &Catalog, class: &str) -> StoreHandle {
    let id = catalog.store_kinds().id_of(class).expect("class should be registered");
    dispatcher.status_class(id).expect("store should be attached").clone()
}
