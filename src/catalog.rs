use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use log::{error, info};
use serde::Deserialize;

use crate::config::CatalogConfig;
use crate::drop_pool::{parse_drop_pools, DropPool, PoolId};
use crate::effect::{Effect, EffectKind};
use crate::feature_config::{feature_set_key, parse_feature_sets, FeatureSet};
use crate::modifiers::{EnrichedModifier, ItemId, ItemInfo, Modifier};
use crate::stat_addressing::StoreKindRegistry;
use crate::stat_error::{StatError, StatResult};

#[derive(Debug, Deserialize)]
struct ItemFile {
    #[serde(default)]
    mods: Vec<ItemEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemEntry {
    id: ItemId,
    #[serde(default)]
    name: String,
    #[serde(default)]
    in_game_price: i32,
    #[serde(default)]
    astro_credit_price: i32,
    #[serde(default)]
    description: String,
    #[serde(default)]
    game_icon_id: i32,
    #[serde(default)]
    grab_on_walk_in: bool,
    #[serde(default)]
    requires_unlocking: bool,
    #[serde(default)]
    effects: Vec<EffectEntry>,
}

#[derive(Debug, Deserialize)]
struct BulletFile {
    #[serde(default)]
    buls: Vec<BulletEntry>,
}

#[derive(Debug, Deserialize)]
struct BulletEntry {
    id: ItemId,
    #[serde(default)]
    effects: Vec<EffectEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EffectEntry {
    effect_type: String,
    target: String,
    expr: String,
    #[serde(default)]
    target_type: Option<String>,
    #[serde(default)]
    duration: Option<f32>,
    #[serde(default)]
    interval: Option<f32>,
}

fn build_effects(entries: &[EffectEntry], is_bullet: bool, registry: &StoreKindRegistry) -> StatResult<Vec<Effect>> {
    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let kind = EffectKind::from_code(&entry.effect_type, entry.duration, entry.interval)?;
            let opted_in = entry.target_type.as_deref().is_some_and(|t| t != "local");
            Effect::build(index as u32, kind, &entry.target, &entry.expr, is_bullet || opted_in, registry)
        })
        .collect()
}

fn insert_unique<T>(table: &mut HashMap<ItemId, T>, id: ItemId, value: T, table_name: &str) -> StatResult<()> {
    match table.entry(id) {
        Entry::Occupied(_) => {
            error!("Id {} already present in the {} table", id, table_name);
            Err(StatError::DuplicateItem { id, table: table_name.to_string() })
        }
        Entry::Vacant(slot) => {
            slot.insert(value);
            Ok(())
        }
    }
}

/// Parses the item catalog. Items whose effects fail to compile are logged and left
/// out; a duplicate id rejects the whole table.
pub fn parse_items(json: &str, registry: &StoreKindRegistry) -> StatResult<HashMap<ItemId, Arc<EnrichedModifier>>> {
    let file: ItemFile = serde_json::from_str(json)?;
    let mut items = HashMap::with_capacity(file.mods.len());
    let mut seen = HashSet::with_capacity(file.mods.len());

    for entry in file.mods {
        if !seen.insert(entry.id) {
            error!("Duplicate id {} in item table, aborting catalog load", entry.id);
            return Err(StatError::DuplicateItem { id: entry.id, table: "item".to_string() });
        }
        let effects = match build_effects(&entry.effects, false, registry) {
            Ok(effects) => effects,
            Err(err) => {
                error!("Skipping item {} ('{}'): {}", entry.id, entry.name, err);
                continue;
            }
        };
        let info = ItemInfo {
            name: entry.name,
            description: entry.description,
            icon_id: entry.game_icon_id,
            price: entry.in_game_price,
            astro_price: entry.astro_credit_price,
            locked: entry.requires_unlocking,
            grab_on_walk_in: entry.grab_on_walk_in,
        };
        let item = EnrichedModifier::new(Modifier::new(entry.id, effects, false), info);
        items.insert(entry.id, Arc::new(item));
    }

    Ok(items)
}

/// Parses the bullet catalog. Bullets may read external stats without opting in.
pub fn parse_bullets(json: &str, registry: &StoreKindRegistry) -> StatResult<HashMap<ItemId, Arc<Modifier>>> {
    let file: BulletFile = serde_json::from_str(json)?;
    let mut bullets = HashMap::with_capacity(file.buls.len());
    let mut seen = HashSet::with_capacity(file.buls.len());

    for entry in file.buls {
        if !seen.insert(entry.id) {
            error!("Duplicate id {} in bullet table, aborting catalog load", entry.id);
            return Err(StatError::DuplicateItem { id: entry.id, table: "bullet".to_string() });
        }
        let effects = match build_effects(&entry.effects, true, registry) {
            Ok(effects) => effects,
            Err(err) => {
                error!("Skipping bullet {}: {}", entry.id, err);
                continue;
            }
        };
        bullets.insert(entry.id, Arc::new(Modifier::new(entry.id, effects, true)));
    }

    Ok(bullets)
}

/// Every static table the effect system reads. Built once at startup and read-only
/// afterwards; share it behind an `Arc`.
#[derive(Debug, Default)]
pub struct Catalog {
    store_kinds: StoreKindRegistry,
    feature_sets: HashMap<u64, FeatureSet>,
    items: HashMap<ItemId, Arc<EnrichedModifier>>,
    bullets: HashMap<ItemId, Arc<Modifier>>,
    drop_pools: HashMap<PoolId, DropPool>,
}

impl Catalog {
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::default()
    }

    /// Loads every file named in `config`. Files that are not configured leave their
    /// table empty.
    pub fn load(config: &CatalogConfig) -> StatResult<Self> {
        let mut builder = Catalog::builder();
        for name in &config.store_kinds {
            builder = builder.store_kind(name);
        }
        if let Some(path) = &config.feature_sets {
            builder = builder.feature_sets(&read_file(path)?);
        }
        if let Some(path) = &config.items {
            builder = builder.items(&read_file(path)?)?;
        }
        if let Some(path) = &config.bullets {
            builder = builder.bullets(&read_file(path)?)?;
        }
        if let Some(path) = &config.drop_pools {
            builder = builder.drop_pools(&read_file(path)?)?;
        }

        let catalog = builder.build();
        info!(
            "Catalog loaded: {} store kinds, {} feature sets, {} items, {} bullets, {} drop pools",
            catalog.store_kinds.len(),
            catalog.feature_sets.len(),
            catalog.items.len(),
            catalog.bullets.len(),
            catalog.drop_pools.len()
        );
        Ok(catalog)
    }

    /// Builds a catalog from in-memory sources. `None` leaves that table empty.
    pub fn from_sources(
        store_kinds: &[&str],
        feature_sets: Option<&str>,
        items: Option<&str>,
        bullets: Option<&str>,
        drop_pools: Option<&str>,
    ) -> StatResult<Self> {
        let mut builder = store_kinds.iter().fold(Catalog::builder(), |builder, name| builder.store_kind(name));
        if let Some(text) = feature_sets {
            builder = builder.feature_sets(text);
        }
        if let Some(json) = items {
            builder = builder.items(json)?;
        }
        if let Some(json) = bullets {
            builder = builder.bullets(json)?;
        }
        if let Some(json) = drop_pools {
            builder = builder.drop_pools(json)?;
        }
        Ok(builder.build())
    }

    pub fn store_kinds(&self) -> &StoreKindRegistry {
        &self.store_kinds
    }

    pub fn feature_set(&self, owner_name: &str, class_name: &str) -> Option<&FeatureSet> {
        self.feature_sets.get(&feature_set_key(owner_name, class_name))
    }

    pub fn feature_set_by_hash(&self, hash: u64) -> Option<&FeatureSet> {
        self.feature_sets.get(&hash)
    }

    pub fn item(&self, id: ItemId) -> Option<&Arc<EnrichedModifier>> {
        self.items.get(&id)
    }

    pub fn items(&self) -> impl Iterator<Item = &Arc<EnrichedModifier>> {
        self.items.values()
    }

    pub fn bullet(&self, id: ItemId) -> Option<&Arc<Modifier>> {
        self.bullets.get(&id)
    }

    pub fn drop_pool(&self, id: PoolId) -> Option<&DropPool> {
        self.drop_pools.get(&id)
    }
}

fn read_file(path: &Path) -> StatResult<String> {
    fs::read_to_string(path).map_err(|err| StatError::io(path, err))
}

/// Assembles a [`Catalog`] from in-memory sources.
///
/// Store kinds must be registered before the items and bullets that reference them.
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    catalog: Catalog,
}

impl CatalogBuilder {
    pub fn store_kind(mut self, class_name: &str) -> Self {
        self.catalog.store_kinds.register(class_name);
        self
    }

    pub fn feature_sets(mut self, text: &str) -> Self {
        self.catalog.feature_sets.extend(parse_feature_sets(text));
        self
    }

    pub fn items(mut self, json: &str) -> StatResult<Self> {
        let items = parse_items(json, &self.catalog.store_kinds)?;
        for (id, item) in items {
            insert_unique(&mut self.catalog.items, id, item, "item")?;
        }
        Ok(self)
    }

    pub fn bullets(mut self, json: &str) -> StatResult<Self> {
        let bullets = parse_bullets(json, &self.catalog.store_kinds)?;
        for (id, bullet) in bullets {
            insert_unique(&mut self.catalog.bullets, id, bullet, "bullet")?;
        }
        Ok(self)
    }

    pub fn drop_pools(mut self, json: &str) -> StatResult<Self> {
        self.catalog.drop_pools.extend(parse_drop_pools(json)?);
        Ok(self)
    }

    pub fn build(self) -> Catalog {
        self.catalog
    }
}
