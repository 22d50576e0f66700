use std::collections::HashSet;
use std::sync::Arc;

use log::{debug, info, warn};
use rand::Rng;

use crate::catalog::Catalog;
use crate::dispatcher::EffectsDispatcher;
use crate::drop_pool::{DropPool, PoolId};
use crate::effect::EffectHandle;
use crate::modifiers::{EnrichedModifier, ItemId, Modifier};
use crate::settings::{MemorySettings, SettingsStore};
use crate::stat_error::{StatError, StatResult};

/// Settings key holding the meta-currency balance.
pub const ASTRO_CREDITS_KEY: &str = "astroCredits";

/// Settings key of an item's persisted unlock flag.
pub fn unlock_key(id: ItemId) -> String {
    format!("unlocked:{}", id)
}

/// Runtime front of the catalog: lookups, drops and unlock bookkeeping.
///
/// The catalog itself is never mutated. Unlocks live in an overlay that is seeded
/// from and written back to the settings store.
#[derive(Debug)]
pub struct ItemManager<S: SettingsStore = MemorySettings> {
    catalog: Arc<Catalog>,
    settings: S,
    unlocked: HashSet<ItemId>,
}

impl<S: SettingsStore> ItemManager<S> {
    pub fn new(catalog: Arc<Catalog>, settings: S) -> Self {
        let unlocked: HashSet<ItemId> = catalog
            .items()
            .filter(|item| item.info().locked)
            .map(|item| item.id())
            .filter(|id| settings.get_int(&unlock_key(*id)).unwrap_or(0) != 0)
            .collect();
        info!("Item manager ready, {} previously unlocked items", unlocked.len());
        Self { catalog, settings, unlocked }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn settings(&self) -> &S {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut S {
        &mut self.settings
    }

    pub fn item(&self, id: ItemId) -> Option<&Arc<EnrichedModifier>> {
        let item = self.catalog.item(id);
        if item.is_none() {
            warn!("Unknown item id {}", id);
        }
        item
    }

    pub fn bullet(&self, id: ItemId) -> Option<&Arc<Modifier>> {
        let bullet = self.catalog.bullet(id);
        if bullet.is_none() {
            warn!("Unknown bullet id {}", id);
        }
        bullet
    }

    pub fn pool(&self, id: PoolId) -> Option<&DropPool> {
        self.catalog.drop_pool(id)
    }

    /// Whether `id` still needs unlocking. Unknown items count as locked.
    pub fn is_locked(&self, id: ItemId) -> bool {
        match self.catalog.item(id) {
            Some(item) => item.info().locked && !self.unlocked.contains(&id),
            None => true,
        }
    }

    /// Whether the persisted unlock flag of `id` is set.
    pub fn is_unlocked(&self, id: ItemId) -> bool {
        self.unlocked.contains(&id) || self.settings.get_int(&unlock_key(id)).unwrap_or(0) != 0
    }

    /// Unlocks `id` and persists the flag.
    pub fn unlock_item(&mut self, id: ItemId) -> StatResult<()> {
        if self.catalog.item(id).is_none() {
            warn!("Cannot unlock unknown item {}", id);
            return Err(StatError::UnknownItem { id });
        }
        self.settings.set_int(&unlock_key(id), 1)?;
        self.unlocked.insert(id);
        debug!("Unlocked item {}", id);
        Ok(())
    }

    /// Spends astro credits on a locked item. Unlocking an already unlocked item costs
    /// nothing.
    pub fn buy_unlock(&mut self, id: ItemId) -> StatResult<()> {
        let Some(item) = self.catalog.item(id) else {
            warn!("Cannot buy unknown item {}", id);
            return Err(StatError::UnknownItem { id });
        };
        if !self.is_locked(id) {
            return Ok(());
        }

        let price = item.info().astro_price;
        let balance = self.settings.get_int(ASTRO_CREDITS_KEY).unwrap_or(0);
        if balance < price {
            return Err(StatError::InsufficientFunds {
                currency: ASTRO_CREDITS_KEY.to_string(),
                needed: price,
                available: balance,
            });
        }

        self.settings.set_int(ASTRO_CREDITS_KEY, balance - price)?;
        self.unlock_item(id)
    }

    /// Draws items from pool `pool_id`.
    ///
    /// Ids the catalog does not know and items that are still locked are dropped from
    /// the result with a log line.
    pub fn drop_from_pool<R: Rng>(&self, pool_id: PoolId, rng: &mut R) -> StatResult<Vec<Arc<EnrichedModifier>>> {
        let pool = self.catalog.drop_pool(pool_id).ok_or_else(|| {
            warn!("Unknown drop pool {}", pool_id);
            StatError::UnknownPool { pool_id }
        })?;

        let drops: Vec<_> = pool
            .draw(rng)
            .into_iter()
            .filter_map(|id| match self.catalog.item(id) {
                Some(_) if self.is_locked(id) => {
                    debug!("Pool {} rolled locked item {}", pool_id, id);
                    None
                }
                Some(item) => Some(item.clone()),
                None => {
                    warn!("Pool {} references unknown item {}", pool_id, id);
                    None
                }
            })
            .collect();
        debug!("Pool {} dropped {:?}", pool_id, drops.iter().map(|d| d.id()).collect::<Vec<_>>());
        Ok(drops)
    }

    /// Looks up item `id` and attaches it to `dispatcher`.
    pub fn attach_item(&self, dispatcher: &mut EffectsDispatcher, id: ItemId) -> StatResult<Vec<EffectHandle>> {
        let item = self.catalog.item(id).ok_or(StatError::UnknownItem { id })?;
        Ok(dispatcher.attach_modifier(item))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ITEMS: &str = r#"{ "mods": [
        { "id": 1, "name": "Plating", "astroCreditPrice": 0, "effects": [] },
        { "id": 2, "name": "Railgun", "astroCreditPrice": 30, "requiresUnlocking": true, "effects": [] }
    ] }"#;

    const POOLS: &str = r#"{
        "1": { "indexes": [1, 2], "raritiesVal": [1, 1], "minDrops": 2, "maxDrops": 2 },
        "2": { "indexes": [1, 99], "raritiesVal": [1, 1], "minDrops": 2, "maxDrops": 2 }
    }"#;

    fn manager() -> ItemManager {
        let catalog = Catalog::from_sources(&["CharStats"], None, Some(ITEMS), None, Some(POOLS)).unwrap();
        ItemManager::new(Arc::new(catalog), MemorySettings::new())
    }

    #[test]
    fn unlock_persists_flag() {
        let mut manager = manager();
        assert!(manager.is_locked(2));
        assert!(!manager.is_locked(1));

        manager.unlock_item(2).unwrap();
        assert!(!manager.is_locked(2));
        assert!(manager.is_unlocked(2));
        assert_eq!(manager.settings().get_int("unlocked:2"), Some(1));
        assert!(manager.catalog().item(2).unwrap().info().locked);
        assert!(matches!(manager.unlock_item(50), Err(StatError::UnknownItem { id: 50 })));
    }

    #[test]
    fn unlocks_are_restored_from_settings() {
        let catalog = Arc::new(Catalog::from_sources(&[], None, Some(ITEMS), None, None).unwrap());
        let mut settings = MemorySettings::new();
        settings.set_int(&unlock_key(2), 1).unwrap();
        let manager = ItemManager::new(catalog, settings);
        assert!(!manager.is_locked(2));
    }

    #[test]
    fn buying_spends_credits() {
        let mut manager = manager();
        manager.settings_mut().set_int(ASTRO_CREDITS_KEY, 20).unwrap();
        assert!(matches!(
            manager.buy_unlock(2),
            Err(StatError::InsufficientFunds { needed: 30, available: 20, .. })
        ));
        assert!(manager.is_locked(2));

        manager.settings_mut().set_int(ASTRO_CREDITS_KEY, 45).unwrap();
        manager.buy_unlock(2).unwrap();
        assert_eq!(manager.settings().get_int(ASTRO_CREDITS_KEY), Some(15));
        manager.buy_unlock(2).unwrap();
        assert_eq!(manager.settings().get_int(ASTRO_CREDITS_KEY), Some(15));
    }

    #[test]
    fn drops_skip_locked_and_unknown_items() {
        use rand::SeedableRng;
        use rand::rngs::StdRng;

        let mut manager = manager();
        let mut rng = StdRng::seed_from_u64(4);

        let ids: Vec<_> = manager.drop_from_pool(1, &mut rng).unwrap().iter().map(|i| i.id()).collect();
        assert_eq!(ids, vec![1]);
        let ids: Vec<_> = manager.drop_from_pool(2, &mut rng).unwrap().iter().map(|i| i.id()).collect();
        assert_eq!(ids, vec![1]);

        manager.unlock_item(2).unwrap();
        let mut ids: Vec<_> = manager.drop_from_pool(1, &mut rng).unwrap().iter().map(|i| i.id()).collect();
        ids.sort();
        assert_eq!(ids, vec![1, 2]);

        assert!(matches!(manager.drop_from_pool(9, &mut rng), Err(StatError::UnknownPool { pool_id: 9 })));
    }
}
