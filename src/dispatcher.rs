use std::collections::BTreeMap;
use std::sync::Arc;

use log::{debug, error, warn};

use crate::catalog::Catalog;
use crate::effect::{AttachedEffect, Effect, EffectHandle, StoreLookup};
use crate::feature::FeatureType;
use crate::feature_kind::FeatureKind;
use crate::feature_store::{FeatureStore, StoreHandle};
use crate::modifiers::{ItemId, Modifier};
use crate::stat_addressing::{Side, StoreKindId};
use crate::stat_error::{StatError, StatResult};

/// Per-object hub of feature stores.
///
/// The dispatcher is the unit of addressing for effects: `@` references resolve against
/// the dispatcher an effect is attached through, `!` references against the dispatcher
/// on the other side of an interaction.
#[derive(Debug, Default)]
pub struct EffectsDispatcher {
    owner: String,
    stores: BTreeMap<StoreKindId, StoreHandle>,
    enabled: BTreeMap<StoreKindId, bool>,
    activated_item_ids: Vec<ItemId>,
}

impl StoreLookup for EffectsDispatcher {
    fn lookup_store(&self, store_id: StoreKindId) -> Option<&StoreHandle> {
        self.stores.get(&store_id)
    }
}

impl EffectsDispatcher {
    pub fn new(owner: &str) -> Self {
        Self {
            owner: owner.to_string(),
            ..Default::default()
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Attaches a store under its kind id and enables it.
    ///
    /// Re-attaching the same store is a no-op. A different store under a taken id is
    /// rejected.
    pub fn attach_status_class(&mut self, store: StoreHandle) -> StatResult<()> {
        let store_id = store.store_id();
        if let Some(existing) = self.stores.get(&store_id) {
            if existing.ptr_eq(&store) {
                return Ok(());
            }
            error!("{}: store id {} is already attached to a different store", self.owner, store_id);
            return Err(StatError::StoreCollision { store_id });
        }

        debug!("{}: attached store {}", self.owner, store_id);
        self.stores.insert(store_id, store);
        self.enabled.insert(store_id, true);
        Ok(())
    }

    /// Builds a store for `class_name` from the catalog and attaches it.
    pub fn create_status_class(&mut self, catalog: &Catalog, class_name: &str) -> StatResult<StoreHandle> {
        let store = StoreHandle::new(FeatureStore::new(catalog, &self.owner, class_name)?);
        self.attach_status_class(store.clone())?;
        Ok(store)
    }

    pub fn detach_status_class(&mut self, store_id: StoreKindId) -> Option<StoreHandle> {
        self.enabled.remove(&store_id);
        let removed = self.stores.remove(&store_id);
        if removed.is_some() {
            debug!("{}: detached store {}", self.owner, store_id);
        }
        removed
    }

    /// Includes or excludes a store from aggregate queries. Returns false for unknown ids.
    pub fn set_active_status_class(&mut self, store_id: StoreKindId, active: bool) -> bool {
        match self.enabled.get_mut(&store_id) {
            Some(flag) => {
                *flag = active;
                true
            }
            None => {
                warn!("{}: cannot toggle unknown store {}", self.owner, store_id);
                false
            }
        }
    }

    pub fn is_status_class_active(&self, store_id: StoreKindId) -> bool {
        self.enabled.get(&store_id).copied().unwrap_or(false)
    }

    pub fn status_class(&self, store_id: StoreKindId) -> Option<&StoreHandle> {
        self.stores.get(&store_id)
    }

    pub fn status_classes(&self) -> impl Iterator<Item = &StoreHandle> {
        self.stores.values()
    }

    fn enabled_stores(&self) -> impl Iterator<Item = &StoreHandle> {
        self.stores
            .iter()
            .filter(|(id, _)| self.is_status_class_active(**id))
            .map(|(_, store)| store)
    }

    pub fn activated_item_ids(&self) -> &[ItemId] {
        &self.activated_item_ids
    }

    /// Attaches `modifier` to this object.
    ///
    /// Non-bullet modifiers are recorded in the activation history and each effect is
    /// attached to its target store here. Bullet modifiers only have their local
    /// references checked against this dispatcher; they activate later through
    /// [`Self::attach_modifier_from_other_dispatcher`] on whatever they hit.
    pub fn attach_modifier(&mut self, modifier: &Modifier) -> Vec<EffectHandle> {
        if modifier.is_bullet_effect() {
            let missing: usize = modifier.effects().iter().map(|effect| effect.check_local_refs(&*self)).sum();
            if missing > 0 {
                warn!("{}: bullet modifier {} has {} unresolved local references", self.owner, modifier.id(), missing);
            }
            debug!("{}: bullet modifier {} prepared", self.owner, modifier.id());
            return Vec::new();
        }

        self.activated_item_ids.push(modifier.id());
        let handles = attach_effects(modifier.effects(), self, None);
        debug!("{}: modifier {} attached {} effects", self.owner, modifier.id(), handles.len());
        handles
    }

    /// Attaches `modifier` as the result of an interaction started by `origin`.
    ///
    /// Local references resolve against `origin` (e.g. the shooter) and external ones
    /// against `self` (e.g. the one hit). `!`-targeted effects land on this dispatcher's
    /// stores, `@`-targeted ones on `origin`'s.
    pub fn attach_modifier_from_other_dispatcher(&self, origin: &EffectsDispatcher, modifier: &Modifier) -> Vec<EffectHandle> {
        let handles = attach_effects(modifier.effects(), origin, Some(self));
        debug!(
            "{}: modifier {} from {} attached {} effects",
            self.owner,
            modifier.id(),
            origin.owner,
            handles.len()
        );
        handles
    }

    /// Marks an attached effect for removal from whichever of this object's stores holds it.
    pub fn remove_effect(&self, handle: EffectHandle) -> bool {
        self.stores.values().any(|store| store.borrow_mut().remove_effect(handle))
    }

    /// Runs one tick of effect activation on every attached store.
    pub fn activate_effects(&self, dt: f32) -> usize {
        self.stores.values().map(|store| store.activate_effects(dt)).sum()
    }

    /// Every value of `kind` across enabled stores, in store id order.
    pub fn get_all_feature_by_type<T: FeatureType>(&self, kind: FeatureKind) -> Vec<T> {
        let mut values = Vec::new();
        for store in self.enabled_stores() {
            values.extend(store.borrow().feature_values::<T>(kind));
        }
        values
    }

    /// Sum of every numeric value of `kind` across enabled stores, without allocating.
    pub fn sum_feature(&self, kind: FeatureKind) -> f32 {
        self.enabled_stores()
            .map(|store| store.borrow().feature_values::<f32>(kind).sum::<f32>())
            .sum()
    }

    /// The value of `kind` that was written last, across enabled stores.
    ///
    /// Features that were never written rank oldest; ties go to the first in store order.
    pub fn get_most_recent_feature_value<T: FeatureType>(&self, kind: FeatureKind) -> Option<T> {
        let mut latest: Option<(u64, T)> = None;
        for store in self.enabled_stores() {
            let store = store.borrow();
            for feature in store.features_of_kind(kind) {
                let Ok(value) = feature.get_value::<T>() else {
                    continue;
                };
                let stamp = feature.last_modified();
                if latest.is_none_or(|(best, _)| stamp > best) {
                    latest = Some((stamp, value));
                }
            }
        }
        latest.map(|(_, value)| value)
    }
}

fn attach_effects(effects: &[Arc<Effect>], local: &EffectsDispatcher, external: Option<&EffectsDispatcher>) -> Vec<EffectHandle> {
    let mut handles = Vec::with_capacity(effects.len());
    for effect in effects {
        let target = effect.target();
        let owner = match target.side {
            Side::Local => Some(local),
            Side::External => external,
        };
        let Some(owner) = owner else {
            warn!(
                "Effect {} targets '{}' but there is no foreign dispatcher",
                effect.id(),
                effect.target_descriptor()
            );
            continue;
        };
        let Some(store) = owner.lookup_store(target.stat.store_kind) else {
            warn!(
                "Effect {} targets store {} which {} does not have",
                effect.id(),
                target.stat.store_kind,
                owner.owner
            );
            continue;
        };

        let attached = AttachedEffect::resolve(effect.clone(), local, external.map(|d| d as &dyn StoreLookup));
        handles.push(store.borrow_mut().attach_effect(attached));
    }
    handles
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::EffectKind;
    use crate::feature::Feature;
    use crate::feature_config::FeatureSet;
    use crate::stat_addressing::StoreKindRegistry;

    const WEAPON: StoreKindId = 0;
    const MOD: StoreKindId = 1;

    fn registry() -> StoreKindRegistry {
        let mut registry = StoreKindRegistry::new();
        registry.register("Weapon");
        registry.register("Mod");
        registry
    }

    fn store(id: StoreKindId, class: &str, features: &[(u32, Feature)]) -> StoreHandle {
        let set: FeatureSet = features.iter().cloned().collect();
        StoreHandle::new(FeatureStore::with_features(id, "Player", class, set))
    }

    fn loadout() -> EffectsDispatcher {
        let mut dispatcher = EffectsDispatcher::new("Player");
        dispatcher
            .attach_status_class(store(WEAPON, "Weapon", &[(1, Feature::new(FeatureKind::FireRate, 2.0f32))]))
            .unwrap();
        dispatcher
            .attach_status_class(store(
                MOD,
                "Mod",
                &[(1, Feature::new(FeatureKind::FireRate, 0.5f32)), (2, Feature::new(FeatureKind::Heat, 0.0f32))],
            ))
            .unwrap();
        dispatcher
    }

    #[test]
    fn aggregates_only_enabled_stores() {
        let mut dispatcher = loadout();
        assert_eq!(dispatcher.get_all_feature_by_type::<f32>(FeatureKind::FireRate), vec![2.0, 0.5]);
        assert_eq!(dispatcher.sum_feature(FeatureKind::FireRate), 2.5);

        assert!(dispatcher.set_active_status_class(MOD, false));
        assert_eq!(dispatcher.get_all_feature_by_type::<f32>(FeatureKind::FireRate), vec![2.0]);
        assert!(!dispatcher.set_active_status_class(42, false));
    }

    #[test]
    fn most_recent_follows_last_write() {
        let dispatcher = loadout();
        dispatcher.status_class(MOD).unwrap().borrow_mut().set_stat_by_id(1, 0.75f32);
        dispatcher.status_class(WEAPON).unwrap().borrow_mut().set_stat_by_id(1, 3.0f32);
        assert_eq!(dispatcher.get_most_recent_feature_value::<f32>(FeatureKind::FireRate), Some(3.0));

        dispatcher.status_class(MOD).unwrap().borrow_mut().set_stat_by_id(1, 1.25f32);
        assert_eq!(dispatcher.get_most_recent_feature_value::<f32>(FeatureKind::FireRate), Some(1.25));
        assert_eq!(dispatcher.get_most_recent_feature_value::<f32>(FeatureKind::Shield), None);
    }

    #[test]
    fn store_collisions_are_rejected() {
        let mut dispatcher = loadout();
        let weapon = dispatcher.status_class(WEAPON).unwrap().clone();
        assert!(dispatcher.attach_status_class(weapon).is_ok());

        let impostor = store(WEAPON, "Weapon", &[]);
        assert!(matches!(
            dispatcher.attach_status_class(impostor),
            Err(StatError::StoreCollision { store_id: WEAPON })
        ));

        assert!(dispatcher.detach_status_class(WEAPON).is_some());
        assert!(!dispatcher.is_status_class_active(WEAPON));
        assert!(dispatcher.detach_status_class(WEAPON).is_none());
    }

    #[test]
    fn attach_modifier_records_history_and_targets_local_store() {
        let mut dispatcher = loadout();
        let effect = Effect::build(0, EffectKind::SingleActivation, "@Mod.2", "@Mod.2 + @Weapon.1", false, &registry()).unwrap();
        let modifier = Modifier::new(7, vec![effect], false);

        let handles = dispatcher.attach_modifier(&modifier);
        assert_eq!(handles.len(), 1);
        assert_eq!(dispatcher.activated_item_ids(), &[7]);

        dispatcher.activate_effects(0.016);
        let heat = dispatcher.status_class(MOD).unwrap().borrow().get_stat_by_id::<f32>(2);
        assert_eq!(heat, 2.0);
    }

    #[test]
    fn bullet_modifiers_do_not_activate_on_attach() {
        let mut dispatcher = loadout();
        let effect = Effect::build(0, EffectKind::SingleActivation, "!Mod.2", "!Mod.2 + 10", true, &registry()).unwrap();
        let bullet = Modifier::new(3, vec![effect], true);

        assert!(dispatcher.attach_modifier(&bullet).is_empty());
        assert_eq!(bullet.effects()[0].check_local_refs(&dispatcher), 0);
        assert!(dispatcher.activated_item_ids().is_empty());
        assert!(dispatcher.status_classes().all(|s| s.borrow().active_effect_count() == 0));
    }

    #[test]
    fn remove_effect_reaches_the_holding_store() {
        let mut dispatcher = loadout();
        let effect = Effect::build(0, EffectKind::PermanentArea { interval: 0.0 }, "@Mod.2", "@Mod.2 + 1", false, &registry()).unwrap();
        let handles = dispatcher.attach_modifier(&Modifier::new(1, vec![effect], false));

        dispatcher.activate_effects(0.016);
        assert!(dispatcher.remove_effect(handles[0]));
        dispatcher.activate_effects(0.016);

        let heat = dispatcher.status_class(MOD).unwrap().borrow().get_stat_by_id::<f32>(2);
        assert_eq!(heat, 1.0);
        assert!(!dispatcher.remove_effect(handles[0]));
    }
}
