use std::cell::{Ref, RefCell, RefMut};
use std::rc::{Rc, Weak};

use log::{debug, trace, warn};

use crate::catalog::Catalog;
use crate::effect::{AttachedEffect, EffectHandle, NO_OP_SENTINEL};
use crate::expressions::EffectOutput;
use crate::feature::{Feature, FeatureType, FeatureValue, ValueKind};
use crate::feature_config::FeatureSet;
use crate::feature_kind::FeatureKind;
use crate::stat_addressing::{AttributeId, StoreKindId, StoreKindRegistry};
use crate::stat_error::{StatError, StatResult};

/// Attribute ids used when seeding the reserved economy features.
pub const MONEY_ATTRIBUTE: AttributeId = 9000;
pub const KEYS_ATTRIBUTE: AttributeId = 9001;

/// The features of one archetype on one game object, plus the effects acting on them.
#[derive(Debug)]
pub struct FeatureStore {
    store_id: StoreKindId,
    class_name: String,
    owner_name: String,
    features: FeatureSet,
    active_effects: Vec<AttachedEffect>,
    pending_removal: Vec<EffectHandle>,
    dirty: bool,
}

impl FeatureStore {
    /// Creates a store for `owner_name`'s `class_name` and loads its features from the
    /// catalog. Fails if `class_name` was never registered as a store kind.
    pub fn new(catalog: &Catalog, owner_name: &str, class_name: &str) -> StatResult<Self> {
        let (store_id, class_name) = Self::compute_identity(catalog.store_kinds(), class_name)?;
        let mut store = Self::with_features(store_id, owner_name, &class_name, FeatureSet::new());
        store.load_features(catalog);
        Ok(store)
    }

    /// Builds a store from an explicit feature set, bypassing the catalog.
    pub fn with_features(store_id: StoreKindId, owner_name: &str, class_name: &str, features: FeatureSet) -> Self {
        Self {
            store_id,
            class_name: class_name.to_string(),
            owner_name: owner_name.to_string(),
            features,
            active_effects: Vec::new(),
            pending_removal: Vec::new(),
            dirty: false,
        }
    }

    pub fn compute_identity(registry: &StoreKindRegistry, class_name: &str) -> StatResult<(StoreKindId, String)> {
        let id = registry.id_of(class_name)?;
        Ok((id, class_name.to_string()))
    }

    /// Replaces the features with the pre-parsed set for `(owner_name, class_name)`.
    /// A missing block leaves the store empty.
    pub fn load_features(&mut self, catalog: &Catalog) {
        match catalog.feature_set(&self.owner_name, &self.class_name) {
            Some(features) => self.features = features.clone(),
            None => {
                debug!("No feature block for {}-{}, starting empty", self.owner_name, self.class_name);
                self.features.clear();
            }
        }
    }

    pub fn store_id(&self) -> StoreKindId {
        self.store_id
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn owner_name(&self) -> &str {
        &self.owner_name
    }

    pub fn feature(&self, id: AttributeId) -> Option<&Feature> {
        self.features.get(&id)
    }

    pub fn features(&self) -> impl Iterator<Item = (AttributeId, &Feature)> {
        self.features.iter().map(|(id, feature)| (*id, feature))
    }

    pub fn insert_feature(&mut self, id: AttributeId, feature: Feature) -> Option<Feature> {
        self.dirty = true;
        self.features.insert(id, feature)
    }

    /// Typed read. A missing or mistyped feature is logged and reads as `T::default()`;
    /// effects routinely target features that only some objects have.
    pub fn get_stat_by_id<T: FeatureType>(&self, id: AttributeId) -> T {
        let Some(feature) = self.features.get(&id) else {
            warn!("{}-{}: no feature with id {}", self.owner_name, self.class_name, id);
            return T::default();
        };
        match feature.get_value::<T>() {
            Ok(value) => value,
            Err(err) => {
                warn!("{}-{}: feature {}: {}", self.owner_name, self.class_name, id, err);
                T::default()
            }
        }
    }

    /// Untyped read used when binding expression parameters.
    pub(crate) fn raw_stat_by_id(&self, id: AttributeId) -> FeatureValue {
        match self.features.get(&id) {
            Some(feature) => feature.current_value(),
            None => {
                warn!("{}-{}: no feature with id {}", self.owner_name, self.class_name, id);
                FeatureValue::default()
            }
        }
    }

    /// Converts and writes through to the feature. Returns false if nothing was written.
    pub fn set_stat_by_id(&mut self, id: AttributeId, value: impl Into<FeatureValue>) -> bool {
        let Some(feature) = self.features.get_mut(&id) else {
            warn!("{}-{}: cannot set missing feature {}", self.owner_name, self.class_name, id);
            return false;
        };
        match feature.set_value(value) {
            Ok(()) => {
                self.dirty = true;
                true
            }
            Err(err) => {
                warn!("{}-{}: cannot set feature {}: {}", self.owner_name, self.class_name, id, err);
                false
            }
        }
    }

    pub fn features_of_kind(&self, kind: FeatureKind) -> impl Iterator<Item = &Feature> {
        self.features.values().filter(move |feature| feature.kind() == kind)
    }

    /// Non-allocating form of [`Self::get_feature_values_by_type`]; mistyped features are skipped.
    pub fn feature_values<T: FeatureType>(&self, kind: FeatureKind) -> impl Iterator<Item = T> + '_ {
        self.features_of_kind(kind).filter_map(|feature| feature.get_value::<T>().ok())
    }

    pub fn get_feature_values_by_type<T: FeatureType>(&self, kind: FeatureKind) -> Vec<T> {
        self.feature_values(kind).collect()
    }

    pub fn attach_effect(&mut self, effect: AttachedEffect) -> EffectHandle {
        let handle = effect.handle();
        trace!("{}-{}: attached effect {}", self.owner_name, self.class_name, effect.effect().id());
        self.active_effects.push(effect);
        handle
    }

    /// Marks an effect for removal at the end of the next tick. It no longer fires in the
    /// meantime. Returns false if this store does not hold the effect.
    pub fn remove_effect(&mut self, handle: EffectHandle) -> bool {
        if !self.active_effects.iter().any(|e| e.handle() == handle) {
            return false;
        }
        if !self.pending_removal.contains(&handle) {
            self.pending_removal.push(handle);
        }
        true
    }

    pub fn active_effect_count(&self) -> usize {
        self.active_effects.len()
    }

    pub fn has_effect(&self, handle: EffectHandle) -> bool {
        self.active_effects.iter().any(|e| e.handle() == handle) && !self.pending_removal.contains(&handle)
    }

    /// Returns whether any feature changed since the last call, and clears the flag.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Converts an effect result to the target's declared type and writes it.
    /// Returns `Ok(false)` when a float effect signalled a no-op.
    pub(crate) fn apply_effect_output(&mut self, id: AttributeId, output: EffectOutput) -> StatResult<bool> {
        let Some(feature) = self.features.get_mut(&id) else {
            return Ok(false);
        };

        let value = match (feature.value_kind(), output) {
            (ValueKind::Float, EffectOutput::Number(n)) if n == NO_OP_SENTINEL => return Ok(false),
            (_, EffectOutput::Number(n)) if !n.is_finite() => {
                return Err(StatError::InvalidResult { details: format!("non-finite value {}", n) });
            }
            (ValueKind::Int, EffectOutput::Number(n)) => {
                let rounded = n.round();
                if rounded < i32::MIN as f64 || rounded > i32::MAX as f64 {
                    return Err(StatError::InvalidResult { details: format!("{} does not fit an int", n) });
                }
                FeatureValue::Int(rounded as i32)
            }
            (ValueKind::Float, EffectOutput::Number(n)) => FeatureValue::Float(n as f32),
            (ValueKind::Bool, EffectOutput::Number(n)) => FeatureValue::Bool(n != 0.0),
            (_, EffectOutput::Flag(flag)) => FeatureValue::Bool(flag),
        };

        feature.set_value(value)?;
        self.dirty = true;
        Ok(true)
    }
}

/// Seeds the reserved `money` and `keys` features, which never come from a feature file.
pub fn seed_economy(store: &mut FeatureStore, money: i32, keys: i32) {
    store.insert_feature(MONEY_ATTRIBUTE, Feature::new(FeatureKind::Money, money).with_bounds(0.0, i32::MAX as f32));
    store.insert_feature(KEYS_ATTRIBUTE, Feature::new(FeatureKind::Keys, keys).with_bounds(0.0, i32::MAX as f32));
}

/// Shared, single-threaded handle to a store.
///
/// Dispatchers own the strong handles; attached effects keep weak ones.
#[derive(Debug, Clone)]
pub struct StoreHandle(Rc<RefCell<FeatureStore>>);

impl StoreHandle {
    pub fn new(store: FeatureStore) -> Self {
        Self(Rc::new(RefCell::new(store)))
    }

    pub fn borrow(&self) -> Ref<'_, FeatureStore> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, FeatureStore> {
        self.0.borrow_mut()
    }

    pub fn try_borrow(&self) -> Option<Ref<'_, FeatureStore>> {
        self.0.try_borrow().ok()
    }

    pub fn downgrade(&self) -> WeakStore {
        WeakStore(Rc::downgrade(&self.0))
    }

    pub fn ptr_eq(&self, other: &StoreHandle) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn store_id(&self) -> StoreKindId {
        self.0.borrow().store_id()
    }

    /// Runs one tick of effect activation, in attachment order.
    ///
    /// Effects that fail to evaluate or convert are logged and skipped; the rest still run.
    /// Finished effects and effects marked for removal are dropped once the pass is over.
    /// Returns how many effects wrote a value.
    pub fn activate_effects(&self, dt: f32) -> usize {
        let mut effects = std::mem::take(&mut self.0.borrow_mut().active_effects);
        let mut applied = 0;

        for attached in effects.iter_mut() {
            if self.0.borrow().pending_removal.contains(&attached.handle()) {
                continue;
            }

            let outcome = {
                let store = self.0.borrow();
                attached.activate(&store, dt)
            };
            let output = match outcome {
                None => continue,
                Some(Ok(output)) => output,
                Some(Err(err)) => {
                    warn!("Effect {} skipped: {}", attached.effect().id(), err);
                    continue;
                }
            };

            let attribute = attached.effect().target().stat.attribute;
            let mut store = self.0.borrow_mut();
            match store.apply_effect_output(attribute, output) {
                Ok(true) => applied += 1,
                Ok(false) => {}
                Err(err) => warn!(
                    "{}-{}: effect {} could not write feature {}: {}",
                    store.owner_name,
                    store.class_name,
                    attached.effect().id(),
                    attribute,
                    err
                ),
            }
        }

        let mut store = self.0.borrow_mut();
        let pending = std::mem::take(&mut store.pending_removal);
        effects.append(&mut store.active_effects);
        effects.retain(|effect| !effect.is_finished() && !pending.contains(&effect.handle()));
        store.active_effects = effects;
        applied
    }
}

#[derive(Debug, Clone)]
pub struct WeakStore(Weak<RefCell<FeatureStore>>);

impl WeakStore {
    pub fn upgrade(&self) -> Option<StoreHandle> {
        self.0.upgrade().map(StoreHandle)
    }
}
