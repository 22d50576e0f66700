pub use crate::catalog::{parse_bullets, parse_items, Catalog, CatalogBuilder};
pub use crate::config::CatalogConfig;
pub use crate::dispatcher::EffectsDispatcher;
pub use crate::drop_pool::{normalize, parse_drop_pools, DropPool, PoolId};
pub use crate::effect::{AttachedEffect, Effect, EffectHandle, EffectId, EffectKind, StoreLookup, NO_OP_SENTINEL};
pub use crate::expressions::{EffectOutput, Expression};
pub use crate::feature::{Feature, FeatureBounds, FeatureType, FeatureValue, ValueKind};
pub use crate::feature_config::{feature_set_key, label_hash, parse_feature_line, parse_feature_sets, FeatureSet};
pub use crate::feature_kind::FeatureKind;
pub use crate::feature_store::{seed_economy, FeatureStore, StoreHandle, WeakStore, KEYS_ATTRIBUTE, MONEY_ATTRIBUTE};
pub use crate::item_manager::{unlock_key, ItemManager, ASTRO_CREDITS_KEY};
pub use crate::modifiers::{EnrichedModifier, ItemId, ItemInfo, Modifier};
pub use crate::reference_resolver::{ReferencedExpression, MAX_SYMBOLS};
pub use crate::settings::{JsonFileSettings, MemorySettings, SettingValue, SettingsStore};
pub use crate::stat_addressing::{AttributeId, Side, StatRef, StoreKindId, StoreKindRegistry, TargetAddress};
pub use crate::stat_error::{StatError, StatResult};
