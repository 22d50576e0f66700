use std::ops::Deref;
use std::sync::Arc;

use crate::effect::Effect;

pub type ItemId = i32;

/// A bundle of effects representing one item, bullet or environmental influence.
///
/// Modifiers are shared templates owned by the catalog. Attaching one never mutates it;
/// the per-object resolution state lives in the attached effects.
#[derive(Debug, Clone)]
pub struct Modifier {
    id: ItemId,
    effects: Vec<Arc<Effect>>,
    is_bullet: bool,
}

impl Modifier {
    pub fn new(id: ItemId, effects: Vec<Effect>, is_bullet: bool) -> Self {
        Self {
            id,
            effects: effects.into_iter().map(Arc::new).collect(),
            is_bullet,
        }
    }

    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn effects(&self) -> &[Arc<Effect>] {
        &self.effects
    }

    /// Bullet modifiers are only activated when they hit something.
    pub fn is_bullet_effect(&self) -> bool {
        self.is_bullet
    }
}

/// Display and economy metadata an item carries in the catalog.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemInfo {
    pub name: String,
    pub description: String,
    pub icon_id: i32,
    pub price: i32,
    pub astro_price: i32,
    /// Whether the item starts locked and must be unlocked before it can drop or be bought.
    pub locked: bool,
    pub grab_on_walk_in: bool,
}

/// A catalog item: a modifier plus its display metadata.
#[derive(Debug, Clone)]
pub struct EnrichedModifier {
    modifier: Modifier,
    info: ItemInfo,
}

impl EnrichedModifier {
    pub fn new(modifier: Modifier, info: ItemInfo) -> Self {
        Self { modifier, info }
    }

    pub fn modifier(&self) -> &Modifier {
        &self.modifier
    }

    pub fn info(&self) -> &ItemInfo {
        &self.info
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }
}

impl Deref for EnrichedModifier {
    type Target = Modifier;

    fn deref(&self) -> &Self::Target {
        &self.modifier
    }
}
