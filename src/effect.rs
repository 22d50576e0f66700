use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use evalexpr::{DefaultNumericTypes, HashMapContext};
use log::{debug, error, trace, warn};

use crate::expressions::{bind_symbol, EffectOutput};
use crate::feature_store::{FeatureStore, StoreHandle, WeakStore};
use crate::reference_resolver::ReferencedExpression;
use crate::stat_addressing::{parse_descriptor, Side, StatRef, StoreKindId, StoreKindRegistry, TargetAddress};
use crate::stat_error::{StatError, StatResult};

pub type EffectId = u32;

/// A float result equal to this leaves the target feature untouched.
pub const NO_OP_SENTINEL: f64 = -1.0;

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

/// Anything that owns stores addressable by kind id. Implemented by dispatchers.
pub trait StoreLookup {
    fn lookup_store(&self, store_id: StoreKindId) -> Option<&StoreHandle>;
}

/// When an effect fires over its lifetime.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EffectKind {
    /// Fires on the first tick after attaching, then finishes.
    SingleActivation,
    /// Fires on the first tick and every `interval` seconds after, until `duration` elapses.
    OverTime { duration: f32, interval: f32 },
    /// Fires every `interval` seconds (every tick for 0) until removed.
    PermanentArea { interval: f32 },
}

impl EffectKind {
    /// Builds the variant from an `effectType` code ("sa", "ot", "area").
    pub fn from_code(code: &str, duration: Option<f32>, interval: Option<f32>) -> StatResult<Self> {
        let interval = interval.unwrap_or(0.0).max(0.0);
        match code {
            "sa" => Ok(EffectKind::SingleActivation),
            "ot" => Ok(EffectKind::OverTime {
                duration: duration.unwrap_or(0.0).max(0.0),
                interval,
            }),
            "area" => Ok(EffectKind::PermanentArea { interval }),
            other => Err(StatError::UnknownEffectType { effect_type: other.to_string() }),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            EffectKind::SingleActivation => "sa",
            EffectKind::OverTime { .. } => "ot",
            EffectKind::PermanentArea { .. } => "area",
        }
    }
}

/// Immutable effect template shared by every object the owning modifier is attached to.
#[derive(Debug, Clone)]
pub struct Effect {
    id: EffectId,
    kind: EffectKind,
    target: TargetAddress,
    target_descriptor: String,
    formula: ReferencedExpression,
}

impl Effect {
    /// Compiles an effect from its config descriptor.
    ///
    /// `external_allowed` must be set for effects that may read a foreign dispatcher:
    /// bullets, or effects that declared a non-local `targetType`.
    pub fn build(
        id: EffectId,
        kind: EffectKind,
        target: &str,
        expression: &str,
        external_allowed: bool,
        registry: &StoreKindRegistry,
    ) -> StatResult<Self> {
        let raw_target = parse_descriptor(target)?;
        let target_address = TargetAddress {
            side: raw_target.side,
            stat: raw_target.resolve(registry)?,
        };

        let formula = ReferencedExpression::compile(expression, registry)?;
        if formula.has_external_refs() && !external_allowed {
            error!(
                "Effect {} targeting '{}' reads external stats in '{}' without a non-local targetType",
                id, target, expression
            );
            return Err(StatError::ExternalWithoutOptIn { target: target.to_string() });
        }

        Ok(Self {
            id,
            kind,
            target: target_address,
            target_descriptor: target.trim().to_string(),
            formula,
        })
    }

    pub fn id(&self) -> EffectId {
        self.id
    }

    pub fn kind(&self) -> EffectKind {
        self.kind
    }

    pub fn target(&self) -> TargetAddress {
        self.target
    }

    pub fn target_descriptor(&self) -> &str {
        &self.target_descriptor
    }

    pub fn formula(&self) -> &ReferencedExpression {
        &self.formula
    }

    /// Logs every local reference `local` has no store for and returns how many there
    /// were. Attaches nothing.
    pub fn check_local_refs(&self, local: &dyn StoreLookup) -> usize {
        self.formula
            .local_refs()
            .iter()
            .filter(|stat| {
                let missing = local.lookup_store(stat.store_kind).is_none();
                if missing {
                    warn!(
                        "Effect {} ({}): Local store {} is not attached",
                        self.id, self.target_descriptor, stat.store_kind
                    );
                }
                missing
            })
            .count()
    }
}

/// Identifies one attachment of an effect, for later removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EffectHandle(u64);

impl EffectHandle {
    fn next() -> Self {
        Self(NEXT_HANDLE.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, Default)]
struct EffectTimer {
    elapsed: f32,
    since_fire: f32,
    fired: bool,
}

/// An effect bound to the concrete stores its references resolved to.
///
/// Stores are held weakly: an attached effect never keeps a detached store alive, and a
/// store that has gone away simply leaves its symbol unbound.
#[derive(Debug)]
pub struct AttachedEffect {
    handle: EffectHandle,
    effect: Arc<Effect>,
    local_stores: Vec<Option<WeakStore>>,
    extern_stores: Vec<Option<WeakStore>>,
    timer: EffectTimer,
    finished: bool,
}

impl AttachedEffect {
    /// Resolves local references against `local` and external ones against `external`.
    /// Missing stores are logged and left unresolved.
    pub fn resolve(effect: Arc<Effect>, local: &dyn StoreLookup, external: Option<&dyn StoreLookup>) -> Self {
        let formula = effect.formula();

        let local_stores = formula
            .local_refs()
            .iter()
            .map(|stat| resolve_slot(&effect, local, stat, Side::Local))
            .collect();

        let extern_stores = formula
            .extern_refs()
            .iter()
            .map(|stat| match external {
                Some(lookup) => resolve_slot(&effect, lookup, stat, Side::External),
                None => {
                    debug!(
                        "Effect {} has no foreign dispatcher to resolve external store {}",
                        effect.id(),
                        stat.store_kind
                    );
                    None
                }
            })
            .collect();

        Self {
            handle: EffectHandle::next(),
            effect,
            local_stores,
            extern_stores,
            timer: EffectTimer::default(),
            finished: false,
        }
    }

    pub fn handle(&self) -> EffectHandle {
        self.handle
    }

    pub fn effect(&self) -> &Arc<Effect> {
        &self.effect
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Number of references that found a store at attach time.
    pub fn resolved_count(&self) -> usize {
        self.local_stores.iter().chain(self.extern_stores.iter()).filter(|slot| slot.is_some()).count()
    }

    /// Advances the lifecycle timer and evaluates if the effect fires this tick.
    ///
    /// Returns `None` when the effect does not fire, or when `target` lacks the attribute
    /// the effect writes to.
    pub fn activate(&mut self, target: &FeatureStore, dt: f32) -> Option<StatResult<EffectOutput>> {
        if !self.advance(dt) {
            return None;
        }
        let attribute = self.effect.target().stat.attribute;
        if target.feature(attribute).is_none() {
            trace!(
                "Effect {} skipped: store {} has no attribute {}",
                self.effect.id(),
                target.class_name(),
                attribute
            );
            return None;
        }
        Some(self.do_effect())
    }

    /// Reads every referenced stat, binds it to its symbol and evaluates the formula.
    pub fn do_effect(&self) -> StatResult<EffectOutput> {
        let formula = self.effect.formula();
        let mut context: HashMapContext<DefaultNumericTypes> = HashMapContext::new();

        bind_side(&mut context, formula.local_refs(), formula.local_symbols(), &self.local_stores)?;
        bind_side(&mut context, formula.extern_refs(), formula.extern_symbols(), &self.extern_stores)?;

        formula.expression().evaluate(&context)
    }

    fn advance(&mut self, dt: f32) -> bool {
        if self.finished {
            return false;
        }
        let interval = match self.effect.kind() {
            EffectKind::SingleActivation => {
                self.finished = true;
                return true;
            }
            EffectKind::OverTime { duration, interval } => {
                self.timer.elapsed += dt;
                if self.timer.elapsed >= duration {
                    self.finished = true;
                }
                interval
            }
            EffectKind::PermanentArea { interval } => interval,
        };

        self.timer.since_fire += dt;
        if !self.timer.fired || self.timer.since_fire >= interval {
            self.timer.fired = true;
            self.timer.since_fire = 0.0;
            return true;
        }
        false
    }
}

fn resolve_slot(effect: &Effect, lookup: &dyn StoreLookup, stat: &StatRef, side: Side) -> Option<WeakStore> {
    match lookup.lookup_store(stat.store_kind) {
        Some(store) => Some(store.downgrade()),
        None => {
            // Might be normal: not every object carries every store kind.
            warn!(
                "Effect {} ({}): {:?} store {} is not attached",
                effect.id(),
                effect.target_descriptor(),
                side,
                stat.store_kind
            );
            None
        }
    }
}

fn bind_side(
    context: &mut HashMapContext<DefaultNumericTypes>,
    refs: &[StatRef],
    symbols: &[char],
    stores: &[Option<WeakStore>],
) -> StatResult<()> {
    for ((stat, symbol), slot) in refs.iter().zip(symbols).zip(stores) {
        let Some(store) = slot.as_ref().and_then(|weak| weak.upgrade()) else {
            continue;
        };
        let value = match store.try_borrow() {
            Some(store) => store.raw_stat_by_id(stat.attribute),
            None => {
                warn!("Store {} is busy, leaving '{}' unbound", stat.store_kind, symbol);
                continue;
            }
        };
        bind_symbol(context, *symbol, value)?;
    }
    Ok(())
}
