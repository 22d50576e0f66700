use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use evalexpr::{DefaultNumericTypes, Value as EvalValue};

use crate::feature_kind::FeatureKind;
use crate::stat_error::{StatError, StatResult};

// Monotonic write counter used for "most recent value" resolution.
static MODIFICATION_CLOCK: AtomicU64 = AtomicU64::new(1);

fn next_stamp() -> u64 {
    MODIFICATION_CLOCK.fetch_add(1, Ordering::Relaxed)
}

/// Primitive type of a feature, fixed by the literal it was declared with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Int,
    Float,
    Bool,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Int => f.write_str("int"),
            ValueKind::Float => f.write_str("float"),
            ValueKind::Bool => f.write_str("bool"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeatureValue {
    Int(i32),
    Float(f32),
    Bool(bool),
}

impl Default for FeatureValue {
    fn default() -> Self {
        Self::Float(0.0)
    }
}

impl FeatureValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            FeatureValue::Int(_) => ValueKind::Int,
            FeatureValue::Float(_) => ValueKind::Float,
            FeatureValue::Bool(_) => ValueKind::Bool,
        }
    }

    /// Reads a feature-file literal. `true`/`false` are bools, anything that parses as an
    /// `i32` is an int, and any other finite number is a float.
    pub fn parse_literal(literal: &str) -> Option<Self> {
        let literal = literal.trim();
        if literal.eq_ignore_ascii_case("true") {
            return Some(Self::Bool(true));
        }
        if literal.eq_ignore_ascii_case("false") {
            return Some(Self::Bool(false));
        }
        if let Ok(int) = literal.parse::<i32>() {
            return Some(Self::Int(int));
        }
        literal
            .parse::<f32>()
            .ok()
            .filter(|f| f.is_finite())
            .map(Self::Float)
    }

    /// Converts to another primitive type. Floats round when narrowed to ints; numbers
    /// become bools by comparing against zero. Returns `None` for non-finite floats that
    /// cannot become an int.
    pub fn convert_to(self, kind: ValueKind) -> Option<FeatureValue> {
        match (kind, self) {
            (ValueKind::Int, FeatureValue::Int(i)) => Some(FeatureValue::Int(i)),
            (ValueKind::Int, FeatureValue::Float(f)) => {
                let rounded = f.round();
                if !rounded.is_finite() || rounded < i32::MIN as f32 || rounded > i32::MAX as f32 {
                    return None;
                }
                Some(FeatureValue::Int(rounded as i32))
            }
            (ValueKind::Int, FeatureValue::Bool(b)) => Some(FeatureValue::Int(b as i32)),
            (ValueKind::Float, FeatureValue::Int(i)) => Some(FeatureValue::Float(i as f32)),
            (ValueKind::Float, FeatureValue::Float(f)) => f.is_finite().then_some(FeatureValue::Float(f)),
            (ValueKind::Float, FeatureValue::Bool(b)) => Some(FeatureValue::Float(if b { 1.0 } else { 0.0 })),
            (ValueKind::Bool, FeatureValue::Int(i)) => Some(FeatureValue::Bool(i != 0)),
            (ValueKind::Bool, FeatureValue::Float(f)) => Some(FeatureValue::Bool(f != 0.0)),
            (ValueKind::Bool, FeatureValue::Bool(b)) => Some(FeatureValue::Bool(b)),
        }
    }

    pub fn as_f32(&self) -> f32 {
        match self {
            FeatureValue::Int(i) => *i as f32,
            FeatureValue::Float(f) => *f,
            FeatureValue::Bool(b) => if *b { 1.0 } else { 0.0 },
        }
    }

    /// Value as bound into an expression context. Numbers are always bound as floats so
    /// that `/` never truncates.
    pub(crate) fn to_eval_value(self) -> EvalValue<DefaultNumericTypes> {
        match self {
            FeatureValue::Int(i) => EvalValue::Float(i as f64),
            FeatureValue::Float(f) => EvalValue::Float(f as f64),
            FeatureValue::Bool(b) => EvalValue::Boolean(b),
        }
    }
}

impl fmt::Display for FeatureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureValue::Int(i) => write!(f, "{}", i),
            FeatureValue::Float(v) => write!(f, "{}", v),
            FeatureValue::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<i32> for FeatureValue {
    fn from(value: i32) -> Self {
        Self::Int(value)
    }
}

impl From<f32> for FeatureValue {
    fn from(value: f32) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for FeatureValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Rust types a feature can be read as.
///
/// `f32` also accepts int features, so a stat declared as `health=50` still reads as
/// `50.0`. The reverse narrowing is a type mismatch.
pub trait FeatureType: Copy + Default + fmt::Debug {
    const KIND: ValueKind;

    fn from_feature_value(value: FeatureValue) -> Option<Self>;
}

impl FeatureType for i32 {
    const KIND: ValueKind = ValueKind::Int;

    fn from_feature_value(value: FeatureValue) -> Option<Self> {
        match value {
            FeatureValue::Int(i) => Some(i),
            _ => None,
        }
    }
}

impl FeatureType for f32 {
    const KIND: ValueKind = ValueKind::Float;

    fn from_feature_value(value: FeatureValue) -> Option<Self> {
        match value {
            FeatureValue::Int(i) => Some(i as f32),
            FeatureValue::Float(f) => Some(f),
            FeatureValue::Bool(_) => None,
        }
    }
}

impl FeatureType for bool {
    const KIND: ValueKind = ValueKind::Bool;

    fn from_feature_value(value: FeatureValue) -> Option<Self> {
        match value {
            FeatureValue::Bool(b) => Some(b),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureBounds {
    min: f32,
    max: f32,
}

impl FeatureBounds {
    pub fn new(min: f32, max: f32) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    pub fn min(&self) -> f32 {
        self.min
    }

    pub fn max(&self) -> f32 {
        self.max
    }

    /// Whether some integer lies in `[min, max]`. Int features need one to clamp into.
    pub fn holds_integer(&self) -> bool {
        self.min.ceil() <= self.max.floor()
    }

    fn clamp(&self, value: FeatureValue) -> FeatureValue {
        match value {
            FeatureValue::Int(i) => {
                let lo = self.min.ceil() as i32;
                let hi = (self.max.floor() as i32).max(lo);
                FeatureValue::Int(i.clamp(lo, hi))
            }
            FeatureValue::Float(f) => FeatureValue::Float(f.clamp(self.min, self.max)),
            FeatureValue::Bool(b) => FeatureValue::Bool(b),
        }
    }
}

/// One typed, optionally bounded stat slot.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    kind: FeatureKind,
    base_value: FeatureValue,
    current_value: FeatureValue,
    bounds: Option<FeatureBounds>,
    last_modified: u64,
}

impl Feature {
    pub fn new(kind: FeatureKind, value: impl Into<FeatureValue>) -> Self {
        let value = value.into();
        Self {
            kind,
            base_value: value,
            current_value: value,
            bounds: None,
            last_modified: 0,
        }
    }

    /// Attaches a `[min, max]` range and clamps the base and current values into it.
    /// Bool features never carry bounds; the range is ignored for them.
    pub fn with_bounds(mut self, min: f32, max: f32) -> Self {
        if self.value_kind() == ValueKind::Bool {
            log::debug!("Ignoring range {}-{} on bool feature '{}'", min, max, self.kind);
            return self;
        }
        let bounds = FeatureBounds::new(min, max);
        if self.value_kind() == ValueKind::Int && !bounds.holds_integer() {
            log::warn!("Ignoring range {}-{} on int feature '{}': no integer inside", min, max, self.kind);
            return self;
        }
        self.base_value = bounds.clamp(self.base_value);
        self.current_value = bounds.clamp(self.current_value);
        self.bounds = Some(bounds);
        self
    }

    pub fn kind(&self) -> FeatureKind {
        self.kind
    }

    pub fn value_kind(&self) -> ValueKind {
        self.base_value.kind()
    }

    pub fn base_value(&self) -> FeatureValue {
        self.base_value
    }

    pub fn current_value(&self) -> FeatureValue {
        self.current_value
    }

    pub fn bounds(&self) -> Option<FeatureBounds> {
        self.bounds
    }

    pub fn last_modified(&self) -> u64 {
        self.last_modified
    }

    /// Converts `value` to this feature's declared type, clamps it and stamps the write.
    pub fn set_value(&mut self, value: impl Into<FeatureValue>) -> StatResult<()> {
        let value = value.into();
        let converted = value
            .convert_to(self.value_kind())
            .ok_or(StatError::TypeMismatch { expected: self.value_kind(), found: value.kind() })?;

        self.current_value = match &self.bounds {
            Some(bounds) => bounds.clamp(converted),
            None => converted,
        };
        self.last_modified = next_stamp();
        Ok(())
    }

    pub fn get_value<T: FeatureType>(&self) -> StatResult<T> {
        T::from_feature_value(self.current_value)
            .ok_or(StatError::TypeMismatch { expected: T::KIND, found: self.value_kind() })
    }

    /// Puts the current value back to the declared base.
    pub fn reset(&mut self) {
        self.current_value = self.base_value;
        self.last_modified = next_stamp();
    }
}
