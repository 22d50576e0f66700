use std::collections::HashMap;
use std::ops::Range;

use crate::stat_error::{StatError, StatResult};

pub type StoreKindId = u32;
pub type AttributeId = u32;

/// Which dispatcher a reference resolves against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// `@Class.N`: the dispatcher the effect is attached through.
    Local,
    /// `!Class.N`: the foreign dispatcher on the other end of an interaction.
    External,
}

impl Side {
    pub fn sigil(&self) -> char {
        match self {
            Side::Local => '@',
            Side::External => '!',
        }
    }

    pub fn from_sigil(sigil: char) -> Option<Self> {
        match sigil {
            '@' => Some(Side::Local),
            '!' => Some(Side::External),
            _ => None,
        }
    }
}

/// Address of one attribute on one kind of store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatRef {
    pub store_kind: StoreKindId,
    pub attribute: AttributeId,
}

impl StatRef {
    pub fn new(store_kind: StoreKindId, attribute: AttributeId) -> Self {
        Self { store_kind, attribute }
    }
}

/// Where an effect writes its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetAddress {
    pub side: Side,
    pub stat: StatRef,
}

/// Maps store class names (e.g. "CharStats") to dense ids.
#[derive(Debug, Clone, Default)]
pub struct StoreKindRegistry {
    by_name: HashMap<String, StoreKindId>,
    names: Vec<String>,
}

impl StoreKindRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `name`, returning its id. Registering a known name returns the existing id.
    pub fn register(&mut self, name: &str) -> StoreKindId {
        if let Some(id) = self.by_name.get(name) {
            return *id;
        }
        let id = self.names.len() as StoreKindId;
        self.names.push(name.to_string());
        self.by_name.insert(name.to_string(), id);
        id
    }

    pub fn id_of(&self, class_name: &str) -> StatResult<StoreKindId> {
        self.by_name
            .get(class_name)
            .copied()
            .ok_or_else(|| StatError::UnknownStoreKind { class_name: class_name.to_string() })
    }

    pub fn name_of(&self, id: StoreKindId) -> Option<&str> {
        self.names.get(id as usize).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (StoreKindId, &str)> {
        self.names.iter().enumerate().map(|(id, name)| (id as StoreKindId, name.as_str()))
    }
}

/// A `@Class.N` or `!Class.N` token found in config text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawReference<'a> {
    pub side: Side,
    pub class_name: &'a str,
    pub attribute: AttributeId,
    /// Byte range of the whole token, sigil included.
    pub span: Range<usize>,
}

impl RawReference<'_> {
    pub fn resolve(&self, registry: &StoreKindRegistry) -> StatResult<StatRef> {
        Ok(StatRef::new(registry.id_of(self.class_name)?, self.attribute))
    }
}

fn is_ident_start(byte: u8) -> bool {
    byte.is_ascii_alphabetic() || byte == b'_'
}

fn is_ident_continue(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_'
}

// Matches `Class.N` starting at `start`, returning the class name, attribute and end offset.
fn match_reference_body(text: &str, start: usize) -> Option<(&str, AttributeId, usize)> {
    let bytes = text.as_bytes();
    if start >= bytes.len() || !is_ident_start(bytes[start]) {
        return None;
    }
    let mut cursor = start + 1;
    while cursor < bytes.len() && is_ident_continue(bytes[cursor]) {
        cursor += 1;
    }
    let class_end = cursor;
    if cursor >= bytes.len() || bytes[cursor] != b'.' {
        return None;
    }
    cursor += 1;
    let digits_start = cursor;
    while cursor < bytes.len() && bytes[cursor].is_ascii_digit() {
        cursor += 1;
    }
    if cursor == digits_start {
        return None;
    }
    let attribute = text[digits_start..cursor].parse::<AttributeId>().ok()?;
    Some((&text[start..class_end], attribute, cursor))
}

/// Finds every reference with the given sigil, left to right.
pub fn scan_references(text: &str, side: Side) -> Vec<RawReference<'_>> {
    let sigil = side.sigil() as u8;
    let bytes = text.as_bytes();
    let mut found = Vec::new();
    let mut index = 0;
    while index < bytes.len() {
        if bytes[index] == sigil {
            if let Some((class_name, attribute, end)) = match_reference_body(text, index + 1) {
                found.push(RawReference { side, class_name, attribute, span: index..end });
                index = end;
                continue;
            }
        }
        index += 1;
    }
    found
}

/// Parses an effect target such as `"@WeaponStats.3"` or `"!CharStats.1"`.
pub fn parse_descriptor(descriptor: &str) -> StatResult<RawReference<'_>> {
    let trimmed = descriptor.trim();
    let offset = descriptor.len() - descriptor.trim_start().len();
    let malformed = |details: &str| StatError::MalformedReference {
        reference: descriptor.to_string(),
        details: details.to_string(),
    };

    let sigil = trimmed.chars().next().ok_or_else(|| malformed("empty target"))?;
    let side = Side::from_sigil(sigil).ok_or_else(|| malformed("target must start with '@' or '!'"))?;
    let (class_name, attribute, end) =
        match_reference_body(trimmed, 1).ok_or_else(|| malformed("expected Class.attributeId"))?;
    if end != trimmed.len() {
        return Err(malformed("unexpected trailing characters"));
    }

    Ok(RawReference { side, class_name, attribute, span: offset..offset + end })
}
