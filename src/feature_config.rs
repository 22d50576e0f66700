//! Line-oriented feature file parsing.
//!
//! ```text
//! // comment
//! #>Enemy-CharStats
//! health=50 ID:1 range:0-100
//! speed=3.5 ID:2
//! isAutomatic=false ID:3
//! ##
//! ```
//!
//! A block starts with `#>Owner-Class` (the older `#Owner-Class` form is also accepted)
//! and ends with `##`. The literal's form picks the feature's type.

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};

use log::warn;

use crate::feature::{Feature, FeatureBounds, FeatureValue, ValueKind};
use crate::feature_kind::FeatureKind;
use crate::stat_addressing::AttributeId;
use crate::stat_error::{StatError, StatResult};

pub type FeatureSet = BTreeMap<AttributeId, Feature>;

/// Hash of a block label such as `"Enemy-CharStats"`.
pub fn label_hash(label: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    label.trim().hash(&mut hasher);
    hasher.finish()
}

/// Hash under which the features of `owner_name`'s `class_name` store are filed.
pub fn feature_set_key(owner_name: &str, class_name: &str) -> u64 {
    label_hash(&format!("{}-{}", owner_name, class_name))
}

fn strip_comment(line: &str) -> &str {
    match line.find("//") {
        Some(index) => &line[..index],
        None => line,
    }
}

/// Parses every block in `text`. Bad lines are logged and skipped; they never abort
/// the file.
pub fn parse_feature_sets(text: &str) -> HashMap<u64, FeatureSet> {
    let mut sets = HashMap::new();
    let mut current: Option<(String, FeatureSet)> = None;

    for (index, raw) in text.lines().enumerate() {
        let line_number = index + 1;
        let line = strip_comment(raw).trim();
        if line.is_empty() {
            continue;
        }

        if line == "##" {
            match current.take() {
                Some((label, set)) => close_block(label, set, &mut sets),
                None => warn!("Line {}: '##' without an open block", line_number),
            }
            continue;
        }

        if let Some(label) = line.strip_prefix('#') {
            let label = label.strip_prefix('>').unwrap_or(label).trim();
            if let Some((open_label, set)) = current.take() {
                warn!("Line {}: block '{}' was never closed", line_number, open_label);
                close_block(open_label, set, &mut sets);
            }
            current = Some((label.to_string(), FeatureSet::new()));
            continue;
        }

        let Some((label, set)) = current.as_mut() else {
            warn!("Line {}: feature outside of any block", line_number);
            continue;
        };
        match parse_feature_line(line, line_number) {
            Ok((id, feature)) => {
                if set.insert(id, feature).is_some() {
                    warn!("Line {}: id {} repeated in block '{}'", line_number, id, label);
                }
            }
            Err(err) => warn!("Skipping feature in block '{}': {}", label, err),
        }
    }

    if let Some((label, set)) = current.take() {
        warn!("Block '{}' was never closed", label);
        close_block(label, set, &mut sets);
    }

    sets
}

fn close_block(label: String, set: FeatureSet, sets: &mut HashMap<u64, FeatureSet>) {
    if sets.insert(label_hash(&label), set).is_some() {
        warn!("Feature block '{}' declared twice, keeping the last one", label);
    }
}

/// Parses `Kind=literal ID:n [range:min-max]`.
pub fn parse_feature_line(line: &str, line_number: usize) -> StatResult<(AttributeId, Feature)> {
    let bad_line = |details: String| StatError::FeatureLine { line: line_number, details };

    let mut tokens = line.split_whitespace();
    let declaration = tokens.next().ok_or_else(|| bad_line("empty line".to_string()))?;
    let (kind_name, literal) = declaration
        .split_once('=')
        .ok_or_else(|| bad_line(format!("expected Kind=value, found '{}'", declaration)))?;

    let kind = FeatureKind::from_name(kind_name).ok_or_else(|| bad_line(format!("unknown feature kind '{}'", kind_name)))?;
    if kind.is_reserved() {
        return Err(StatError::ReservedFeature { kind: kind_name.to_string() });
    }
    let value = FeatureValue::parse_literal(literal).ok_or_else(|| bad_line(format!("bad literal '{}'", literal)))?;

    let mut id = None;
    let mut range = None;
    for token in tokens {
        if let Some(raw_id) = token.strip_prefix("ID:").or_else(|| token.strip_prefix("id:")) {
            let parsed = raw_id.parse::<AttributeId>().map_err(|_| bad_line(format!("bad id '{}'", raw_id)))?;
            id = Some(parsed);
        } else if let Some(raw_range) = token.strip_prefix("range:") {
            range = Some(parse_range(raw_range).ok_or_else(|| bad_line(format!("bad range '{}'", raw_range)))?);
        } else {
            return Err(bad_line(format!("unexpected token '{}'", token)));
        }
    }
    let id = id.ok_or_else(|| bad_line("missing ID:n".to_string()))?;

    if let Some((min, max)) = range {
        if value.kind() == ValueKind::Int && !FeatureBounds::new(min, max).holds_integer() {
            return Err(bad_line(format!("range {}-{} holds no integer for an int feature", min, max)));
        }
    }

    let mut feature = Feature::new(kind, value);
    if let Some((min, max)) = range {
        feature = feature.with_bounds(min, max);
    }
    Ok((id, feature))
}

// `min-max`, where either side may itself be negative (`-5--1`).
fn parse_range(raw: &str) -> Option<(f32, f32)> {
    raw.char_indices()
        .skip(1)
        .filter(|(_, c)| *c == '-')
        .find_map(|(split, _)| {
            let min = raw[..split].parse::<f32>().ok()?;
            let max = raw[split + 1..].parse::<f32>().ok()?;
            Some((min, max))
        })
}
