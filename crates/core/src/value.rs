use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A nested override tree, keyed by property name.
pub type PropertyMap = BTreeMap<String, PropertyValue>;

/// Separator used when a property path is rendered as a single string.
pub const PATH_SEPARATOR: char = '.';

/// A property value inside an override tree.
///
/// Maps merge key-by-key; every other variant, arrays included, is an atomic
/// leaf that replaces wholesale.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    Array(Vec<PropertyValue>),
    Map(PropertyMap),
}

impl PartialEq for PropertyValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.total_cmp(b).is_eq(),
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => a == b,
            (Self::Map(a), Self::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for PropertyValue {}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<i32> for PropertyValue {
    fn from(v: i32) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<PropertyMap> for PropertyValue {
    fn from(v: PropertyMap) -> Self {
        Self::Map(v)
    }
}

impl<T: Into<PropertyValue>> From<Vec<T>> for PropertyValue {
    fn from(v: Vec<T>) -> Self {
        Self::Array(v.into_iter().map(Into::into).collect())
    }
}

impl PropertyValue {
    pub fn is_null(&self) -> bool {
        matches!(self, PropertyValue::Null)
    }

    pub fn as_map(&self) -> Option<&PropertyMap> {
        match self {
            PropertyValue::Map(m) => Some(m),
            _ => None,
        }
    }

    /// True for values that terminate a path: anything but a non-empty map.
    pub fn is_leaf(&self) -> bool {
        match self {
            PropertyValue::Map(m) => m.is_empty(),
            _ => true,
        }
    }
}

/// Merge `overlay` into `base`: maps merge recursively, everything else in
/// `overlay` replaces what `base` held at the same key.
pub fn deep_merge(base: &mut PropertyMap, overlay: &PropertyMap) {
    for (key, incoming) in overlay {
        match (base.get_mut(key), incoming) {
            (Some(PropertyValue::Map(existing)), PropertyValue::Map(nested)) => {
                deep_merge(existing, nested);
            }
            _ => {
                base.insert(key.clone(), incoming.clone());
            }
        }
    }
}

pub fn get_path<'a>(map: &'a PropertyMap, path: &[String]) -> Option<&'a PropertyValue> {
    let (first, rest) = path.split_first()?;
    let value = map.get(first)?;
    if rest.is_empty() {
        return Some(value);
    }
    match value {
        PropertyValue::Map(nested) => get_path(nested, rest),
        _ => None,
    }
}

/// Write `value` at `path`, creating intermediate maps and replacing any
/// non-map value standing in the way. An empty path is a no-op.
pub fn set_path(map: &mut PropertyMap, path: &[String], value: PropertyValue) {
    let Some((first, rest)) = path.split_first() else {
        return;
    };
    if rest.is_empty() {
        map.insert(first.clone(), value);
        return;
    }
    let slot = map
        .entry(first.clone())
        .or_insert_with(|| PropertyValue::Map(PropertyMap::new()));
    if !matches!(slot, PropertyValue::Map(_)) {
        *slot = PropertyValue::Map(PropertyMap::new());
    }
    if let PropertyValue::Map(nested) = slot {
        set_path(nested, rest, value);
    }
}

/// Remove the value at `path`. Intermediate maps are left in place even when
/// they become empty.
pub fn remove_path(map: &mut PropertyMap, path: &[String]) -> Option<PropertyValue> {
    let (first, rest) = path.split_first()?;
    if rest.is_empty() {
        return map.remove(first);
    }
    match map.get_mut(first)? {
        PropertyValue::Map(nested) => remove_path(nested, rest),
        _ => None,
    }
}

/// Every leaf path under `value`, prefixed with `prefix`.
pub fn leaf_paths(prefix: &[String], value: &PropertyValue) -> Vec<Vec<String>> {
    let mut out = Vec::new();
    collect_leaves(prefix.to_vec(), value, &mut out);
    out
}

fn collect_leaves(path: Vec<String>, value: &PropertyValue, out: &mut Vec<Vec<String>>) {
    match value.as_map() {
        Some(nested) if !value.is_leaf() => {
            for (key, child) in nested {
                let mut child_path = path.clone();
                child_path.push(key.clone());
                collect_leaves(child_path, child, out);
            }
        }
        _ => out.push(path),
    }
}

pub fn dotted(path: &[String]) -> String {
    path.join(&PATH_SEPARATOR.to_string())
}

pub fn split_dotted(path: &str) -> Vec<String> {
    path.split(PATH_SEPARATOR).map(str::to_string).collect()
}

pub fn to_msgpack(map: &PropertyMap) -> Result<Vec<u8>, rmp_serde::encode::Error> {
    rmp_serde::to_vec(map)
}

pub fn from_msgpack(bytes: &[u8]) -> Result<PropertyMap, rmp_serde::decode::Error> {
    rmp_serde::from_slice(bytes)
}

/// Build a [`PropertyMap`] from `(key, value)` pairs.
pub fn map_of<K, V, I>(entries: I) -> PropertyMap
where
    K: Into<String>,
    V: Into<PropertyValue>,
    I: IntoIterator<Item = (K, V)>,
{
    entries
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}
