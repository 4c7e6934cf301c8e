//! Structural comparison of property trees.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::{PropertyMap, PropertyValue, dotted, remove_path, set_path};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeType {
    Added,
    Modified,
    Removed,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Added => "ADDED",
            Self::Modified => "MODIFIED",
            Self::Removed => "REMOVED",
        }
    }
}

/// One leaf-level difference between two property trees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyChange {
    pub path: Vec<String>,
    pub change_type: ChangeType,
    pub old_value: Option<PropertyValue>,
    pub new_value: Option<PropertyValue>,
}

impl PropertyChange {
    /// The path rendered with `.` separators.
    pub fn dotted_path(&self) -> String {
        dotted(&self.path)
    }
}

impl fmt::Display for PropertyChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.change_type.as_str(), self.dotted_path())
    }
}

/// Compare `before` with `after`. Keys are visited in sorted order, so the
/// output order is stable. Nested maps are descended into; arrays and
/// scalars are compared whole.
pub fn diff(before: Option<&PropertyMap>, after: Option<&PropertyMap>) -> Vec<PropertyChange> {
    let empty = PropertyMap::new();
    let mut changes = Vec::new();
    diff_maps(
        before.unwrap_or(&empty),
        after.unwrap_or(&empty),
        &mut Vec::new(),
        &mut changes,
    );
    changes
}

fn diff_maps(
    before: &PropertyMap,
    after: &PropertyMap,
    path: &mut Vec<String>,
    changes: &mut Vec<PropertyChange>,
) {
    let keys: BTreeSet<&String> = before.keys().chain(after.keys()).collect();
    for key in keys {
        path.push(key.clone());
        match (before.get(key), after.get(key)) {
            (None, Some(new)) => changes.push(PropertyChange {
                path: path.clone(),
                change_type: ChangeType::Added,
                old_value: None,
                new_value: Some(new.clone()),
            }),
            (Some(old), None) => changes.push(PropertyChange {
                path: path.clone(),
                change_type: ChangeType::Removed,
                old_value: Some(old.clone()),
                new_value: None,
            }),
            (Some(PropertyValue::Map(old)), Some(PropertyValue::Map(new))) => {
                diff_maps(old, new, path, changes);
            }
            (Some(old), Some(new)) if old != new => changes.push(PropertyChange {
                path: path.clone(),
                change_type: ChangeType::Modified,
                old_value: Some(old.clone()),
                new_value: Some(new.clone()),
            }),
            _ => {}
        }
        path.pop();
    }
}

/// Replay `changes` on top of `base`. Applying `diff(a, b)` to `a` yields `b`.
pub fn apply_changes(base: &PropertyMap, changes: &[PropertyChange]) -> PropertyMap {
    let mut out = base.clone();
    for change in changes {
        match (&change.change_type, &change.new_value) {
            (ChangeType::Removed, _) => {
                remove_path(&mut out, &change.path);
            }
            (_, Some(value)) => set_path(&mut out, &change.path, value.clone()),
            (_, None) => {}
        }
    }
    out
}
