//! Field-level merge rules for updating existing entities.

use serde_json::{Map, Value};

/// How an incoming value treats an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePolicy {
    /// Write only when the existing value is empty. Set values are never clobbered.
    FillEmpty,
    /// Write whenever the incoming value is present.
    AlwaysRefresh,
}

/// Values that can be "empty" for merge purposes.
pub trait Blank {
    fn is_blank(&self) -> bool;
}

impl Blank for String {
    fn is_blank(&self) -> bool {
        self.trim().is_empty()
    }
}

impl<T> Blank for Vec<T> {
    fn is_blank(&self) -> bool {
        self.is_empty()
    }
}

impl Blank for i64 {
    fn is_blank(&self) -> bool {
        false
    }
}

impl Blank for chrono::DateTime<chrono::Utc> {
    fn is_blank(&self) -> bool {
        false
    }
}

/// Merge `incoming` into `existing` under `policy`. Returns true on change.
///
/// An absent or blank incoming value never erases anything.
pub fn merge_field<T>(existing: &mut Option<T>, incoming: Option<T>, policy: MergePolicy) -> bool
where
    T: Blank + PartialEq,
{
    let Some(incoming) = incoming.filter(|v| !v.is_blank()) else {
        return false;
    };

    let writable = match policy {
        MergePolicy::FillEmpty => existing.as_ref().map_or(true, Blank::is_blank),
        MergePolicy::AlwaysRefresh => true,
    };

    if writable && existing.as_ref() != Some(&incoming) {
        *existing = Some(incoming);
        true
    } else {
        false
    }
}

/// Same as [`merge_field`] for non-optional fields where blank means unset.
pub fn merge_value<T>(existing: &mut T, incoming: Option<T>, policy: MergePolicy) -> bool
where
    T: Blank + PartialEq,
{
    let Some(incoming) = incoming.filter(|v| !v.is_blank()) else {
        return false;
    };

    let writable = match policy {
        MergePolicy::FillEmpty => existing.is_blank(),
        MergePolicy::AlwaysRefresh => true,
    };

    if writable && *existing != incoming {
        *existing = incoming;
        true
    } else {
        false
    }
}

/// Shallow-merge metadata maps; incoming keys win.
pub fn merge_metadata(existing: &mut Map<String, Value>, incoming: &Map<String, Value>) -> bool {
    let mut changed = false;
    for (key, value) in incoming {
        if existing.get(key) != Some(value) {
            existing.insert(key.clone(), value.clone());
            changed = true;
        }
    }
    changed
}
