//! Sparse cell overlay keyed by logical coordinates.
//!
//! Absence of a key means "equals base". Writes that restore the base value
//! remove the entry, so the overlay grows with distinct edits, not file size.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::history::PatchOp;
use crate::replay::CellPatch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PatchKey {
    pub row: usize,
    pub col: usize,
}

impl PatchKey {
    #[inline]
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

/// A cell read through the overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellRead<'a> {
    /// Value from the overlay.
    Patched(&'a str),
    /// Base value from the resident window.
    Base(&'a str),
    /// Row not resident and not patched. Reads as empty but is not a real value.
    Unknown,
}

impl<'a> CellRead<'a> {
    pub fn as_str(&self) -> &'a str {
        match self {
            Self::Patched(s) | Self::Base(s) => s,
            Self::Unknown => "",
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown)
    }

    pub fn is_patched(&self) -> bool {
        matches!(self, Self::Patched(_))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatchOverlay {
    entries: FxHashMap<PatchKey, String>,
}

impl PatchOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: PatchKey) -> Option<&str> {
        self.entries.get(&key).map(String::as_str)
    }

    pub fn contains(&self, key: PatchKey) -> bool {
        self.entries.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PatchKey, &String)> {
        self.entries.iter()
    }

    /// Write `value` over `base`, tombstoning when they match.
    /// Returns the op describing the change (possibly a no-op).
    pub fn write(&mut self, key: PatchKey, value: String, base: &str) -> PatchOp {
        let next = if value == base { None } else { Some(value) };
        let prev = self.raw_set(key, next.clone());
        PatchOp { key, prev, next }
    }

    /// Set or remove an entry verbatim, with no base comparison.
    /// Returns the previous entry.
    pub fn raw_set(&mut self, key: PatchKey, value: Option<String>) -> Option<String> {
        match value {
            Some(v) => self.entries.insert(key, v),
            None => self.entries.remove(&key),
        }
    }

    /// Move every key through `remap`; keys mapped to None are dropped.
    /// `remap` must be injective on the keys it keeps.
    pub fn remap<F>(&mut self, remap: F)
    where
        F: Fn(PatchKey) -> Option<PatchKey>,
    {
        let entries = std::mem::take(&mut self.entries);
        self.entries = entries
            .into_iter()
            .filter_map(|(key, value)| remap(key).map(|k| (k, value)))
            .collect();
    }

    /// All entries as patches, ordered by row then column.
    pub fn to_patches(&self) -> Vec<CellPatch> {
        let mut patches: Vec<CellPatch> = self
            .entries
            .iter()
            .map(|(key, value)| CellPatch {
                row: key.row,
                col: key.col,
                value: value.clone(),
            })
            .collect();
        patches.sort_by_key(|p| (p.row, p.col));
        patches
    }
}
