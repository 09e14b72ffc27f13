//! Virtual index ↔ logical row translation under sort/filter rules.
//!
//! Without rules the mapping is the identity and costs nothing. With rules
//! the projection is an explicit list built over the resident rows only;
//! the session disables prefetch while it is active.

use std::cmp::Ordering;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortRule {
    pub column: usize,
    #[serde(default)]
    pub direction: SortDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextFilterMode {
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    Equals,
    NotEquals,
}

/// Text predicate on one column. All filter rules must pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterRule {
    pub column: usize,
    pub mode: TextFilterMode,
    pub value: String,
    #[serde(default)]
    pub case_sensitive: bool,
}

impl FilterRule {
    pub fn matches(&self, text: &str) -> bool {
        let (haystack, needle) = if self.case_sensitive {
            (text.to_string(), self.value.clone())
        } else {
            (text.to_lowercase(), self.value.to_lowercase())
        };

        match self.mode {
            TextFilterMode::Contains => haystack.contains(&needle),
            TextFilterMode::NotContains => !haystack.contains(&needle),
            TextFilterMode::StartsWith => haystack.starts_with(&needle),
            TextFilterMode::EndsWith => haystack.ends_with(&needle),
            TextFilterMode::Equals => haystack == needle,
            TextFilterMode::NotEquals => haystack != needle,
        }
    }
}

/// Sortable form of a cell: numbers before text, blanks always last.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum SortValue {
    Number(OrderedFloat<f64>),
    Text(String),
    Blank,
}

impl SortValue {
    fn from_cell(text: &str) -> Self {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            Self::Blank
        } else if let Ok(n) = trimmed.parse::<f64>() {
            Self::Number(OrderedFloat(n))
        } else {
            Self::Text(trimmed.to_lowercase())
        }
    }
}

fn compare(a: &SortValue, b: &SortValue, direction: SortDirection) -> Ordering {
    match (a, b) {
        (SortValue::Blank, SortValue::Blank) => Ordering::Equal,
        (SortValue::Blank, _) => Ordering::Greater,
        (_, SortValue::Blank) => Ordering::Less,
        _ if direction == SortDirection::Descending => b.cmp(a),
        _ => a.cmp(b),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowRules {
    pub sort: Vec<SortRule>,
    pub filter: Vec<FilterRule>,
}

impl RowRules {
    pub fn is_active(&self) -> bool {
        !self.sort.is_empty() || !self.filter.is_empty()
    }
}

/// Visible rows in display order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowProjection {
    /// `None` is the identity mapping.
    visible: Option<Vec<usize>>,
}

impl RowProjection {
    pub fn identity() -> Self {
        Self::default()
    }

    /// Filter then stable-sort `rows` (logical indices, in logical order).
    /// `value_at(row, col)` reads the cell as the user sees it.
    pub fn build<I, F>(rows: I, rules: &RowRules, value_at: F) -> Self
    where
        I: IntoIterator<Item = usize>,
        F: Fn(usize, usize) -> String,
    {
        if !rules.is_active() {
            return Self::identity();
        }
        let mut keyed: Vec<(usize, Vec<SortValue>)> = rows
            .into_iter()
            .filter(|&row| rules.filter.iter().all(|f| f.matches(&value_at(row, f.column))))
            .map(|row| {
                let keys = rules
                    .sort
                    .iter()
                    .map(|s| SortValue::from_cell(&value_at(row, s.column)))
                    .collect();
                (row, keys)
            })
            .collect();

        keyed.sort_by(|(_, a), (_, b)| {
            rules
                .sort
                .iter()
                .zip(a.iter().zip(b))
                .map(|(rule, (x, y))| compare(x, y, rule.direction))
                .find(|o| o.is_ne())
                .unwrap_or(Ordering::Equal)
        });

        Self {
            visible: Some(keyed.into_iter().map(|(row, _)| row).collect()),
        }
    }

    pub fn is_active(&self) -> bool {
        self.visible.is_some()
    }

    pub fn visible_count(&self, logical_len: usize) -> usize {
        match &self.visible {
            Some(rows) => rows.len(),
            None => logical_len,
        }
    }

    /// Logical row shown at virtual index `index`.
    pub fn logical_row(&self, index: usize, logical_len: usize) -> Option<usize> {
        match &self.visible {
            Some(rows) => rows.get(index).copied(),
            None => (index < logical_len).then_some(index),
        }
    }

    /// Virtual index of a logical row, if it is visible.
    pub fn virtual_index(&self, row: usize, logical_len: usize) -> Option<usize> {
        match &self.visible {
            Some(rows) => rows.iter().position(|&r| r == row),
            None => (row < logical_len).then_some(row),
        }
    }
}
