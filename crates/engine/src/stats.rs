//! Per-column statistics gathered over a streamed file.

use rustc_hash::FxHashSet;

use crate::provider::{ColumnStat, InferredType};

/// Default cap on distinct values tracked per column.
pub const DEFAULT_MAX_DISTINCT: usize = 5000;

#[derive(Debug, Default)]
struct ColumnAcc {
    non_empty: usize,
    numbers: usize,
    distinct: FxHashSet<String>,
    truncated: bool,
}

#[derive(Debug)]
pub struct StatsAccumulator {
    headers: Vec<String>,
    columns: Vec<ColumnAcc>,
    max_distinct: usize,
}

impl StatsAccumulator {
    pub fn new(headers: Vec<String>, max_distinct: usize) -> Self {
        let columns = headers.iter().map(|_| ColumnAcc::default()).collect();
        Self { headers, columns, max_distinct }
    }

    /// Fold one data row in. Fields beyond the header count are ignored.
    pub fn push_row<S: AsRef<str>>(&mut self, row: &[S]) {
        for (acc, value) in self.columns.iter_mut().zip(row) {
            let value = value.as_ref().trim();
            if value.is_empty() {
                continue;
            }
            acc.non_empty += 1;
            if value.parse::<f64>().is_ok() {
                acc.numbers += 1;
            }
            if acc.truncated {
                continue;
            }
            if acc.distinct.len() < self.max_distinct {
                acc.distinct.insert(value.to_string());
            } else if !acc.distinct.contains(value) {
                acc.truncated = true;
            }
        }
    }

    pub fn finish(self) -> Vec<ColumnStat> {
        self.headers
            .into_iter()
            .zip(self.columns)
            .map(|(name, acc)| ColumnStat {
                name,
                non_empty: acc.non_empty,
                distinct: acc.distinct.len(),
                distinct_truncated: acc.truncated,
                inferred: if acc.non_empty > 0 && acc.numbers == acc.non_empty {
                    InferredType::Number
                } else {
                    InferredType::Text
                },
            })
            .collect()
    }
}
