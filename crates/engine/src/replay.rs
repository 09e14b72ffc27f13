//! The edit script and its streaming replay.
//!
//! Replay order is fixed: row structure first, then column ops in the order
//! they were applied, then cell patches at their logical coordinates. Every
//! whole-file operation (save, macros, find/replace) goes through here.

use std::iter::Peekable;

use serde::{Deserialize, Serialize};

use crate::plan::{RowPlan, Segment};
use crate::structure::{ColumnOp, RowOp};

/// A single overlay entry in logical coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellPatch {
    pub row: usize,
    pub col: usize,
    pub value: String,
}

/// Everything needed to turn the pristine file into the edited one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditScript {
    /// Data rows in the pristine file, as counted when the session opened.
    pub pristine_rows: usize,
    pub patches: Vec<CellPatch>,
    pub row_ops: Vec<RowOp>,
    pub column_ops: Vec<ColumnOp>,
}

impl EditScript {
    pub fn is_empty(&self) -> bool {
        self.patches.is_empty() && self.row_ops.is_empty() && self.column_ops.is_empty()
    }

    /// Fold the row ops into a plan.
    pub fn plan(&self) -> RowPlan {
        let mut plan = RowPlan::default();
        for (i, op) in self.row_ops.iter().enumerate() {
            match op {
                RowOp::Insert { index, .. } => plan.insert(*index, i, self.pristine_rows),
                RowOp::Delete { index } => plan.delete(*index, self.pristine_rows),
            }
        }
        plan
    }

    pub fn reshape_headers(&self, headers: &[String]) -> Vec<String> {
        let mut headers = headers.to_vec();
        for op in &self.column_ops {
            op.apply_to_headers(&mut headers);
        }
        headers
    }

    /// Stream `source` (pristine data rows, in order) through the script,
    /// calling `emit` once per output row. Returns the number of rows emitted.
    ///
    /// Source rows are read at most once; rows the plan no longer covers
    /// are skipped.
    pub fn replay<I, F, E>(&self, source: I, mut emit: F) -> Result<usize, E>
    where
        I: IntoIterator<Item = Result<Vec<String>, E>>,
        F: FnMut(Vec<String>) -> Result<(), E>,
    {
        let plan = self.plan();
        let mut source = source.into_iter();
        let mut sorted: Vec<&CellPatch> = self.patches.iter().collect();
        sorted.sort_by_key(|p| (p.row, p.col));
        let mut patches = sorted.into_iter().peekable();

        let mut next_source = 0usize;
        let mut logical = 0usize;
        let mut exhausted = false;

        for segment in plan.segments() {
            match *segment {
                Segment::Inserted { op } => {
                    let values = match self.row_ops.get(op) {
                        Some(RowOp::Insert { values, .. }) => values.clone(),
                        _ => continue,
                    };
                    emit(self.finish_row(values, logical, &mut patches))?;
                    logical += 1;
                }
                Segment::Source { start, len } => {
                    while !exhausted && next_source < start {
                        match source.next() {
                            Some(row) => {
                                row?;
                                next_source += 1;
                            }
                            None => exhausted = true,
                        }
                    }
                    let mut taken = 0usize;
                    while !exhausted && len.map_or(true, |l| taken < l) {
                        match source.next() {
                            Some(row) => {
                                let row = row?;
                                next_source += 1;
                                taken += 1;
                                emit(self.finish_row(row, logical, &mut patches))?;
                                logical += 1;
                            }
                            None => exhausted = true,
                        }
                    }
                }
            }
        }
        Ok(logical)
    }

    fn finish_row<'a, P>(&self, mut row: Vec<String>, logical: usize, patches: &mut Peekable<P>) -> Vec<String>
    where
        P: Iterator<Item = &'a CellPatch>,
    {
        for op in &self.column_ops {
            op.apply_to_row(&mut row);
        }
        while let Some(patch) = patches.next_if(|p| p.row <= logical) {
            if patch.row < logical {
                continue;
            }
            if row.len() <= patch.col {
                row.resize(patch.col + 1, String::new());
            }
            row[patch.col] = patch.value.clone();
        }
        row
    }
}
