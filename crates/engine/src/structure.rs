//! Row/column mutations and the coordinate remapping they imply.
//!
//! Both logs are append-only and ordered by application. Indices in an op
//! are logical coordinates at the moment the op was applied.
//!
//! Inserted rows store their values in the *pristine* column layout, since
//! save-time replay rebuilds rows from the original stream and then applies
//! every column op to all emitted rows alike.

use serde::{Deserialize, Serialize};

use crate::error::{Axis, EngineError, Result};
use crate::overlay::PatchKey;
use crate::plan::RowPlan;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RowOp {
    Insert { index: usize, values: Vec<String> },
    Delete { index: usize },
}

impl RowOp {
    pub fn index(&self) -> usize {
        match self {
            Self::Insert { index, .. } | Self::Delete { index } => *index,
        }
    }

    /// Where a row that existed before this op ends up after it.
    pub fn remap_row(&self, row: usize) -> Option<usize> {
        match *self {
            Self::Insert { index, .. } if row >= index => Some(row + 1),
            Self::Insert { .. } => Some(row),
            Self::Delete { index } if row == index => None,
            Self::Delete { index } if row > index => Some(row - 1),
            Self::Delete { .. } => Some(row),
        }
    }

    pub fn remap_key(&self, key: PatchKey) -> Option<PatchKey> {
        self.remap_row(key.row).map(|row| PatchKey::new(row, key.col))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ColumnOp {
    Insert { index: usize, name: String },
    Delete { index: usize },
    Rename { index: usize, name: String },
}

impl ColumnOp {
    pub fn index(&self) -> usize {
        match self {
            Self::Insert { index, .. } | Self::Delete { index } | Self::Rename { index, .. } => *index,
        }
    }

    /// Where a column that existed before this op ends up after it.
    pub fn remap_col(&self, col: usize) -> Option<usize> {
        match *self {
            Self::Insert { index, .. } if col >= index => Some(col + 1),
            Self::Delete { index } if col == index => None,
            Self::Delete { index } if col > index => Some(col - 1),
            Self::Insert { .. } | Self::Delete { .. } | Self::Rename { .. } => Some(col),
        }
    }

    pub fn remap_key(&self, key: PatchKey) -> Option<PatchKey> {
        self.remap_col(key.col).map(|col| PatchKey::new(key.row, col))
    }

    /// Reshape one data row forward through this op.
    pub fn apply_to_row(&self, row: &mut Vec<String>) {
        match self {
            Self::Insert { index, .. } => insert_cell(row, *index, String::new()),
            Self::Delete { index } => remove_cell(row, *index),
            Self::Rename { .. } => {}
        }
    }

    /// Undo this op on a data row (used to recover the pristine layout).
    pub fn revert_on_row(&self, row: &mut Vec<String>) {
        match self {
            Self::Insert { index, .. } => remove_cell(row, *index),
            Self::Delete { index } => insert_cell(row, *index, String::new()),
            Self::Rename { .. } => {}
        }
    }

    pub fn apply_to_headers(&self, headers: &mut Vec<String>) {
        match self {
            Self::Insert { index, name } => insert_cell(headers, *index, name.clone()),
            Self::Delete { index } => remove_cell(headers, *index),
            Self::Rename { index, name } => {
                if let Some(h) = headers.get_mut(*index) {
                    *h = name.clone();
                }
            }
        }
    }
}

/// Insert `value` at `index`, padding short rows with blanks first.
pub(crate) fn insert_cell(row: &mut Vec<String>, index: usize, value: String) {
    if row.len() < index {
        row.resize(index, String::new());
    }
    row.insert(index, value);
}

/// Remove the cell at `index` if the row is long enough to have it.
pub(crate) fn remove_cell(row: &mut Vec<String>, index: usize) {
    if index < row.len() {
        row.remove(index);
    }
}

/// Append-only row and column op logs plus the headers they produce.
#[derive(Debug, Clone, Default)]
pub struct StructureLog {
    pristine_headers: Vec<String>,
    headers: Vec<String>,
    pristine_rows: usize,
    row_ops: Vec<RowOp>,
    column_ops: Vec<ColumnOp>,
    plan: RowPlan,
}

impl StructureLog {
    pub fn new(headers: Vec<String>, pristine_rows: usize) -> Self {
        Self {
            pristine_headers: headers.clone(),
            headers,
            pristine_rows,
            ..Self::default()
        }
    }

    /// Start over with a new pristine file.
    pub fn reset(&mut self, headers: Vec<String>, pristine_rows: usize) {
        *self = Self::new(headers, pristine_rows);
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn pristine_headers(&self) -> &[String] {
        &self.pristine_headers
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    pub fn pristine_rows(&self) -> usize {
        self.pristine_rows
    }

    /// Rows in the edited document.
    pub fn row_count(&self) -> usize {
        self.plan.logical_len(self.pristine_rows)
    }

    pub fn row_ops(&self) -> &[RowOp] {
        &self.row_ops
    }

    pub fn column_ops(&self) -> &[ColumnOp] {
        &self.column_ops
    }

    pub fn plan(&self) -> &RowPlan {
        &self.plan
    }

    pub fn is_modified(&self) -> bool {
        !self.row_ops.is_empty() || !self.column_ops.is_empty()
    }

    /// Insert a row at `index` whose values are given in the current layout.
    ///
    /// Returns the row as the replay will rebuild it (pristine values pushed
    /// forward through every column op). Cells that differ from the input
    /// could not be expressed in the pristine layout and must be carried by
    /// the overlay.
    pub fn insert_row(&mut self, index: usize, values: &[String]) -> Result<Vec<String>> {
        let count = self.row_count();
        if index > count {
            return Err(EngineError::InvalidIndex { axis: Axis::Row, index, count });
        }
        let pristine = self.to_pristine_layout(values);
        let base = self.to_current_layout(pristine.clone());
        self.plan.insert(index, self.row_ops.len(), self.pristine_rows);
        self.row_ops.push(RowOp::Insert { index, values: pristine });
        Ok(base)
    }

    pub fn delete_row(&mut self, index: usize) -> Result<()> {
        let count = self.row_count();
        if index >= count {
            return Err(EngineError::InvalidIndex { axis: Axis::Row, index, count });
        }
        self.plan.delete(index, self.pristine_rows);
        self.row_ops.push(RowOp::Delete { index });
        Ok(())
    }

    pub fn insert_column(&mut self, index: usize, name: String) -> Result<()> {
        self.check_column(index, self.column_count() + 1)?;
        self.push_column_op(ColumnOp::Insert { index, name });
        Ok(())
    }

    pub fn delete_column(&mut self, index: usize) -> Result<()> {
        self.check_column(index, self.column_count())?;
        self.push_column_op(ColumnOp::Delete { index });
        Ok(())
    }

    pub fn rename_column(&mut self, index: usize, name: String) -> Result<()> {
        self.check_column(index, self.column_count())?;
        self.push_column_op(ColumnOp::Rename { index, name });
        Ok(())
    }

    /// Strip the session's column ops off `values`, newest first.
    pub fn to_pristine_layout(&self, values: &[String]) -> Vec<String> {
        let mut row = values.to_vec();
        for op in self.column_ops.iter().rev() {
            op.revert_on_row(&mut row);
        }
        row
    }

    /// Push a pristine-layout row through every column op, oldest first.
    pub fn to_current_layout(&self, mut row: Vec<String>) -> Vec<String> {
        for op in &self.column_ops {
            op.apply_to_row(&mut row);
        }
        row
    }

    /// Current-layout values of the row inserted by `row_ops[op]`.
    pub fn inserted_row(&self, op: usize) -> Option<Vec<String>> {
        match self.row_ops.get(op)? {
            RowOp::Insert { values, .. } => Some(self.to_current_layout(values.clone())),
            RowOp::Delete { .. } => None,
        }
    }

    fn check_column(&self, index: usize, bound: usize) -> Result<()> {
        if index >= bound {
            return Err(EngineError::InvalidIndex {
                axis: Axis::Column,
                index,
                count: self.column_count(),
            });
        }
        Ok(())
    }

    fn push_column_op(&mut self, op: ColumnOp) {
        op.apply_to_headers(&mut self.headers);
        self.column_ops.push(op);
    }
}
