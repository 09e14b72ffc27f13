// Edit scripts: a JSON array of actions replayed against an open session.
//
// [
//   {"action": "set", "row": 0, "col": 1, "value": "x"},
//   {"action": "insert_row", "index": 3},
//   {"action": "delete_column", "index": 2}
// ]

use std::fmt;

use longtable_core::{Modifiers, SelectionMode};
use longtable_engine::clipboard::MemoryClipboard;
use longtable_engine::{EditSession, EngineError, StreamProvider};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum EditAction {
    Set { row: usize, col: usize, value: String },
    InsertRow {
        index: usize,
        #[serde(default)]
        values: Vec<String>,
    },
    DeleteRow { index: usize },
    InsertColumn { index: usize, name: String },
    DeleteColumn { index: usize },
    RenameColumn { index: usize, name: String },
    /// Tab-separated text pasted with its top-left cell at (row, col).
    Paste { row: usize, col: usize, text: String },
    Undo,
    Redo,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub actions: usize,
    pub cells: usize,
}

/// The action at `index` failed; the ones before it were applied.
#[derive(Debug)]
pub struct ActionError {
    pub index: usize,
    pub error: EngineError,
}

impl fmt::Display for ActionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "action {}: {}", self.index, self.error)
    }
}

pub fn parse(json: &str) -> Result<Vec<EditAction>, serde_json::Error> {
    serde_json::from_str(json)
}

/// Load the window around `row` unless it is already resident.
pub fn ensure_resident<P: StreamProvider>(
    session: &mut EditSession<P>,
    row: usize,
) -> Result<(), EngineError> {
    if row >= session.row_count() || session.window().contains(row) {
        return Ok(());
    }
    session.load(row)?;
    Ok(())
}

/// Apply one action. Returns the number of cells it changed.
pub fn apply<P: StreamProvider>(
    session: &mut EditSession<P>,
    action: &EditAction,
) -> Result<usize, EngineError> {
    match action {
        EditAction::Set { row, col, value } => {
            ensure_resident(session, *row)?;
            Ok(usize::from(session.set_cell(*row, *col, value.clone())?))
        }
        EditAction::InsertRow { index, values } => {
            session.insert_row(*index, values)?;
            Ok(0)
        }
        EditAction::DeleteRow { index } => {
            session.delete_row(*index)?;
            Ok(0)
        }
        EditAction::InsertColumn { index, name } => {
            session.insert_column(*index, name.clone())?;
            Ok(0)
        }
        EditAction::DeleteColumn { index } => {
            session.delete_column(*index)?;
            Ok(0)
        }
        EditAction::RenameColumn { index, name } => {
            session.rename_column(*index, name.clone())?;
            Ok(0)
        }
        EditAction::Paste { row, col, text } => {
            ensure_resident(session, *row)?;
            session.update_selection((*row, *col), SelectionMode::Cell, Modifiers::NONE);
            let mut clipboard = MemoryClipboard::with_text(text);
            session.paste(&mut clipboard)
        }
        EditAction::Undo => Ok(usize::from(session.undo().is_some())),
        EditAction::Redo => Ok(usize::from(session.redo().is_some())),
    }
}

/// Apply `actions` in order, stopping at the first failure.
pub fn run<P: StreamProvider>(
    session: &mut EditSession<P>,
    actions: &[EditAction],
) -> Result<RunSummary, ActionError> {
    let mut summary = RunSummary::default();
    for (index, action) in actions.iter().enumerate() {
        let cells = apply(session, action).map_err(|error| ActionError { index, error })?;
        tracing::debug!(index, ?action, cells, "applied");
        summary.actions += 1;
        summary.cells += cells;
    }
    Ok(summary)
}
