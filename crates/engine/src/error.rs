use std::fmt;

use thiserror::Error;

/// Which axis an index refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Row,
    Column,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Row => write!(f, "row"),
            Self::Column => write!(f, "column"),
        }
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    /// Reading a window from the stream provider failed. The resident
    /// window is left as it was.
    #[error("failed to read rows {start}..{end}: {message}")]
    Fetch { start: usize, end: usize, message: String },

    /// An op referenced a row/column outside the current bounds.
    /// Rejected before any state changed.
    #[error("{axis} index {index} out of range (count {count})")]
    InvalidIndex { axis: Axis, index: usize, count: usize },

    /// A cell write targeted a row that is not in the resident window.
    #[error("row {row} is not loaded (resident rows {start}..{end})")]
    NotResident { row: usize, start: usize, end: usize },

    /// Opening or counting a file failed.
    #[error("cannot open {path}: {message}")]
    Open { path: String, message: String },

    /// The file service failed while replaying edits.
    #[error("save failed: {0}")]
    Save(String),

    /// A find/replace pattern failed to compile.
    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("clipboard: {0}")]
    Clipboard(String),

    #[error("no file is open")]
    NoSession,
}

pub type Result<T> = std::result::Result<T, EngineError>;
