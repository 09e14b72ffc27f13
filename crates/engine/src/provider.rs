//! Seams to the outside world.
//!
//! The engine never touches bytes on disk itself. A [`StreamProvider`] hands
//! out bounded slices of the pristine file, and a [`FileService`] replays an
//! [`EditScript`] against the whole file when saving or transforming.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::replay::EditScript;
use crate::transform::{FindReplaceSpec, MacroSpec};

/// How a delimited file is split into fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dialect {
    pub delimiter: u8,
    pub quote: u8,
}

impl Default for Dialect {
    fn default() -> Self {
        Self { delimiter: b',', quote: b'"' }
    }
}

impl Dialect {
    pub fn with_delimiter(delimiter: u8) -> Self {
        Self { delimiter, ..Self::default() }
    }

    /// Delimiter as shown to users; tab renders as `\t`.
    pub fn delimiter_display(&self) -> String {
        match self.delimiter {
            b'\t' => "\\t".to_string(),
            other => String::from_utf8_lossy(&[other]).to_string(),
        }
    }
}

/// Returned by [`StreamProvider::open_session`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: u64,
    pub headers: Vec<String>,
    pub delimiter: String,
}

/// A contiguous run of pristine data rows (header excluded).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WindowSlice {
    pub rows: Vec<Vec<String>>,
    pub start: usize,
    pub eof: bool,
}

/// Bounded reads over the pristine file.
pub trait StreamProvider {
    type Error: std::error::Error + Send + Sync + 'static;

    fn open_session(&mut self, path: &Path, dialect: &Dialect) -> Result<SessionInfo, Self::Error>;

    /// Data rows `[start, start + limit)` of the pristine stream.
    fn read_window(
        &mut self,
        path: &Path,
        dialect: &Dialect,
        start: usize,
        limit: usize,
    ) -> Result<WindowSlice, Self::Error>;

    fn count_rows(&mut self, path: &Path, dialect: &Dialect) -> Result<usize, Self::Error>;

    fn close_session(&mut self, session_id: u64);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineEnding {
    #[default]
    Crlf,
    Lf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TextEncoding {
    #[default]
    #[serde(rename = "utf-8")]
    Utf8,
    #[serde(rename = "utf-16le")]
    Utf16Le,
}

/// Output dialect for save and transforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportOptions {
    pub eol: LineEnding,
    pub bom: bool,
    pub encoding: TextEncoding,
    pub quote: u8,
    pub escape: u8,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            eol: LineEnding::Crlf,
            bom: false,
            encoding: TextEncoding::Utf8,
            quote: b'"',
            escape: b'"',
        }
    }
}

/// Result of a whole-file transform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformResult {
    pub output_path: PathBuf,
    /// Number of cells the transform changed.
    pub applied: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InferredType {
    Number,
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnStat {
    pub name: String,
    pub non_empty: usize,
    pub distinct: usize,
    pub distinct_truncated: bool,
    pub inferred: InferredType,
}

/// Full-file replay: save, macros, find/replace, column statistics.
///
/// Every write goes through the same three-phase replay
/// (rows, then columns, then cell patches) described by [`EditScript`],
/// and must leave the target either fully written or untouched.
pub trait FileService {
    type Error: std::error::Error + Send + Sync + 'static;

    fn save_with_patches(
        &mut self,
        path: &Path,
        target: &Path,
        dialect: &Dialect,
        script: &EditScript,
        options: &ExportOptions,
    ) -> Result<(), Self::Error>;

    fn apply_macro_to_file(
        &mut self,
        path: &Path,
        target: &Path,
        dialect: &Dialect,
        script: &EditScript,
        spec: &MacroSpec,
        options: &ExportOptions,
    ) -> Result<TransformResult, Self::Error>;

    fn apply_find_replace_to_file(
        &mut self,
        path: &Path,
        target: &Path,
        dialect: &Dialect,
        script: &EditScript,
        spec: &FindReplaceSpec,
        options: &ExportOptions,
    ) -> Result<TransformResult, Self::Error>;

    fn compute_column_stats(
        &mut self,
        path: &Path,
        dialect: &Dialect,
        max_distinct: usize,
    ) -> Result<Vec<ColumnStat>, Self::Error>;
}
