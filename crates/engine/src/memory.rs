//! In-memory stream provider and file service.
//!
//! Tables live in a shared map keyed by path, so a store handed to a session
//! can still be inspected (and told to fail) from outside. Used by tests and
//! by callers that already hold their data in memory.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use thiserror::Error;

use crate::provider::{
    ColumnStat, Dialect, ExportOptions, FileService, SessionInfo, StreamProvider, TransformResult,
    WindowSlice,
};
use crate::replay::EditScript;
use crate::stats::StatsAccumulator;
use crate::transform::{FindReplaceSpec, FindReplacer, MacroSpec};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl MemoryTable {
    pub fn new<S: AsRef<str>>(headers: &[S], rows: &[Vec<S>]) -> Self {
        let owned = |cells: &[S]| -> Vec<String> { cells.iter().map(|c| c.as_ref().to_string()).collect() };
        Self {
            headers: owned(headers),
            rows: rows.iter().map(|r| owned(r)).collect(),
        }
    }
}

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("no table at {0}")]
    NotFound(PathBuf),
    #[error("injected failure: {0}")]
    Injected(String),
    #[error(transparent)]
    Pattern(#[from] regex::Error),
}

#[derive(Debug, Default)]
struct Inner {
    tables: HashMap<PathBuf, MemoryTable>,
    next_session: u64,
    open_sessions: Vec<u64>,
    reads: Vec<(usize, usize)>,
    fail_reads: bool,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Rc<RefCell<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: impl Into<PathBuf>, table: MemoryTable) {
        self.inner.borrow_mut().tables.insert(path.into(), table);
    }

    pub fn table(&self, path: impl AsRef<Path>) -> Option<MemoryTable> {
        self.inner.borrow().tables.get(path.as_ref()).cloned()
    }

    /// Make every following `read_window` fail until turned off.
    pub fn set_fail_reads(&self, fail: bool) {
        self.inner.borrow_mut().fail_reads = fail;
    }

    /// `(start, limit)` of every window read so far.
    pub fn reads(&self) -> Vec<(usize, usize)> {
        self.inner.borrow().reads.clone()
    }

    pub fn open_sessions(&self) -> usize {
        self.inner.borrow().open_sessions.len()
    }

    fn load(&self, path: &Path) -> Result<MemoryTable, MemoryError> {
        self.table(path).ok_or_else(|| MemoryError::NotFound(path.to_path_buf()))
    }

    /// Replay `script` over the table at `path`, passing each output row
    /// through `each`, and store the result at `target`.
    fn replay_into<F>(&self, path: &Path, target: &Path, script: &EditScript, mut each: F) -> Result<(), MemoryError>
    where
        F: FnMut(&mut Vec<String>),
    {
        let source = self.load(path)?;
        let mut rows = Vec::new();
        script.replay(source.rows.into_iter().map(Ok), |mut row| {
            each(&mut row);
            rows.push(row);
            Ok::<_, MemoryError>(())
        })?;
        let headers = script.reshape_headers(&source.headers);
        self.insert(target, MemoryTable { headers, rows });
        Ok(())
    }
}

impl StreamProvider for MemoryStore {
    type Error = MemoryError;

    fn open_session(&mut self, path: &Path, dialect: &Dialect) -> Result<SessionInfo, MemoryError> {
        let table = self.load(path)?;
        let mut inner = self.inner.borrow_mut();
        inner.next_session += 1;
        let session_id = inner.next_session;
        inner.open_sessions.push(session_id);
        Ok(SessionInfo {
            session_id,
            headers: table.headers,
            delimiter: dialect.delimiter_display(),
        })
    }

    fn read_window(
        &mut self,
        path: &Path,
        _dialect: &Dialect,
        start: usize,
        limit: usize,
    ) -> Result<WindowSlice, MemoryError> {
        self.inner.borrow_mut().reads.push((start, limit));
        if self.inner.borrow().fail_reads {
            return Err(MemoryError::Injected(format!("read {start}+{limit}")));
        }
        let table = self.load(path)?;
        let end = start.saturating_add(limit).min(table.rows.len());
        let rows = table.rows.get(start..end).map(<[_]>::to_vec).unwrap_or_default();
        Ok(WindowSlice { rows, start, eof: end >= table.rows.len() })
    }

    fn count_rows(&mut self, path: &Path, _dialect: &Dialect) -> Result<usize, MemoryError> {
        Ok(self.load(path)?.rows.len())
    }

    fn close_session(&mut self, session_id: u64) {
        self.inner.borrow_mut().open_sessions.retain(|&id| id != session_id);
    }
}

impl FileService for MemoryStore {
    type Error = MemoryError;

    fn save_with_patches(
        &mut self,
        path: &Path,
        target: &Path,
        _dialect: &Dialect,
        script: &EditScript,
        _options: &ExportOptions,
    ) -> Result<(), MemoryError> {
        self.replay_into(path, target, script, |_| {})
    }

    fn apply_macro_to_file(
        &mut self,
        path: &Path,
        target: &Path,
        _dialect: &Dialect,
        script: &EditScript,
        spec: &MacroSpec,
        _options: &ExportOptions,
    ) -> Result<TransformResult, MemoryError> {
        let mut applied = 0;
        self.replay_into(path, target, script, |row| {
            if spec.apply_to_row(row) {
                applied += 1;
            }
        })?;
        Ok(TransformResult { output_path: target.to_path_buf(), applied })
    }

    fn apply_find_replace_to_file(
        &mut self,
        path: &Path,
        target: &Path,
        _dialect: &Dialect,
        script: &EditScript,
        spec: &FindReplaceSpec,
        _options: &ExportOptions,
    ) -> Result<TransformResult, MemoryError> {
        let replacer = FindReplacer::new(spec)?;
        let mut applied = 0;
        self.replay_into(path, target, script, |row| {
            applied += replacer.apply_to_row(row);
        })?;
        Ok(TransformResult { output_path: target.to_path_buf(), applied })
    }

    fn compute_column_stats(
        &mut self,
        path: &Path,
        _dialect: &Dialect,
        max_distinct: usize,
    ) -> Result<Vec<ColumnStat>, MemoryError> {
        let table = self.load(path)?;
        let mut acc = StatsAccumulator::new(table.headers, max_distinct);
        for row in &table.rows {
            acc.push_row(row.as_slice());
        }
        Ok(acc.finish())
    }
}
