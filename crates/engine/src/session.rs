//! One open file and everything layered on top of it.
//!
//! `EditSession` owns the window manager, overlay, structural log, undo log,
//! selection and row projection. They share one coordinate space (logical
//! rows, current columns) and are reset together whenever the file, or the
//! dialect it is read with, changes.

use std::path::{Path, PathBuf};

use longtable_core::{GridBounds, Modifiers, Range, Selection, SelectionMode};

use crate::clipboard::{encode_tsv, parse_tsv, Clipboard};
use crate::error::{Axis, EngineError, Result};
use crate::history::{HistoryConfig, UndoLog};
use crate::overlay::{CellRead, PatchKey, PatchOverlay};
use crate::plan::Piece;
use crate::provider::{
    ColumnStat, Dialect, ExportOptions, FileService, SessionInfo, StreamProvider, TransformResult,
    WindowSlice,
};
use crate::replay::EditScript;
use crate::structure::{ColumnOp, RowOp, StructureLog};
use crate::transform::{FindReplaceSpec, FindReplacer, MacroSpec};
use crate::translator::{FilterRule, RowProjection, RowRules, SortRule};
use crate::window::{FetchOutcome, FetchRequest, Window, WindowConfig, WindowManager};

#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    pub window: WindowConfig,
    pub history: HistoryConfig,
}

#[derive(Debug, Clone)]
struct OpenFile {
    path: PathBuf,
    session_id: u64,
}

pub struct EditSession<P: StreamProvider> {
    provider: P,
    file: Option<OpenFile>,
    dialect: Dialect,
    windows: WindowManager,
    overlay: PatchOverlay,
    structure: StructureLog,
    history: UndoLog,
    selection: Selection,
    rules: RowRules,
    projection: RowProjection,
}

impl<P: StreamProvider> EditSession<P> {
    pub fn new(provider: P, config: SessionConfig) -> Self {
        Self {
            provider,
            file: None,
            dialect: Dialect::default(),
            windows: WindowManager::new(config.window),
            overlay: PatchOverlay::new(),
            structure: StructureLog::default(),
            history: UndoLog::new(config.history),
            selection: Selection::new(),
            rules: RowRules::default(),
            projection: RowProjection::identity(),
        }
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Open `path`, count its rows and load the first window.
    ///
    /// Any previous file is closed first; its edits are discarded.
    pub fn open(&mut self, path: impl AsRef<Path>, dialect: Dialect) -> Result<SessionInfo> {
        let path = path.as_ref().to_path_buf();
        self.close();
        self.dialect = dialect;

        let open_err = |e: &dyn std::fmt::Display| EngineError::Open {
            path: path.display().to_string(),
            message: e.to_string(),
        };
        let info = self
            .provider
            .open_session(&path, &dialect)
            .map_err(|e| open_err(&e))?;
        let total = match self.provider.count_rows(&path, &dialect) {
            Ok(total) => total,
            Err(e) => {
                self.provider.close_session(info.session_id);
                return Err(open_err(&e));
            }
        };

        self.structure.reset(info.headers.clone(), total);
        self.windows.set_total_rows(total);
        self.file = Some(OpenFile { path: path.clone(), session_id: info.session_id });
        log::info!(
            "opened {} ({} rows, {} columns, delimiter {})",
            path.display(),
            total,
            info.headers.len(),
            info.delimiter
        );

        self.load(0)?;
        Ok(info)
    }

    /// Close the current file, if any, and reset all edit state.
    pub fn close(&mut self) {
        if let Some(file) = self.file.take() {
            self.provider.close_session(file.session_id);
            log::debug!("closed {}", file.path.display());
        }
        self.reset_state();
    }

    /// Reopen the current file with a different dialect.
    pub fn set_dialect(&mut self, dialect: Dialect) -> Result<SessionInfo> {
        let path = self.path().ok_or(EngineError::NoSession)?.to_path_buf();
        self.open(path, dialect)
    }

    /// Overlay, both op logs, history, selection, rules and window go
    /// together; the generation bump makes in-flight fetches stale.
    fn reset_state(&mut self) {
        self.windows.reset();
        self.overlay.clear();
        self.structure.reset(Vec::new(), 0);
        self.history.clear();
        self.selection.clear();
        self.rules = RowRules::default();
        self.projection = RowProjection::identity();
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn provider_mut(&mut self) -> &mut P {
        &mut self.provider
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    pub fn path(&self) -> Option<&Path> {
        self.file.as_ref().map(|f| f.path.as_path())
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn generation(&self) -> u64 {
        self.windows.generation()
    }

    pub fn headers(&self) -> &[String] {
        self.structure.headers()
    }

    pub fn column_count(&self) -> usize {
        self.structure.column_count()
    }

    /// Rows in the edited document.
    pub fn row_count(&self) -> usize {
        self.structure.row_count()
    }

    pub fn window(&self) -> &Window {
        self.windows.window()
    }

    pub fn window_manager(&self) -> &WindowManager {
        &self.windows
    }

    pub fn overlay(&self) -> &PatchOverlay {
        &self.overlay
    }

    pub fn structure(&self) -> &StructureLog {
        &self.structure
    }

    pub fn history(&self) -> &UndoLog {
        &self.history
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn rules(&self) -> &RowRules {
        &self.rules
    }

    /// True when saving would produce something other than the source.
    pub fn is_modified(&self) -> bool {
        !self.overlay.is_empty() || self.structure.is_modified()
    }

    // -------------------------------------------------------------------------
    // Fetching
    // -------------------------------------------------------------------------

    /// Fetch and apply the window starting at `start`.
    /// Returns None when another fetch is pending.
    pub fn load(&mut self, start: usize) -> Result<Option<FetchOutcome>> {
        match self.begin_fetch(start) {
            Some(request) => {
                let rows = self.fetch_rows(request);
                self.complete_fetch(request, rows).map(Some)
            }
            None => Ok(None),
        }
    }

    /// React to the visible virtual range `[first, last]`.
    /// Prefetch is off while sort/filter rules are active.
    pub fn scroll(&mut self, first: usize, last: usize) -> Result<Option<FetchOutcome>> {
        if self.rules.is_active() || !self.is_open() {
            return Ok(None);
        }
        match self.windows.on_scroll(first, last) {
            Some(request) => {
                let rows = self.fetch_rows(request);
                self.complete_fetch(request, rows).map(Some)
            }
            None => Ok(None),
        }
    }

    /// Mark a fetch in flight without performing it.
    pub fn begin_fetch(&mut self, start: usize) -> Option<FetchRequest> {
        if !self.is_open() {
            return None;
        }
        self.windows.request(start)
    }

    /// Read the rows for `request` in logical order and current layout.
    pub fn fetch_rows(&mut self, request: FetchRequest) -> Result<WindowSlice> {
        let path = self.path().ok_or(EngineError::NoSession)?.to_path_buf();
        let pieces = self
            .structure
            .plan()
            .resolve(request.start, request.limit, self.structure.pristine_rows());

        let mut rows = Vec::with_capacity(request.limit);
        for piece in pieces {
            match piece {
                Piece::Source { start, len } => {
                    let slice = self
                        .provider
                        .read_window(&path, &self.dialect, start, len)
                        .map_err(|e| EngineError::Fetch {
                            start: request.start,
                            end: request.end(),
                            message: e.to_string(),
                        })?;
                    rows.extend(
                        slice
                            .rows
                            .into_iter()
                            .map(|row| self.structure.to_current_layout(row)),
                    );
                }
                Piece::Inserted { op } => {
                    rows.extend(self.structure.inserted_row(op));
                }
            }
        }
        let eof = request.start + rows.len() >= self.structure.row_count();
        Ok(WindowSlice { rows, start: request.start, eof })
    }

    /// Apply a response. Stale responses are discarded silently.
    pub fn complete_fetch(
        &mut self,
        request: FetchRequest,
        rows: Result<WindowSlice>,
    ) -> Result<FetchOutcome> {
        let outcome = self.windows.complete(request, rows)?;
        if matches!(outcome, FetchOutcome::Applied { .. }) {
            self.refresh_projection();
        }
        Ok(outcome)
    }

    // -------------------------------------------------------------------------
    // Cells
    // -------------------------------------------------------------------------

    pub fn cell(&self, row: usize, col: usize) -> CellRead<'_> {
        if let Some(value) = self.overlay.get(PatchKey::new(row, col)) {
            return CellRead::Patched(value);
        }
        match self.windows.window().cell(row, col) {
            Some(value) => CellRead::Base(value),
            None => CellRead::Unknown,
        }
    }

    /// Edit one resident cell. Returns true if the overlay changed.
    pub fn set_cell(&mut self, row: usize, col: usize, value: impl Into<String>) -> Result<bool> {
        self.check_editable(row, col)?;
        let changed = self.write_cell(row, col, value.into());
        if changed {
            self.refresh_projection();
        }
        Ok(changed)
    }

    pub fn undo(&mut self) -> Option<PatchKey> {
        let key = self.history.undo(&mut self.overlay)?;
        self.refresh_projection();
        Some(key)
    }

    pub fn redo(&mut self) -> Option<PatchKey> {
        let key = self.history.redo(&mut self.overlay)?;
        self.refresh_projection();
        Some(key)
    }

    fn check_editable(&self, row: usize, col: usize) -> Result<()> {
        let columns = self.column_count();
        if col >= columns {
            return Err(EngineError::InvalidIndex { axis: Axis::Column, index: col, count: columns });
        }
        let window = self.windows.window();
        if !window.contains(row) {
            return Err(EngineError::NotResident { row, start: window.start, end: window.end() });
        }
        Ok(())
    }

    /// Caller has checked residency.
    fn write_cell(&mut self, row: usize, col: usize, value: String) -> bool {
        let key = PatchKey::new(row, col);
        let base = self.windows.window().cell(row, col).unwrap_or("");
        let op = self.overlay.write(key, value, base);
        self.history.record(op)
    }

    // -------------------------------------------------------------------------
    // Structure
    // -------------------------------------------------------------------------

    /// Insert a row at logical `index` with `values` in the current layout.
    /// Input is padded with blanks or truncated to the column count.
    pub fn insert_row(&mut self, index: usize, values: &[String]) -> Result<()> {
        let mut values = values.to_vec();
        values.resize(self.column_count(), String::new());
        let base = self.structure.insert_row(index, &values)?;
        if let Some(op) = self.structure.row_ops().last().cloned() {
            self.remap_keys(|key| op.remap_key(key));
        }
        self.windows.window_mut().insert_row(index, base.clone());

        // Values the pristine layout cannot carry live in the overlay.
        for (col, value) in values.iter().enumerate() {
            if base.get(col).map(String::as_str).unwrap_or("") != value {
                self.overlay.raw_set(PatchKey::new(index, col), Some(value.clone()));
            }
        }
        log::debug!("inserted row {}", index);
        self.after_structure_change();
        Ok(())
    }

    pub fn delete_row(&mut self, index: usize) -> Result<()> {
        self.structure.delete_row(index)?;
        let op = RowOp::Delete { index };
        self.remap_keys(|key| op.remap_key(key));
        self.windows.window_mut().remove_row(index);
        log::debug!("deleted row {}", index);
        self.after_structure_change();
        Ok(())
    }

    pub fn insert_column(&mut self, index: usize, name: impl Into<String>) -> Result<()> {
        self.structure.insert_column(index, name.into())?;
        let op = ColumnOp::Insert { index, name: String::new() };
        self.remap_keys(|key| op.remap_key(key));
        self.remap_rule_columns(&op);
        self.windows.window_mut().insert_column(index);
        log::debug!("inserted column {}", index);
        self.after_structure_change();
        Ok(())
    }

    pub fn delete_column(&mut self, index: usize) -> Result<()> {
        self.structure.delete_column(index)?;
        let op = ColumnOp::Delete { index };
        self.remap_keys(|key| op.remap_key(key));
        self.remap_rule_columns(&op);
        self.windows.window_mut().remove_column(index);
        log::debug!("deleted column {}", index);
        self.after_structure_change();
        Ok(())
    }

    pub fn rename_column(&mut self, index: usize, name: impl Into<String>) -> Result<()> {
        self.structure.rename_column(index, name.into())
    }

    fn remap_keys<F>(&mut self, remap: F)
    where
        F: Fn(PatchKey) -> Option<PatchKey>,
    {
        self.overlay.remap(&remap);
        self.history.remap(&remap);
    }

    fn remap_rule_columns(&mut self, op: &ColumnOp) {
        self.rules.sort.retain_mut(|rule| match op.remap_col(rule.column) {
            Some(col) => {
                rule.column = col;
                true
            }
            None => false,
        });
        self.rules.filter.retain_mut(|rule| match op.remap_col(rule.column) {
            Some(col) => {
                rule.column = col;
                true
            }
            None => false,
        });
    }

    fn after_structure_change(&mut self) {
        self.windows.invalidate_pending();
        self.windows.set_total_rows(self.structure.row_count());
        self.selection.clamp_to(self.bounds());
        self.refresh_projection();
    }

    // -------------------------------------------------------------------------
    // Selection and clipboard
    // -------------------------------------------------------------------------

    /// Grid the selection lives in: visible rows by current columns.
    pub fn bounds(&self) -> GridBounds {
        GridBounds::new(self.visible_row_count(), self.column_count())
    }

    pub fn update_selection(&mut self, point: (usize, usize), mode: SelectionMode, mods: Modifiers) {
        let bounds = self.bounds();
        self.selection.update(point, mode, mods, bounds);
    }

    pub fn begin_drag(&mut self, point: (usize, usize), mode: SelectionMode, mods: Modifiers) {
        let bounds = self.bounds();
        self.selection.begin_drag(point, mode, mods, bounds);
    }

    pub fn drag_to(&mut self, point: (usize, usize)) {
        let bounds = self.bounds();
        self.selection.drag_to(point, bounds);
    }

    pub fn end_drag(&mut self) {
        self.selection.end_drag();
    }

    /// Copy the active range as tab-separated text. Returns the number of
    /// cells copied. Every row in the range must be resident.
    pub fn copy_selection(&self, clipboard: &mut dyn Clipboard) -> Result<usize> {
        let Some(range) = self.selection.active_range().copied() else {
            return Ok(0);
        };
        let grid = self.read_range(&range)?;
        clipboard
            .write_text(&encode_tsv(&grid))
            .map_err(EngineError::Clipboard)?;
        Ok(range.cell_count())
    }

    fn read_range(&self, range: &Range) -> Result<Vec<Vec<String>>> {
        let window = self.windows.window();
        let mut grid = Vec::with_capacity(range.end_row - range.start_row + 1);
        for virtual_row in range.start_row..=range.end_row {
            let row = self
                .logical_row(virtual_row)
                .filter(|&row| window.contains(row))
                .ok_or(EngineError::NotResident {
                    row: virtual_row,
                    start: window.start,
                    end: window.end(),
                })?;
            grid.push(
                (range.start_col..=range.end_col)
                    .map(|col| self.cell(row, col).as_str().to_string())
                    .collect(),
            );
        }
        Ok(grid)
    }

    /// Paste tab-separated text at the active cell. Returns the number of
    /// cells written.
    ///
    /// Columns past the last one are dropped. Rows past the end of the
    /// document are appended (only without sort/filter rules); all other
    /// target rows must be resident. Nothing is written if any check fails.
    pub fn paste(&mut self, clipboard: &mut dyn Clipboard) -> Result<usize> {
        let text = clipboard.read_text().map_err(EngineError::Clipboard)?;
        let grid = parse_tsv(&text);
        if grid.is_empty() {
            return Ok(0);
        }
        let (top, left) = self.selection.active_cell().unwrap_or((0, 0));
        let columns = self.column_count();
        if left >= columns {
            return Err(EngineError::InvalidIndex { axis: Axis::Column, index: left, count: columns });
        }
        let width = columns - left;

        // Resolve every target row before touching anything.
        let window = self.windows.window();
        let visible = self.visible_row_count();
        let mut existing = Vec::new();
        let mut appended = Vec::new();
        for (i, cells) in grid.into_iter().enumerate() {
            let virtual_row = top + i;
            let cells: Vec<String> = cells.into_iter().take(width).collect();
            if virtual_row < visible {
                let row = self.logical_row(virtual_row).filter(|&r| window.contains(r)).ok_or(
                    EngineError::NotResident { row: virtual_row, start: window.start, end: window.end() },
                )?;
                existing.push((row, cells));
            } else if self.rules.is_active() {
                return Err(EngineError::InvalidIndex { axis: Axis::Row, index: virtual_row, count: visible });
            } else {
                appended.push(cells);
            }
        }

        let mut written = 0;
        for (row, cells) in existing {
            for (offset, value) in cells.into_iter().enumerate() {
                self.write_cell(row, left + offset, value);
                written += 1;
            }
        }
        for cells in appended {
            let mut values = vec![String::new(); columns];
            written += cells.len();
            for (offset, value) in cells.into_iter().enumerate() {
                values[left + offset] = value;
            }
            self.insert_row(self.row_count(), &values)?;
        }
        self.refresh_projection();
        log::debug!("pasted {} cells at ({}, {})", written, top, left);
        Ok(written)
    }

    // -------------------------------------------------------------------------
    // Sort / filter
    // -------------------------------------------------------------------------

    pub fn set_rules(&mut self, sort: Vec<SortRule>, filter: Vec<FilterRule>) {
        self.rules = RowRules { sort, filter };
        self.refresh_projection();
        self.selection.clamp_to(self.bounds());
    }

    pub fn clear_rules(&mut self) {
        self.set_rules(Vec::new(), Vec::new());
    }

    /// Rebuild the projection over the resident rows.
    fn refresh_projection(&mut self) {
        if !self.rules.is_active() {
            self.projection = RowProjection::identity();
            return;
        }
        let window = self.windows.window();
        let projection = RowProjection::build(window.start..window.end(), &self.rules, |row, col| {
            self.cell(row, col).as_str().to_string()
        });
        self.projection = projection;
    }

    pub fn visible_row_count(&self) -> usize {
        self.projection.visible_count(self.row_count())
    }

    /// Logical row at a virtualization index.
    pub fn logical_row(&self, virtual_index: usize) -> Option<usize> {
        self.projection.logical_row(virtual_index, self.row_count())
    }

    pub fn virtual_index(&self, row: usize) -> Option<usize> {
        self.projection.virtual_index(row, self.row_count())
    }

    // -------------------------------------------------------------------------
    // Whole-file operations
    // -------------------------------------------------------------------------

    pub fn edit_script(&self) -> EditScript {
        EditScript {
            pristine_rows: self.structure.pristine_rows(),
            patches: self.overlay.to_patches(),
            row_ops: self.structure.row_ops().to_vec(),
            column_ops: self.structure.column_ops().to_vec(),
        }
    }

    /// Replay all edits into `target`. The session keeps its state.
    pub fn save<S: FileService>(
        &self,
        service: &mut S,
        target: &Path,
        options: &ExportOptions,
    ) -> Result<()> {
        let path = self.path().ok_or(EngineError::NoSession)?;
        let script = self.edit_script();
        service
            .save_with_patches(path, target, &self.dialect, &script, options)
            .map_err(|e| EngineError::Save(e.to_string()))?;
        log::info!(
            "saved {} ({} patches, {} row ops, {} column ops)",
            target.display(),
            script.patches.len(),
            script.row_ops.len(),
            script.column_ops.len()
        );
        Ok(())
    }

    pub fn apply_macro<S: FileService>(
        &self,
        service: &mut S,
        target: &Path,
        spec: &MacroSpec,
        options: &ExportOptions,
    ) -> Result<TransformResult> {
        let path = self.path().ok_or(EngineError::NoSession)?;
        let result = service
            .apply_macro_to_file(path, target, &self.dialect, &self.edit_script(), spec, options)
            .map_err(|e| EngineError::Save(e.to_string()))?;
        log::info!("macro changed {} cells into {}", result.applied, result.output_path.display());
        Ok(result)
    }

    /// Find/replace over the whole file. An invalid pattern is rejected
    /// before the service is called.
    pub fn apply_find_replace<S: FileService>(
        &self,
        service: &mut S,
        target: &Path,
        spec: &FindReplaceSpec,
        options: &ExportOptions,
    ) -> Result<TransformResult> {
        let path = self.path().ok_or(EngineError::NoSession)?;
        FindReplacer::new(spec)?;
        let result = service
            .apply_find_replace_to_file(path, target, &self.dialect, &self.edit_script(), spec, options)
            .map_err(|e| EngineError::Save(e.to_string()))?;
        log::info!("replace changed {} cells into {}", result.applied, result.output_path.display());
        Ok(result)
    }

    pub fn column_stats<S: FileService>(
        &self,
        service: &mut S,
        max_distinct: usize,
    ) -> Result<Vec<ColumnStat>> {
        let path = self.path().ok_or(EngineError::NoSession)?;
        service
            .compute_column_stats(path, &self.dialect, max_distinct)
            .map_err(|e| EngineError::Save(e.to_string()))
    }
}

impl<P: StreamProvider> Drop for EditSession<P> {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            self.provider.close_session(file.session_id);
        }
    }
}
