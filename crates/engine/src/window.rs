//! Resident row window and prefetch policy.
//!
//! Only one slice of the logical row space is held in memory at a time.
//! A fetch wholly replaces it; there is no merging of non-adjacent slices.
//!
//! Fetches are split into `request` (marks one request in flight) and
//! `complete` (applies the rows). Triggers that arrive while a request is
//! pending are dropped, not queued. Every request carries the generation it
//! was issued under; completing a request from an older generation is a
//! silent no-op.

use crate::error::{EngineError, Result};
use crate::provider::WindowSlice;
use crate::structure::{insert_cell, remove_cell};

/// Tuning for window size and prefetch triggers.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowConfig {
    /// Bytes the resident window may use, before `budget_share` is applied.
    pub memory_budget: usize,
    /// Window size for the first fetch after a reset.
    pub initial_rows: usize,
    pub min_rows: usize,
    pub max_rows: usize,
    /// Distance (rows) from a window edge that triggers a prefetch.
    pub edge_margin: usize,
    /// Share of the window placed behind the viewport on a forward fetch.
    pub forward_lead: f64,
    /// Share of the window placed ahead of the viewport on a backward fetch.
    pub backward_lead: f64,
    pub budget_share: f64,
    /// Floor for the per-row byte estimate.
    pub min_row_bytes: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            memory_budget: 32 * 1024 * 1024,
            initial_rows: 1000,
            min_rows: 200,
            max_rows: 20_000,
            edge_margin: 20,
            forward_lead: 0.7,
            backward_lead: 0.3,
            budget_share: 0.6,
            min_row_bytes: 128,
        }
    }
}

/// The resident slice of logical rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Window {
    pub start: usize,
    pub rows: Vec<Vec<String>>,
    pub eof: bool,
}

impl Window {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// One past the last resident logical row.
    pub fn end(&self) -> usize {
        self.start + self.rows.len()
    }

    pub fn contains(&self, row: usize) -> bool {
        row >= self.start && row < self.end()
    }

    pub fn row(&self, row: usize) -> Option<&[String]> {
        if self.contains(row) {
            Some(&self.rows[row - self.start])
        } else {
            None
        }
    }

    /// Base value of a resident cell. Short rows read as empty.
    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        self.row(row)
            .map(|cells| cells.get(col).map(String::as_str).unwrap_or(""))
    }

    /// Keep the window aligned after a row was inserted at `at`.
    pub(crate) fn insert_row(&mut self, at: usize, values: Vec<String>) {
        if at < self.start {
            self.start += 1;
        } else if at <= self.end() {
            self.rows.insert(at - self.start, values);
        }
    }

    /// Keep the window aligned after the row at `at` was deleted.
    pub(crate) fn remove_row(&mut self, at: usize) {
        if at < self.start {
            self.start -= 1;
        } else if self.contains(at) {
            self.rows.remove(at - self.start);
        }
    }

    pub(crate) fn insert_column(&mut self, col: usize) {
        for row in &mut self.rows {
            insert_cell(row, col, String::new());
        }
    }

    pub(crate) fn remove_column(&mut self, col: usize) {
        for row in &mut self.rows {
            remove_cell(row, col);
        }
    }

    /// Rough in-memory size, used for the adaptive window estimate.
    fn estimated_bytes(&self) -> usize {
        self.rows
            .iter()
            .map(|row| row.iter().map(|c| c.len() + 1).sum::<usize>().max(1))
            .sum()
    }
}

/// A fetch that has been issued but not yet completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchRequest {
    pub id: u64,
    pub generation: u64,
    pub start: usize,
    pub limit: usize,
}

impl FetchRequest {
    pub fn end(&self) -> usize {
        self.start + self.limit
    }
}

/// What happened to a completed fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The window was replaced.
    Applied { start: usize, rows: usize },
    /// The response belonged to a superseded generation and was discarded.
    Stale,
}

#[derive(Debug)]
pub struct WindowManager {
    config: WindowConfig,
    window: Window,
    window_size: usize,
    total_rows: usize,
    in_flight: Option<FetchRequest>,
    generation: u64,
    next_request_id: u64,
}

impl WindowManager {
    pub fn new(config: WindowConfig) -> Self {
        let window_size = config.initial_rows.clamp(config.min_rows, config.max_rows);
        Self {
            config,
            window: Window::default(),
            window_size,
            total_rows: 0,
            in_flight: None,
            generation: 0,
            next_request_id: 1,
        }
    }

    pub fn config(&self) -> &WindowConfig {
        &self.config
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub(crate) fn window_mut(&mut self) -> &mut Window {
        &mut self.window
    }

    /// Rows the next fetch will ask for.
    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn total_rows(&self) -> usize {
        self.total_rows
    }

    pub fn set_total_rows(&mut self, total: usize) {
        self.total_rows = total;
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn in_flight(&self) -> Option<FetchRequest> {
        self.in_flight
    }

    /// Largest window start that still fills a whole window.
    pub fn max_start(&self) -> usize {
        self.total_rows.saturating_sub(self.window_size)
    }

    /// Drop the window and any pending request, and start a new generation.
    pub fn reset(&mut self) {
        self.generation += 1;
        self.window = Window::default();
        self.in_flight = None;
        self.total_rows = 0;
        self.window_size = self
            .config
            .initial_rows
            .clamp(self.config.min_rows, self.config.max_rows);
    }

    /// Start a new generation but keep the resident window. A pending request
    /// was resolved against the old row layout, so its response becomes stale.
    pub fn invalidate_pending(&mut self) {
        self.generation += 1;
        if let Some(pending) = self.in_flight.take() {
            log::debug!("fetch for rows {}..{} invalidated", pending.start, pending.end());
        }
    }

    /// Issue a fetch for `[start, start + window_size)`.
    /// Returns None when another fetch is still pending.
    pub fn request(&mut self, start: usize) -> Option<FetchRequest> {
        if let Some(pending) = self.in_flight {
            log::debug!("fetch at {} dropped, request {} still pending", start, pending.id);
            return None;
        }
        let request = FetchRequest {
            id: self.next_request_id,
            generation: self.generation,
            start: start.min(self.max_start()),
            limit: self.window_size,
        };
        self.next_request_id += 1;
        self.in_flight = Some(request);
        log::debug!(
            "fetch {} issued for rows {}..{} (generation {})",
            request.id,
            request.start,
            request.end(),
            request.generation
        );
        Some(request)
    }

    /// Decide whether the visible range `[first, last]` (virtualization
    /// indices) needs a new window, and issue the fetch if so.
    pub fn on_scroll(&mut self, first: usize, last: usize) -> Option<FetchRequest> {
        let next = self.prefetch_target(first, last)?;
        self.request(next)
    }

    /// Start of the window the scroll position calls for, if any.
    pub fn prefetch_target(&self, first: usize, last: usize) -> Option<usize> {
        let start = self.window.start;
        let loaded = self.window.len();
        let max_start = self.max_start();
        let margin = self.config.edge_margin;

        let target = if last + margin >= start + loaded && start < max_start {
            let lead = (self.window_size as f64 * self.config.forward_lead).floor() as usize;
            last.saturating_sub(lead).min(max_start)
        } else if first <= start + margin && start > 0 {
            let lead = (self.window_size as f64 * self.config.backward_lead).floor() as usize;
            first.saturating_sub(lead).min(max_start)
        } else {
            return None;
        };

        if target == start && loaded > 0 {
            return None;
        }
        Some(target)
    }

    /// Apply the response to `request`.
    ///
    /// A response from an older generation (or for a request that is no
    /// longer the pending one) is discarded and reported as
    /// [`FetchOutcome::Stale`]. A failed read leaves the window unchanged
    /// and returns the error; the request is cleared so the caller can
    /// retry.
    pub fn complete(
        &mut self,
        request: FetchRequest,
        response: Result<WindowSlice>,
    ) -> Result<FetchOutcome> {
        if request.generation != self.generation || self.in_flight != Some(request) {
            log::debug!(
                "discarding stale fetch {} (generation {}, current {})",
                request.id,
                request.generation,
                self.generation
            );
            return Ok(FetchOutcome::Stale);
        }
        self.in_flight = None;

        let slice = match response {
            Ok(slice) => slice,
            Err(EngineError::Fetch { start, end, message }) => {
                log::warn!("fetch {} failed: {}", request.id, message);
                return Err(EngineError::Fetch { start, end, message });
            }
            Err(other) => {
                log::warn!("fetch {} failed: {}", request.id, other);
                return Err(EngineError::Fetch {
                    start: request.start,
                    end: request.end(),
                    message: other.to_string(),
                });
            }
        };

        self.window = Window {
            start: request.start,
            rows: slice.rows,
            eof: slice.eof,
        };
        self.adapt_size();
        log::debug!(
            "fetch {} applied: rows {}..{}, next window size {}",
            request.id,
            self.window.start,
            self.window.end(),
            self.window_size
        );
        Ok(FetchOutcome::Applied {
            start: self.window.start,
            rows: self.window.len(),
        })
    }

    /// Re-estimate the window size from the rows just loaded.
    /// Takes effect on the next request only.
    fn adapt_size(&mut self) {
        if self.window.is_empty() {
            return;
        }
        let per_row = self.window.estimated_bytes() as f64 / self.window.len() as f64;
        let per_row = per_row.max(self.config.min_row_bytes as f64);
        let budget = self.config.memory_budget as f64 * self.config.budget_share;
        let rows = (budget / per_row).floor() as usize;
        self.window_size = rows.clamp(self.config.min_rows, self.config.max_rows);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(n: usize) -> Vec<Vec<String>> {
        (0..n).map(|i| vec![i.to_string(), "x".to_string()]).collect()
    }

    /// Budget sized so that short rows keep the window at 400.
    fn config_400() -> WindowConfig {
        WindowConfig {
            memory_budget: 85_334,
            initial_rows: 400,
            ..WindowConfig::default()
        }
    }

    fn loaded(config: WindowConfig, total: usize, start: usize) -> WindowManager {
        let mut wm = WindowManager::new(config);
        wm.set_total_rows(total);
        let req = wm.request(start).unwrap();
        let slice = WindowSlice { rows: rows(req.limit), start: req.start, eof: false };
        wm.complete(req, Ok(slice)).unwrap();
        wm
    }

    #[test]
    fn test_forward_prefetch_issues_one_fetch() {
        let mut wm = loaded(config_400(), 10_000, 0);
        assert_eq!(wm.window_size(), 400);
        assert_eq!(wm.max_start(), 9_600);

        let req = wm.on_scroll(360, 395).expect("forward fetch");
        assert!(req.start > 0);
        assert!(req.start <= wm.max_start());
        assert_eq!(req.start, 395 - 280);

        // A second trigger while pending is dropped, not queued.
        assert_eq!(wm.on_scroll(370, 399), None);
        assert_eq!(wm.in_flight(), Some(req));
    }

    #[test]
    fn test_no_prefetch_in_the_middle() {
        let mut wm = loaded(config_400(), 10_000, 0);
        assert_eq!(wm.on_scroll(100, 150), None);
        assert!(!wm.is_loading());
    }

    #[test]
    fn test_backward_prefetch() {
        let mut wm = loaded(config_400(), 10_000, 1_000);
        let req = wm.on_scroll(1_010, 1_040).expect("backward fetch");
        assert_eq!(req.start, 1_010 - 120);
    }

    #[test]
    fn test_backward_clamps_to_zero() {
        let mut wm = loaded(config_400(), 10_000, 50);
        let req = wm.on_scroll(55, 80).unwrap();
        assert_eq!(req.start, 0);
    }

    #[test]
    fn test_forward_stops_at_max_start() {
        let mut wm = loaded(config_400(), 10_000, 9_600);
        assert_eq!(wm.on_scroll(9_900, 9_999), None);
    }

    #[test]
    fn test_invalidate_pending_keeps_window() {
        let mut wm = loaded(config_400(), 10_000, 0);
        let req = wm.on_scroll(360, 395).unwrap();
        let before = wm.window().clone();

        wm.invalidate_pending();
        assert!(!wm.is_loading());
        let slice = WindowSlice { rows: rows(400), start: req.start, eof: false };
        assert_eq!(wm.complete(req, Ok(slice)).unwrap(), FetchOutcome::Stale);
        assert_eq!(wm.window(), &before);

        // A fresh request goes through.
        let req = wm.on_scroll(360, 395).unwrap();
        assert_eq!(req.generation, wm.generation());
    }

    #[test]
    fn test_stale_generation_discarded() {
        let mut wm = loaded(config_400(), 10_000, 0);
        let req = wm.on_scroll(360, 395).unwrap();
        let before = wm.window().clone();

        wm.reset();
        wm.set_total_rows(10_000);
        let slice = WindowSlice { rows: rows(400), start: req.start, eof: false };
        assert_eq!(wm.complete(req, Ok(slice)).unwrap(), FetchOutcome::Stale);
        assert!(wm.window().is_empty());
        assert_ne!(wm.window(), &before);
        assert!(!wm.is_loading());
    }

    #[test]
    fn test_failed_fetch_keeps_window() {
        let mut wm = loaded(config_400(), 10_000, 0);
        let before = wm.window().clone();
        let req = wm.on_scroll(360, 395).unwrap();
        let err = wm
            .complete(req, Err(EngineError::Fetch { start: req.start, end: req.end(), message: "disk".into() }))
            .unwrap_err();
        assert!(matches!(err, EngineError::Fetch { .. }));
        assert_eq!(wm.window(), &before);
        assert!(!wm.is_loading());
    }

    #[test]
    fn test_adaptive_size_applies_to_next_fetch_only() {
        let config = WindowConfig { memory_budget: 1_000_000, initial_rows: 1000, ..WindowConfig::default() };
        let mut wm = WindowManager::new(config);
        wm.set_total_rows(1_000_000);
        let req = wm.request(0).unwrap();
        assert_eq!(req.limit, 1000);

        // ~1000 bytes per row -> 600_000 / 1000 = 600 rows
        let wide: Vec<Vec<String>> = (0..req.limit).map(|_| vec!["a".repeat(999)]).collect();
        wm.complete(req, Ok(WindowSlice { rows: wide, start: 0, eof: false })).unwrap();
        assert_eq!(wm.window().len(), 1000);
        assert_eq!(wm.window_size(), 600);

        let next = wm.request(5_000).unwrap();
        assert_eq!(next.limit, 600);
    }

    #[test]
    fn test_window_size_bounds() {
        let config = WindowConfig { memory_budget: 10, ..WindowConfig::default() };
        let wm = loaded(config, 100_000, 0);
        assert_eq!(wm.window_size(), 200);

        let config = WindowConfig { memory_budget: usize::MAX / 4, ..WindowConfig::default() };
        let wm = loaded(config, 100_000, 0);
        assert_eq!(wm.window_size(), 20_000);
    }

    #[test]
    fn test_window_structural_alignment() {
        let mut w = Window { start: 10, rows: rows(3), eof: false };
        w.insert_row(5, vec!["new".into()]);
        assert_eq!(w.start, 11);
        w.insert_row(12, vec!["mid".into()]);
        assert_eq!(w.cell(12, 0), Some("mid"));
        assert_eq!(w.len(), 4);
        w.remove_row(11);
        assert_eq!(w.cell(11, 0), Some("mid"));
        w.remove_row(0);
        assert_eq!(w.start, 10);
        assert_eq!(w.cell(10, 0), Some("mid"));
        assert_eq!(w.cell(10, 7), Some(""));
        assert_eq!(w.cell(50, 0), None);
    }
}
