use serde::{Deserialize, Serialize};

/// A rectangular range of cells, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub start_row: usize,
    pub start_col: usize,
    pub end_row: usize,
    pub end_col: usize,
}

impl Range {
    /// Create a new range, automatically normalizing so start <= end.
    pub fn new(r1: usize, c1: usize, r2: usize, c2: usize) -> Self {
        Self {
            start_row: r1.min(r2),
            start_col: c1.min(c2),
            end_row: r1.max(r2),
            end_col: c1.max(c2),
        }
    }

    /// Create a single-cell range.
    pub fn single(row: usize, col: usize) -> Self {
        Self::new(row, col, row, col)
    }

    /// Check if this range contains a cell.
    pub fn contains(&self, row: usize, col: usize) -> bool {
        row >= self.start_row && row <= self.end_row &&
        col >= self.start_col && col <= self.end_col
    }

    /// Number of cells in this range.
    pub fn cell_count(&self) -> usize {
        (self.end_row - self.start_row + 1) * (self.end_col - self.start_col + 1)
    }

    /// Iterate over all cells in this range (row-major order).
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize)> {
        let (start_col, end_col) = (self.start_col, self.end_col);
        (self.start_row..=self.end_row).flat_map(move |r| {
            (start_col..=end_col).map(move |c| (r, c))
        })
    }

    /// Check if this is a single cell.
    pub fn is_single(&self) -> bool {
        self.start_row == self.end_row && self.start_col == self.end_col
    }

    /// Shrink the range to fit inside `bounds`.
    /// Returns None when nothing of the range survives.
    pub fn clamped(&self, bounds: GridBounds) -> Option<Self> {
        if bounds.is_empty() || self.start_row >= bounds.rows || self.start_col >= bounds.cols {
            return None;
        }
        Some(Self {
            start_row: self.start_row,
            start_col: self.start_col,
            end_row: self.end_row.min(bounds.rows - 1),
            end_col: self.end_col.min(bounds.cols - 1),
        })
    }
}

/// Current row/column counts the selection is clamped against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GridBounds {
    pub rows: usize,
    pub cols: usize,
}

impl GridBounds {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self { rows, cols }
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0 || self.cols == 0
    }

    fn clamp_point(&self, (row, col): (usize, usize)) -> (usize, usize) {
        (row.min(self.rows - 1), col.min(self.cols - 1))
    }
}

/// What a click selects: a cell rectangle, whole rows, or whole columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    #[default]
    Cell,
    Row,
    Col,
}

/// Keyboard modifiers held during a selection gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
}

impl Modifiers {
    pub const NONE: Self = Self { shift: false, ctrl: false };
    pub const SHIFT: Self = Self { shift: true, ctrl: false };
    pub const CTRL: Self = Self { shift: false, ctrl: true };
}

/// The selection model: ordered list of ranges, the last one is active.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    ranges: Vec<Range>,
    anchor: Option<(usize, usize)>,
    mode: SelectionMode,
    dragging: bool,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all ranges.
    pub fn ranges(&self) -> &[Range] {
        &self.ranges
    }

    /// The focused range (last in the list).
    pub fn active_range(&self) -> Option<&Range> {
        self.ranges.last()
    }

    /// Get the active cell (top-left of active range).
    pub fn active_cell(&self) -> Option<(usize, usize)> {
        self.active_range().map(|r| (r.start_row, r.start_col))
    }

    /// Get the anchor cell (for extending selections).
    pub fn anchor(&self) -> Option<(usize, usize)> {
        self.anchor
    }

    pub fn mode(&self) -> SelectionMode {
        self.mode
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn clear(&mut self) {
        self.ranges.clear();
        self.anchor = None;
        self.dragging = false;
        self.mode = SelectionMode::Cell;
    }

    /// Apply a click-style gesture at `point`.
    ///
    /// - plain: replace everything with a single range at `point`
    /// - ctrl: append a new range at `point`
    /// - shift: rebuild only the last range from the stored anchor to `point`
    ///
    /// Coordinates are clamped against `bounds`; with an empty grid the
    /// selection is cleared.
    pub fn update(&mut self, point: (usize, usize), mode: SelectionMode, mods: Modifiers, bounds: GridBounds) {
        if bounds.is_empty() {
            self.clear();
            return;
        }
        let point = bounds.clamp_point(point);
        self.mode = mode;

        match (mods.shift, self.anchor, self.ranges.is_empty()) {
            (true, Some(anchor), false) => {
                let anchor = bounds.clamp_point(anchor);
                let range = Self::build(anchor, point, mode, bounds);
                if let Some(last) = self.ranges.last_mut() {
                    *last = range;
                }
            }
            _ if mods.ctrl && !mods.shift => {
                self.ranges.push(Self::build(point, point, mode, bounds));
                self.anchor = Some(point);
            }
            _ => {
                self.ranges = vec![Self::build(point, point, mode, bounds)];
                self.anchor = Some(point);
            }
        }
    }

    /// Start a mouse drag: same as a click, then subsequent `drag_to` calls extend.
    pub fn begin_drag(&mut self, point: (usize, usize), mode: SelectionMode, mods: Modifiers, bounds: GridBounds) {
        self.update(point, mode, mods, bounds);
        self.dragging = !self.ranges.is_empty();
    }

    pub fn drag_to(&mut self, point: (usize, usize), bounds: GridBounds) {
        if self.dragging {
            self.update(point, self.mode, Modifiers::SHIFT, bounds);
        }
    }

    pub fn end_drag(&mut self) {
        self.dragging = false;
    }

    /// Shrink every range to `bounds` after the grid got smaller.
    /// Ranges that fall entirely outside are dropped.
    pub fn clamp_to(&mut self, bounds: GridBounds) {
        self.ranges = self.ranges.iter().filter_map(|r| r.clamped(bounds)).collect();
        if self.ranges.is_empty() {
            self.anchor = None;
            self.dragging = false;
        } else if let Some(anchor) = self.anchor {
            self.anchor = Some(bounds.clamp_point(anchor));
        }
    }

    /// Check if a cell is selected.
    pub fn is_cell_in_selection(&self, row: usize, col: usize) -> bool {
        self.ranges.iter().any(|r| r.contains(row, col))
    }

    /// True if any range touches `row` (header highlight).
    pub fn is_row_in_selection(&self, row: usize) -> bool {
        self.ranges.iter().any(|r| row >= r.start_row && row <= r.end_row)
    }

    /// True if any range touches `col` (header highlight).
    pub fn is_col_in_selection(&self, col: usize) -> bool {
        self.ranges.iter().any(|r| col >= r.start_col && col <= r.end_col)
    }

    /// True if some range covers the whole of `row`.
    pub fn is_full_row_selected(&self, row: usize, bounds: GridBounds) -> bool {
        !bounds.is_empty()
            && self.ranges.iter().any(|r| {
                r.contains(row, 0) && r.start_col == 0 && r.end_col == bounds.cols - 1
            })
    }

    /// True if some range covers the whole of `col`.
    pub fn is_full_col_selected(&self, col: usize, bounds: GridBounds) -> bool {
        !bounds.is_empty()
            && self.ranges.iter().any(|r| {
                r.contains(0, col) && r.start_row == 0 && r.end_row == bounds.rows - 1
            })
    }

    /// Total number of selected cells (overlaps counted twice).
    pub fn cell_count(&self) -> usize {
        self.ranges.iter().map(|r| r.cell_count()).sum()
    }

    fn build(anchor: (usize, usize), point: (usize, usize), mode: SelectionMode, bounds: GridBounds) -> Range {
        match mode {
            SelectionMode::Cell => Range::new(anchor.0, anchor.1, point.0, point.1),
            SelectionMode::Row => Range::new(anchor.0, 0, point.0, bounds.cols - 1),
            SelectionMode::Col => Range::new(0, anchor.1, bounds.rows - 1, point.1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOUNDS: GridBounds = GridBounds { rows: 10, cols: 5 };

    #[test]
    fn test_range_normalizes() {
        let r = Range::new(5, 5, 1, 1);
        assert_eq!(r.start_row, 1);
        assert_eq!(r.start_col, 1);
        assert_eq!(r.end_row, 5);
        assert_eq!(r.end_col, 5);
        assert_eq!(r.cell_count(), 25);
    }

    #[test]
    fn test_range_clamped() {
        let r = Range::new(2, 1, 8, 4);
        assert_eq!(r.clamped(GridBounds::new(5, 3)), Some(Range::new(2, 1, 4, 2)));
        assert_eq!(r.clamped(GridBounds::new(2, 3)), None);
        assert_eq!(r.clamped(GridBounds::new(0, 3)), None);
    }

    #[test]
    fn test_click_ctrl_shift_sequence() {
        let mut sel = Selection::new();
        sel.update((0, 0), SelectionMode::Cell, Modifiers::NONE, BOUNDS);
        assert_eq!(sel.ranges(), &[Range::single(0, 0)]);

        sel.update((2, 2), SelectionMode::Cell, Modifiers::CTRL, BOUNDS);
        assert_eq!(sel.ranges(), &[Range::single(0, 0), Range::single(2, 2)]);

        sel.update((3, 3), SelectionMode::Cell, Modifiers::SHIFT, BOUNDS);
        assert_eq!(sel.ranges(), &[Range::single(0, 0), Range::new(2, 2, 3, 3)]);
        assert_eq!(sel.anchor(), Some((2, 2)));
    }

    #[test]
    fn test_shift_without_anchor_acts_as_click() {
        let mut sel = Selection::new();
        sel.update((4, 1), SelectionMode::Cell, Modifiers::SHIFT, BOUNDS);
        assert_eq!(sel.ranges(), &[Range::single(4, 1)]);
        assert_eq!(sel.anchor(), Some((4, 1)));
    }

    #[test]
    fn test_row_and_col_modes_snap() {
        let mut sel = Selection::new();
        sel.update((3, 2), SelectionMode::Row, Modifiers::NONE, BOUNDS);
        assert_eq!(sel.ranges(), &[Range::new(3, 0, 3, 4)]);
        assert!(sel.is_full_row_selected(3, BOUNDS));

        sel.update((1, 2), SelectionMode::Col, Modifiers::NONE, BOUNDS);
        assert_eq!(sel.ranges(), &[Range::new(0, 2, 9, 2)]);
        assert!(sel.is_full_col_selected(2, BOUNDS));
        assert!(!sel.is_full_row_selected(1, BOUNDS));
    }

    #[test]
    fn test_points_clamped_at_build_time() {
        let mut sel = Selection::new();
        sel.update((50, 50), SelectionMode::Cell, Modifiers::NONE, BOUNDS);
        assert_eq!(sel.ranges(), &[Range::single(9, 4)]);
    }

    #[test]
    fn test_clamp_after_shrink() {
        let mut sel = Selection::new();
        sel.update((1, 1), SelectionMode::Cell, Modifiers::NONE, BOUNDS);
        sel.update((8, 3), SelectionMode::Cell, Modifiers::SHIFT, BOUNDS);
        sel.update((9, 0), SelectionMode::Cell, Modifiers::CTRL, BOUNDS);

        sel.clamp_to(GridBounds::new(5, 5));
        assert_eq!(sel.ranges(), &[Range::new(1, 1, 4, 3)]);
        assert_eq!(sel.anchor(), Some((4, 0)));
    }

    #[test]
    fn test_drag_extends_last_range() {
        let mut sel = Selection::new();
        sel.begin_drag((1, 1), SelectionMode::Cell, Modifiers::NONE, BOUNDS);
        sel.drag_to((2, 3), BOUNDS);
        sel.drag_to((3, 2), BOUNDS);
        sel.end_drag();
        sel.drag_to((9, 4), BOUNDS);
        assert_eq!(sel.ranges(), &[Range::new(1, 1, 3, 2)]);
        assert!(!sel.is_dragging());
    }

    #[test]
    fn test_membership_queries() {
        let mut sel = Selection::new();
        sel.update((0, 0), SelectionMode::Cell, Modifiers::NONE, BOUNDS);
        sel.update((5, 3), SelectionMode::Cell, Modifiers::CTRL, BOUNDS);
        assert!(sel.is_cell_in_selection(5, 3));
        assert!(!sel.is_cell_in_selection(4, 3));
        assert!(sel.is_row_in_selection(5));
        assert!(sel.is_col_in_selection(3));
        assert!(!sel.is_col_in_selection(2));
        assert_eq!(sel.cell_count(), 2);
    }

    #[test]
    fn test_empty_grid_clears() {
        let mut sel = Selection::new();
        sel.update((0, 0), SelectionMode::Cell, Modifiers::NONE, BOUNDS);
        sel.update((0, 0), SelectionMode::Cell, Modifiers::NONE, GridBounds::new(0, 3));
        assert!(sel.is_empty());
        assert_eq!(sel.anchor(), None);
    }

    #[test]
    fn test_mode_serializes_lowercase() {
        let json = serde_json::to_string(&SelectionMode::Col).unwrap();
        assert_eq!(json, "\"col\"");
    }
}
