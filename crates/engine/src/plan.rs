//! Composed view of the row op log.
//!
//! Rather than replaying every insert and delete against every window, the
//! row log is folded into an ordered list of segments: runs of pristine rows
//! and single inserted rows. Pristine runs are disjoint and increase
//! monotonically, so a save can stream the source file once.

/// One run of the edited document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    /// Pristine rows `[start, start + len)`. `len: None` runs to end of file
    /// and is always the last segment.
    Source { start: usize, len: Option<usize> },
    /// The row created by `row_ops[op]`.
    Inserted { op: usize },
}

impl Segment {
    fn len(&self, total: usize) -> usize {
        match *self {
            Self::Source { len: Some(len), .. } => len,
            Self::Source { start, len: None } => total.saturating_sub(start),
            Self::Inserted { .. } => 1,
        }
    }
}

/// A resolved, bounded piece of a logical row range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Piece {
    Source { start: usize, len: usize },
    Inserted { op: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowPlan {
    segments: Vec<Segment>,
}

impl Default for RowPlan {
    fn default() -> Self {
        Self {
            segments: vec![Segment::Source { start: 0, len: None }],
        }
    }
}

impl RowPlan {
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// True when no row op has been folded in.
    pub fn is_identity(&self) -> bool {
        self.segments == [Segment::Source { start: 0, len: None }]
    }

    pub fn logical_len(&self, total: usize) -> usize {
        self.segments.iter().map(|s| s.len(total)).sum()
    }

    /// Place inserted row `op` at logical `index`. `index` may equal the
    /// logical length (append).
    pub fn insert(&mut self, index: usize, op: usize, total: usize) {
        let mut offset = 0;
        for i in 0..self.segments.len() {
            let segment = self.segments[i];
            let len = segment.len(total);
            if index == offset {
                self.segments.insert(i, Segment::Inserted { op });
                self.normalize();
                return;
            }
            let is_tail = matches!(segment, Segment::Source { len: None, .. });
            if index < offset + len || (is_tail && index == offset + len) {
                if let Segment::Source { start, len: run } = segment {
                    let k = index - offset;
                    let head = Segment::Source { start, len: Some(k) };
                    let rest = Segment::Source {
                        start: start + k,
                        len: run.map(|l| l - k),
                    };
                    self.segments.splice(i..=i, [head, Segment::Inserted { op }, rest]);
                    self.normalize();
                }
                return;
            }
            offset += len;
        }
    }

    /// Remove logical row `index`. Out-of-range indices are ignored.
    pub fn delete(&mut self, index: usize, total: usize) {
        let mut offset = 0;
        for i in 0..self.segments.len() {
            let segment = self.segments[i];
            let len = segment.len(total);
            if index >= offset + len {
                offset += len;
                continue;
            }
            let k = index - offset;
            match segment {
                Segment::Inserted { .. } => {
                    self.segments.remove(i);
                }
                Segment::Source { start, len: run } => {
                    let head = Segment::Source { start, len: Some(k) };
                    let rest = Segment::Source {
                        start: start + k + 1,
                        len: run.map(|l| l - k - 1),
                    };
                    self.segments.splice(i..=i, [head, rest]);
                }
            }
            self.normalize();
            return;
        }
    }

    /// Resolve logical rows `[start, start + limit)` into bounded pieces.
    pub fn resolve(&self, start: usize, limit: usize, total: usize) -> Vec<Piece> {
        let end = start.saturating_add(limit);
        let mut pieces = Vec::new();
        let mut offset = 0;
        for segment in &self.segments {
            if offset >= end {
                break;
            }
            let len = segment.len(total);
            let lo = start.max(offset);
            let hi = end.min(offset + len);
            if lo < hi {
                match *segment {
                    Segment::Source { start: src, .. } => pieces.push(Piece::Source {
                        start: src + (lo - offset),
                        len: hi - lo,
                    }),
                    Segment::Inserted { op } => pieces.push(Piece::Inserted { op }),
                }
            }
            offset += len;
        }
        pieces
    }

    /// Drop empty bounded runs and merge contiguous pristine runs.
    fn normalize(&mut self) {
        let mut merged: Vec<Segment> = Vec::with_capacity(self.segments.len());
        for segment in self.segments.drain(..) {
            if let Segment::Source { len: Some(0), .. } = segment {
                continue;
            }
            if let (
                Some(Segment::Source { start: a, len: Some(la) }),
                Segment::Source { start: b, len: lb },
            ) = (merged.last().copied(), segment)
            {
                if a + la == b {
                    if let Some(last) = merged.last_mut() {
                        *last = Segment::Source { start: a, len: lb.map(|l| la + l) };
                    }
                    continue;
                }
            }
            merged.push(segment);
        }
        self.segments = merged;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Materialize the plan as labels: `s{n}` for pristine rows, `i{op}` for inserts.
    fn labels(plan: &RowPlan, total: usize) -> Vec<String> {
        plan.resolve(0, usize::MAX, total)
            .into_iter()
            .flat_map(|p| match p {
                Piece::Source { start, len } => (start..start + len).map(|r| format!("s{r}")).collect(),
                Piece::Inserted { op } => vec![format!("i{op}")],
            })
            .collect()
    }

    #[test]
    fn test_identity() {
        let plan = RowPlan::default();
        assert!(plan.is_identity());
        assert_eq!(plan.logical_len(5), 5);
        assert_eq!(plan.resolve(2, 10, 5), vec![Piece::Source { start: 2, len: 3 }]);
    }

    #[test]
    fn test_insert_splits_run() {
        let mut plan = RowPlan::default();
        plan.insert(1, 0, 3);
        assert_eq!(labels(&plan, 3), ["s0", "i0", "s1", "s2"]);
        assert_eq!(plan.logical_len(3), 4);
    }

    #[test]
    fn test_insert_at_front_and_end() {
        let mut plan = RowPlan::default();
        plan.insert(0, 0, 2);
        plan.insert(3, 1, 2);
        assert_eq!(labels(&plan, 2), ["i0", "s0", "s1", "i1"]);
        assert!(matches!(plan.segments().last(), Some(Segment::Source { len: None, .. })));
    }

    #[test]
    fn test_delete_inserted_and_source() {
        let mut plan = RowPlan::default();
        plan.insert(1, 0, 4);
        plan.delete(1, 4);
        assert!(plan.is_identity());
        plan.delete(2, 4);
        assert_eq!(labels(&plan, 4), ["s0", "s1", "s3"]);
        plan.delete(0, 4);
        assert_eq!(labels(&plan, 4), ["s1", "s3"]);
    }

    #[test]
    fn test_resolve_window_spans_pieces() {
        let mut plan = RowPlan::default();
        plan.insert(2, 0, 10);
        plan.delete(5, 10);
        assert_eq!(
            plan.resolve(1, 5, 10),
            vec![
                Piece::Source { start: 1, len: 1 },
                Piece::Inserted { op: 0 },
                Piece::Source { start: 2, len: 2 },
                Piece::Source { start: 5, len: 1 },
            ]
        );
    }

    #[test]
    fn test_delete_out_of_range_ignored() {
        let mut plan = RowPlan::default();
        plan.delete(3, 3);
        assert!(plan.is_identity());
    }
}
