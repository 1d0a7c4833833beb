//! Scroll windowing: maps scroll offset and viewport size to the row
//! range worth materializing.
//!
//! Fixed-height grids resolve in O(1) arithmetic. Variable heights keep
//! per-row estimates in a Fenwick tree, so offset lookups and prefix sums
//! stay O(log n). Measured heights patch the tree; when measurements
//! drift far from the running estimate, unmeasured rows are re-seeded
//! from the measured mean.
//!
//! The materialized set is bounded by viewport capacity plus twice the
//! overscan, independent of the total row count.

use std::ops::Range;

/// Tolerance (px) between the measured-height mean and the estimate
/// before unmeasured rows are re-seeded.
pub const DEFAULT_REESTIMATE_TOLERANCE: f32 = 2.0;

/// Where a target row lands in the viewport after `scroll_to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Start,
    Center,
    End,
}

/// Row height model.
#[derive(Debug, Clone)]
enum RowHeights {
    Fixed(f32),
    Variable(HeightIndex),
}

/// Maps scroll state to the visible row range.
#[derive(Debug, Clone)]
pub struct WindowIndex {
    heights: RowHeights,
    row_count: usize,
    overscan: usize,
    reestimate_tolerance: f32,
}

impl WindowIndex {
    /// Grid where every row has the same height.
    pub fn fixed(row_count: usize, row_height: f32, overscan: usize) -> Self {
        Self {
            heights: RowHeights::Fixed(row_height),
            row_count,
            overscan,
            reestimate_tolerance: DEFAULT_REESTIMATE_TOLERANCE,
        }
    }

    /// Grid with per-row heights, seeded from a uniform estimate until
    /// rows are measured.
    pub fn variable(row_count: usize, estimated_height: f32, overscan: usize) -> Self {
        Self {
            heights: RowHeights::Variable(HeightIndex::new(row_count, estimated_height)),
            row_count,
            overscan,
            reestimate_tolerance: DEFAULT_REESTIMATE_TOLERANCE,
        }
    }

    pub fn with_reestimate_tolerance(mut self, tolerance: f32) -> Self {
        self.reestimate_tolerance = tolerance;
        self
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn overscan(&self) -> usize {
        self.overscan
    }

    pub fn is_fixed(&self) -> bool {
        matches!(self.heights, RowHeights::Fixed(_))
    }

    /// Resize after rows are added or removed. New rows take the current
    /// height estimate.
    pub fn set_row_count(&mut self, rows: usize) {
        if let RowHeights::Variable(index) = &mut self.heights {
            index.resize(rows);
        }
        self.row_count = rows;
    }

    pub fn total_height(&self) -> f32 {
        match &self.heights {
            RowHeights::Fixed(h) => self.row_count as f32 * h,
            RowHeights::Variable(index) => index.total(),
        }
    }

    /// Y offset where `row` starts. Rows at or past the end return the
    /// total height.
    pub fn row_offset(&self, row: usize) -> f32 {
        let row = row.min(self.row_count);
        match &self.heights {
            RowHeights::Fixed(h) => row as f32 * h,
            RowHeights::Variable(index) => index.offset_of(row),
        }
    }

    pub fn row_height(&self, row: usize) -> f32 {
        match &self.heights {
            RowHeights::Fixed(h) => *h,
            RowHeights::Variable(index) => {
                if row < self.row_count {
                    index.height_of(row)
                } else {
                    index.estimate
                }
            }
        }
    }

    /// Half-open row range to materialize for the given viewport.
    ///
    /// Bounded by viewport capacity plus `2 * overscan`, regardless of
    /// the total row count.
    pub fn visible_range(&self, viewport_height: f32, scroll_offset: f32) -> Range<usize> {
        if self.row_count == 0 || viewport_height <= 0.0 {
            return 0..0;
        }
        let scroll = scroll_offset.max(0.0);

        match &self.heights {
            RowHeights::Fixed(h) => {
                if *h <= 0.0 {
                    return 0..0;
                }
                let first = (scroll / h) as usize;
                let start = first.saturating_sub(self.overscan).min(self.row_count);
                let span = (viewport_height / h).ceil() as usize + 2 * self.overscan;
                let end = (start + span).min(self.row_count);
                start..end
            }
            RowHeights::Variable(index) => {
                let first = index.row_at_offset(scroll);
                let last = index.row_at_offset(scroll + viewport_height);
                let start = first.saturating_sub(self.overscan);
                let end = (last + 1 + self.overscan).min(self.row_count).max(start);
                start..end
            }
        }
    }

    /// Record a measured row height. Returns true when the layout
    /// changed. No-op for fixed-height grids.
    pub fn measure(&mut self, row: usize, height: f32) -> bool {
        if row >= self.row_count {
            return false;
        }
        let RowHeights::Variable(index) = &mut self.heights else {
            return false;
        };
        let changed = index.record(row, height);
        if changed && index.estimate_divergence() > self.reestimate_tolerance {
            index.reestimate();
        }
        changed
    }

    /// Scroll offset that places `row` per `align`, clamped to the
    /// scrollable range. Returns None for rows outside `[0, row_count)`.
    pub fn scroll_to(&self, row: usize, align: Align, viewport_height: f32) -> Option<f32> {
        if row >= self.row_count {
            return None;
        }
        let top = self.row_offset(row);
        let height = self.row_height(row);
        let raw = match align {
            Align::Start => top,
            Align::Center => top + height / 2.0 - viewport_height / 2.0,
            Align::End => top + height - viewport_height,
        };
        let max_scroll = (self.total_height() - viewport_height).max(0.0);
        Some(raw.clamp(0.0, max_scroll))
    }
}

// =============================================================================
// HeightIndex: per-row heights with estimate tracking
// =============================================================================

#[derive(Debug, Clone)]
struct HeightIndex {
    tree: Fenwick,
    /// Height applied to rows that have not been measured yet.
    estimate: f32,
    measured: Vec<bool>,
    measured_count: usize,
    measured_total: f32,
}

impl HeightIndex {
    fn new(rows: usize, estimate: f32) -> Self {
        Self {
            tree: Fenwick::from_uniform(rows, estimate),
            estimate,
            measured: vec![false; rows],
            measured_count: 0,
            measured_total: 0.0,
        }
    }

    /// Store a measurement. Returns true when the stored height changed.
    fn record(&mut self, row: usize, height: f32) -> bool {
        let old = self.tree.get(row);
        if self.measured[row] {
            self.measured_total += height - old;
        } else {
            self.measured[row] = true;
            self.measured_count += 1;
            self.measured_total += height;
        }
        if (height - old).abs() < f32::EPSILON {
            return false;
        }
        self.tree.set(row, height);
        true
    }

    /// Distance between the measured-height mean and the current
    /// estimate for unmeasured rows.
    fn estimate_divergence(&self) -> f32 {
        if self.measured_count == 0 {
            return 0.0;
        }
        (self.measured_total / self.measured_count as f32 - self.estimate).abs()
    }

    /// Re-seed unmeasured rows from the measured mean.
    fn reestimate(&mut self) {
        if self.measured_count == 0 {
            return;
        }
        self.estimate = self.measured_total / self.measured_count as f32;
        for row in 0..self.measured.len() {
            if !self.measured[row] {
                self.tree.set(row, self.estimate);
            }
        }
    }

    fn resize(&mut self, rows: usize) {
        let old = self.measured.len();
        if rows < old {
            for row in rows..old {
                if self.measured[row] {
                    self.measured_count -= 1;
                    self.measured_total -= self.tree.get(row);
                }
            }
        }
        self.measured.resize(rows, false);
        self.tree.resize_with(rows, self.estimate);
    }

    fn total(&self) -> f32 {
        self.tree.total()
    }

    fn offset_of(&self, row: usize) -> f32 {
        self.tree.prefix_before(row)
    }

    fn height_of(&self, row: usize) -> f32 {
        self.tree.get(row)
    }

    /// Row whose vertical span contains `offset`, clamped to the last row.
    fn row_at_offset(&self, offset: f32) -> usize {
        if self.measured.is_empty() {
            return 0;
        }
        self.tree.row_containing(offset).min(self.measured.len() - 1)
    }
}

// =============================================================================
// Fenwick: prefix sums over row heights
// =============================================================================

/// Fenwick tree over per-row heights. Raw heights are kept alongside the
/// tree for O(1) point reads; `tree[0]` is unused (1-based layout).
#[derive(Debug, Clone)]
struct Fenwick {
    tree: Vec<f32>,
    values: Vec<f32>,
}

impl Fenwick {
    fn from_uniform(n: usize, value: f32) -> Self {
        let mut fenwick = Self {
            tree: Vec::new(),
            values: vec![value; n],
        };
        fenwick.rebuild();
        fenwick
    }

    /// O(n) construction from `values`.
    fn rebuild(&mut self) {
        let n = self.values.len();
        self.tree = vec![0.0; n + 1];
        for i in 1..=n {
            self.tree[i] += self.values[i - 1];
            let parent = i + (i & i.wrapping_neg());
            if parent <= n {
                let v = self.tree[i];
                self.tree[parent] += v;
            }
        }
    }

    fn get(&self, i: usize) -> f32 {
        self.values[i]
    }

    fn set(&mut self, i: usize, value: f32) {
        let delta = value - self.values[i];
        self.values[i] = value;
        let mut idx = i + 1;
        while idx < self.tree.len() {
            self.tree[idx] += delta;
            idx += idx & idx.wrapping_neg();
        }
    }

    /// Sum of heights of rows `[0, row)`, which is the y offset where
    /// `row` starts.
    fn prefix_before(&self, row: usize) -> f32 {
        let mut idx = row.min(self.values.len());
        let mut sum = 0.0;
        while idx > 0 {
            sum += self.tree[idx];
            idx -= idx & idx.wrapping_neg();
        }
        sum
    }

    fn total(&self) -> f32 {
        self.prefix_before(self.values.len())
    }

    /// Index of the row whose span contains `offset`. Offsets at or past
    /// the total height return `len` (one past the last row).
    fn row_containing(&self, offset: f32) -> usize {
        let n = self.values.len();
        if n == 0 || offset < 0.0 {
            return 0;
        }
        let mut pos = 0usize;
        let mut remaining = offset;
        let mut bit = n.next_power_of_two();
        while bit != 0 {
            let next = pos + bit;
            if next < self.tree.len() && self.tree[next] <= remaining {
                remaining -= self.tree[next];
                pos = next;
            }
            bit >>= 1;
        }
        pos
    }

    fn resize_with(&mut self, n: usize, fill: f32) {
        self.values.resize(n, fill);
        self.rebuild();
    }
}
