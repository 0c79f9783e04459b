//! Selected-output table snapshot
//!
//! Reading cells one engine call at a time is what the adapter offers; this
//! copies the whole table once so it can be indexed and sliced freely.

use std::ops::{Bound, Range, RangeBounds};

use serde::{Serialize, Serializer};

use crate::error::Result;
use crate::phreeqc::IPhreeqc;
use crate::scoped::ScopedVar;
use crate::var::Var;

/// Row-major copy of the selected-output table, heading row included
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectedOutput {
    rows: usize,
    cols: usize,
    cells: Vec<Var>,
}

/// Clamp a range to `0..len`, the way Python slices behave
fn clamp(range: impl RangeBounds<usize>, len: usize) -> Range<usize> {
    let start = match range.start_bound() {
        Bound::Included(&s) => s,
        Bound::Excluded(&s) => s.saturating_add(1),
        Bound::Unbounded => 0,
    };
    let end = match range.end_bound() {
        Bound::Included(&e) => e.saturating_add(1),
        Bound::Excluded(&e) => e,
        Bound::Unbounded => len,
    };
    let end = end.min(len);
    start.min(end)..end
}

impl SelectedOutput {
    /// Copy every cell out of the engine
    pub fn read(engine: &IPhreeqc) -> Result<Self> {
        let rows = engine.selected_output_row_count()?;
        let cols = engine.selected_output_column_count()?;
        let mut cells = Vec::with_capacity(rows * cols);

        let mut scratch = ScopedVar::new(engine.api());
        for row in 0..rows {
            for col in 0..cols {
                engine.cell_value_into(row, col, &mut scratch)?;
                cells.push(scratch.to_var()?);
            }
        }

        Ok(Self { rows, cols, cells })
    }

    /// Build from rows of equal length; the first row is the headings
    pub fn from_rows(rows: Vec<Vec<Var>>) -> Option<Self> {
        let cols = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|r| r.len() != cols) {
            return None;
        }
        let n = rows.len();
        Some(Self {
            rows: n,
            cols,
            cells: rows.into_iter().flatten().collect(),
        })
    }

    /// (rows, columns), heading row included
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Column headings from row 0
    pub fn headings(&self) -> Vec<String> {
        self.row(0)
            .map(|r| r.iter().map(|v| v.to_string()).collect())
            .unwrap_or_default()
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&Var> {
        if row < self.rows && col < self.cols {
            self.cells.get(row * self.cols + col)
        } else {
            None
        }
    }

    pub fn row(&self, row: usize) -> Option<&[Var]> {
        if row < self.rows {
            let start = row * self.cols;
            Some(&self.cells[start..start + self.cols])
        } else {
            None
        }
    }

    pub fn column(&self, col: usize) -> Option<Vec<&Var>> {
        if col < self.cols {
            Some((0..self.rows).map(|r| &self.cells[r * self.cols + col]).collect())
        } else {
            None
        }
    }

    /// Rectangular slice; out-of-range bounds are clamped
    pub fn slice(
        &self,
        rows: impl RangeBounds<usize>,
        cols: impl RangeBounds<usize>,
    ) -> Vec<Vec<&Var>> {
        let cols = clamp(cols, self.cols);
        clamp(rows, self.rows)
            .map(|r| {
                let base = r * self.cols;
                self.cells[base + cols.start..base + cols.end].iter().collect()
            })
            .collect()
    }

    /// Numeric data rows (row 1 onwards); non-numeric cells read as NaN
    pub fn data(&self) -> Vec<Vec<f64>> {
        (1..self.rows)
            .filter_map(|r| self.row(r))
            .map(|r| r.iter().map(|v| v.as_f64().unwrap_or(f64::NAN)).collect())
            .collect()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl Serialize for SelectedOutput {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if self.cols == 0 {
            return serializer.collect_seq(std::iter::empty::<&[Var]>());
        }
        serializer.collect_seq(self.cells.chunks(self.cols))
    }
}
