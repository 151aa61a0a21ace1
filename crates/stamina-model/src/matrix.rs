//! Sparse transition matrices in compressed-row form.

use crate::StateIndex;

/// A finished sparse matrix: row offsets into parallel column/value arrays.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseMatrix {
    row_offsets: Vec<usize>,
    columns: Vec<StateIndex>,
    values: Vec<f64>,
}

impl SparseMatrix {
    pub fn num_rows(&self) -> usize {
        self.row_offsets.len() - 1
    }

    pub fn num_entries(&self) -> usize {
        self.columns.len()
    }

    /// The columns and values of one row, sorted by column.
    pub fn row(&self, row: StateIndex) -> (&[StateIndex], &[f64]) {
        let lo = self.row_offsets[row as usize];
        let hi = self.row_offsets[row as usize + 1];
        (&self.columns[lo..hi], &self.values[lo..hi])
    }

    /// Sum of all values in a row. For a CTMC this is the total exit rate.
    pub fn row_sum(&self, row: StateIndex) -> f64 {
        self.row(row).1.iter().sum()
    }

    /// The diagonal entry of a row, or 0 if absent.
    pub fn diagonal(&self, row: StateIndex) -> f64 {
        let (cols, vals) = self.row(row);
        match cols.binary_search(&row) {
            Ok(i) => vals[i],
            Err(_) => 0.0,
        }
    }
}

/// Incremental builder for [`SparseMatrix`].
///
/// Entries must arrive with non-decreasing rows and strictly increasing
/// columns within each row; the transition accumulator guarantees this when
/// flushing.
#[derive(Debug, Default)]
pub struct SparseMatrixBuilder {
    row_offsets: Vec<usize>,
    columns: Vec<StateIndex>,
    values: Vec<f64>,
    current_row: Option<StateIndex>,
}

impl SparseMatrixBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one entry. Rows may be skipped; skipped rows come out empty.
    pub fn add_next_value(&mut self, row: StateIndex, column: StateIndex, value: f64) {
        match self.current_row {
            None => {
                for _ in 0..=row {
                    self.row_offsets.push(self.columns.len());
                }
            }
            Some(last) => {
                assert!(row >= last, "rows must be emitted in order");
                if row == last {
                    if let Some(&prev) = self.columns.last() {
                        assert!(prev < column, "columns within a row must be strictly increasing");
                    }
                } else {
                    for _ in last..row {
                        self.row_offsets.push(self.columns.len());
                    }
                }
            }
        }
        self.current_row = Some(row);
        self.columns.push(column);
        self.values.push(value);
    }

    /// Finish the matrix with exactly `num_rows` rows, padding empty trailing
    /// rows as needed.
    pub fn build(mut self, num_rows: usize) -> SparseMatrix {
        while self.row_offsets.len() <= num_rows {
            self.row_offsets.push(self.columns.len());
        }
        SparseMatrix {
            row_offsets: self.row_offsets,
            columns: self.columns,
            values: self.values,
        }
    }
}
