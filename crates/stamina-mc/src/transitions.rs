//! Out-of-order transition accumulation.

use stamina_model::{SparseMatrixBuilder, StateIndex};

/// One recorded transition target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransitionInfo {
    pub to: StateIndex,
    pub rate: f64,
}

/// Collects `(from, to, rate)` triples in whatever order the generator
/// reveals successors, deferring the per-row sort to flush time. Duplicate
/// targets within a row are merged by summing when flushing.
#[derive(Debug, Clone, Default)]
pub struct TransitionAccumulator {
    rows: Vec<Vec<TransitionInfo>>,
}

impl TransitionAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one transition. Rows grow on demand for both endpoints so every
    /// touched state has a row.
    pub fn append(&mut self, from: StateIndex, to: StateIndex, rate: f64) {
        let needed = from.max(to) as usize + 1;
        if self.rows.len() < needed {
            self.rows.resize_with(needed, Vec::new);
        }
        self.rows[from as usize].push(TransitionInfo { to, rate });
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn row(&self, from: StateIndex) -> &[TransitionInfo] {
        self.rows
            .get(from as usize)
            .map(|r| r.as_slice())
            .unwrap_or(&[])
    }

    /// Sum of recorded rates out of one state.
    pub fn row_rate_sum(&self, from: StateIndex) -> f64 {
        self.row(from).iter().map(|t| t.rate).sum()
    }

    /// Apply an index permutation to rows and target columns.
    pub fn remap(&mut self, remapping: &[StateIndex]) {
        let mut reordered: Vec<Vec<TransitionInfo>> = vec![Vec::new(); self.rows.len()];
        for (old, mut row) in self.rows.drain(..).enumerate() {
            for entry in &mut row {
                entry.to = remapping[entry.to as usize];
            }
            reordered[remapping[old] as usize] = row;
        }
        self.rows = reordered;
    }

    /// Emit all rows in index order into a sparse matrix builder: each row
    /// sorted by target with duplicates merged. A row with no entries becomes
    /// a unit self-loop, so every indexed state has defined dynamics.
    pub fn flush_into(&self, builder: &mut SparseMatrixBuilder, num_rows: usize) {
        let mut scratch: Vec<TransitionInfo> = Vec::new();
        for row in 0..num_rows {
            let entries = self.row(row as StateIndex);
            if entries.is_empty() {
                builder.add_next_value(row as StateIndex, row as StateIndex, 1.0);
                continue;
            }
            scratch.clear();
            scratch.extend_from_slice(entries);
            scratch.sort_by_key(|t| t.to);
            let mut merged = scratch.iter().copied();
            let mut current = merged.next().expect("row checked non-empty");
            for next in merged {
                if next.to == current.to {
                    current.rate += next.rate;
                } else {
                    builder.add_next_value(row as StateIndex, current.to, current.rate);
                    current = next;
                }
            }
            builder.add_next_value(row as StateIndex, current.to, current.rate);
        }
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }
}
