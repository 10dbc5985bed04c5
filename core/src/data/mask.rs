//! Ground-truth missingness mask
//!
//! Stored column-major since every consumer (injector, metrics, rate checks)
//! walks one column at a time.

use serde::{Deserialize, Serialize};

/// Boolean matrix, `true` where a cell was suppressed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingnessMask {
    names: Vec<String>,
    rows: usize,
    cells: Vec<Vec<bool>>,
}

impl MissingnessMask {
    /// All-false mask over the given columns
    pub fn new(names: Vec<String>, rows: usize) -> Self {
        let cells = vec![vec![false; rows]; names.len()];
        Self { names, rows, cells }
    }

    pub fn n_rows(&self) -> usize {
        self.rows
    }

    pub fn n_cols(&self) -> usize {
        self.names.len()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    #[inline]
    pub fn mark(&mut self, row: usize, col: usize) {
        self.cells[col][row] = true;
    }

    #[inline]
    pub fn is_missing(&self, row: usize, col: usize) -> bool {
        self.cells[col][row]
    }

    pub fn column(&self, col: usize) -> &[bool] {
        &self.cells[col]
    }

    pub fn column_by_name(&self, name: &str) -> Option<&[bool]> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|col| self.cells[col].as_slice())
    }

    /// Number of suppressed cells in one column
    pub fn column_count(&self, col: usize) -> usize {
        self.cells[col].iter().filter(|&&m| m).count()
    }

    /// Realized missing fraction of one column
    pub fn column_rate(&self, col: usize) -> f64 {
        if self.rows == 0 {
            return 0.0;
        }
        self.column_count(col) as f64 / self.rows as f64
    }

    pub fn count(&self) -> usize {
        (0..self.n_cols()).map(|c| self.column_count(c)).sum()
    }

    pub fn any(&self) -> bool {
        self.cells.iter().any(|c| c.iter().any(|&m| m))
    }

    /// First `n` rows; callers validate `n` against the dataset first
    pub fn head(&self, n: usize) -> Self {
        let n = n.min(self.rows);
        Self {
            names: self.names.clone(),
            rows: n,
            cells: self.cells.iter().map(|c| c[..n].to_vec()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_mask_counts_and_rates() {
        let mut mask = MissingnessMask::new(vec!["a".into(), "b".into()], 4);
        assert!(!mask.any());

        mask.mark(0, 1);
        mask.mark(3, 1);
        assert!(mask.any());
        assert_eq!(mask.count(), 2);
        assert_eq!(mask.column_count(0), 0);
        assert_relative_eq!(mask.column_rate(1), 0.5);
        assert_eq!(mask.column_by_name("b").unwrap(), &[true, false, false, true]);
        assert!(mask.column_by_name("z").is_none());
    }

    #[test]
    fn test_head_keeps_leading_rows() {
        let mut mask = MissingnessMask::new(vec!["a".into()], 3);
        mask.mark(2, 0);
        let head = mask.head(2);
        assert_eq!(head.n_rows(), 2);
        assert!(!head.any());
    }
}
