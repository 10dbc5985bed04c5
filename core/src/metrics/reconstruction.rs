//! Reconstruction error of imputed datasets
//!
//! Only cells the mask marks are scored. Numeric cells contribute to a pooled
//! root-mean-square error, categorical cells to the proportion of falsely
//! classified entries (PFC).

use serde::{Deserialize, Serialize};

use crate::data::dataset::{ColumnValues, Dataset};
use crate::data::mask::MissingnessMask;
use crate::error::{ImputeBenchError, Result};

/// Scale at which numeric errors are measured
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RmseScale {
    /// Original units
    #[default]
    Raw,
    /// Each column rescaled to [0, 1] by its ground-truth range
    MinMax,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricConfig {
    #[serde(default)]
    pub rmse_scale: RmseScale,
}

/// Reconstruction quality over the masked cells
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReconstructionReport {
    pub numeric_rmse: Option<f64>,
    /// Proportion of falsely classified categorical cells
    pub categorical_pfc: Option<f64>,
    pub numeric_cells: usize,
    pub categorical_cells: usize,
}

impl ReconstructionReport {
    /// Headline error: RMSE when numeric cells were scored, PFC otherwise
    pub fn summary(&self) -> f64 {
        self.numeric_rmse.or(self.categorical_pfc).unwrap_or(f64::NAN)
    }

    pub fn scored_cells(&self) -> usize {
        self.numeric_cells + self.categorical_cells
    }
}

fn check_shapes(truth: &Dataset, imputed: &Dataset, mask: &MissingnessMask) -> Result<()> {
    let shape = |rows: usize, cols: usize| format!("{}x{}", rows, cols);
    let expected = shape(truth.n_rows(), truth.n_cols());
    for actual in [
        shape(imputed.n_rows(), imputed.n_cols()),
        shape(mask.n_rows(), mask.n_cols()),
    ] {
        if actual != expected {
            return Err(ImputeBenchError::ShapeMismatch {
                expected: expected.clone(),
                actual,
            });
        }
    }
    let names = truth.names();
    if imputed.names() != names || mask.names() != names.as_slice() {
        return Err(ImputeBenchError::ShapeMismatch {
            expected: names.join(","),
            actual: imputed.names().join(","),
        });
    }
    Ok(())
}

pub fn reconstruction_error(
    truth: &Dataset,
    imputed: &Dataset,
    mask: &MissingnessMask,
    config: &MetricConfig,
) -> Result<ReconstructionReport> {
    check_shapes(truth, imputed, mask)?;
    if !mask.any() {
        return Err(ImputeBenchError::EmptyMask);
    }

    let mut squared = 0.0;
    let mut numeric_cells = 0usize;
    let mut mismatches = 0usize;
    let mut categorical_cells = 0usize;

    for (col, (t, i)) in truth.columns().iter().zip(imputed.columns()).enumerate() {
        let flags = mask.column(col);
        match (&t.values, &i.values) {
            (ColumnValues::Numeric(t), ColumnValues::Numeric(i)) => {
                let scale = match config.rmse_scale {
                    RmseScale::Raw => 1.0,
                    RmseScale::MinMax => {
                        let (lo, hi) = t
                            .iter()
                            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &x| (lo.min(x), hi.max(x)));
                        if hi > lo {
                            hi - lo
                        } else {
                            1.0
                        }
                    }
                };
                for row in (0..t.len()).filter(|&r| flags[r]) {
                    squared += ((t[row] - i[row]) / scale).powi(2);
                    numeric_cells += 1;
                }
            }
            (ColumnValues::Categorical(t), ColumnValues::Categorical(i)) => {
                for row in (0..t.len()).filter(|&r| flags[r]) {
                    if t[row] != i[row] {
                        mismatches += 1;
                    }
                    categorical_cells += 1;
                }
            }
            _ => {
                return Err(ImputeBenchError::ShapeMismatch {
                    expected: format!("{:?} column {}", t.kind(), t.name),
                    actual: format!("{:?} column {}", i.kind(), i.name),
                });
            }
        }
    }

    Ok(ReconstructionReport {
        numeric_rmse: (numeric_cells > 0).then(|| (squared / numeric_cells as f64).sqrt()),
        categorical_pfc: (categorical_cells > 0)
            .then(|| mismatches as f64 / categorical_cells as f64),
        numeric_cells,
        categorical_cells,
    })
}
