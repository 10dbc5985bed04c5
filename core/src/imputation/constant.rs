//! Constant-fill imputers
//!
//! Every absent cell of a column receives one statistic of that column's
//! observed values. Categorical columns always fall back to the mode since a
//! mean code is not a category.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::imputation::encoding::EncodedMatrix;
use crate::imputation::options::{AlgorithmParameter, ImputerOptions};
use crate::imputation::{AlgorithmFamily, AlgorithmId, Imputer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FillStrategy {
    Mean,
    Median,
    Mode,
}

#[derive(Debug, Clone, Copy)]
pub struct ConstantImputer {
    strategy: FillStrategy,
}

impl ConstantImputer {
    pub fn new(strategy: FillStrategy) -> Self {
        Self { strategy }
    }
}

/// Arithmetic mean, NaN for an empty slice
pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Most frequent value; ties go to the smallest
pub(crate) fn mode(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mut best = f64::NAN;
    let mut best_count = 0;
    let mut i = 0;
    while i < sorted.len() {
        let mut j = i;
        while j < sorted.len() && sorted[j] == sorted[i] {
            j += 1;
        }
        if j - i > best_count {
            best_count = j - i;
            best = sorted[i];
        }
        i = j;
    }
    best
}

impl Imputer for ConstantImputer {
    fn id(&self) -> AlgorithmId {
        match self.strategy {
            FillStrategy::Mean => AlgorithmId::new("Mean"),
            FillStrategy::Median => AlgorithmId::new("Median"),
            FillStrategy::Mode => AlgorithmId::new("Mode"),
        }
    }

    fn family(&self) -> AlgorithmFamily {
        AlgorithmFamily::ConstantFill
    }

    fn parameters(&self) -> Vec<AlgorithmParameter> {
        Vec::new()
    }

    fn fit_transform(&self, data: &EncodedMatrix, _options: &ImputerOptions) -> Result<DMatrix<f64>> {
        let mut output = data.values().clone();
        for col in 0..data.n_cols() {
            let observed = data.observed(col);
            let fill = match (self.strategy, data.is_categorical(col)) {
                (_, true) | (FillStrategy::Mode, false) => mode(&observed),
                (FillStrategy::Mean, false) => mean(&observed),
                (FillStrategy::Median, false) => median(&observed),
            };
            for cell in output.column_mut(col).iter_mut() {
                if cell.is_nan() {
                    *cell = fill;
                }
            }
        }
        Ok(output)
    }
}
