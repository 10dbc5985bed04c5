//! k-nearest-neighbour imputation
//!
//! Features are min-max scaled per column before distances are taken. The
//! distance between two rows uses only the coordinates both rows observe and
//! is rescaled by the fraction of coordinates used:
//!
//! ```text
//! d(a, b) = sqrt(p / |common| * sum_{j in common} (a_j - b_j)^2)
//! ```
//!
//! For each absent cell the donors are the rows observing that column. Numeric
//! cells take the (optionally distance-weighted) mean of the k nearest donors,
//! categorical cells their weighted majority code. A cell with no donor at a
//! finite distance falls back to the column mean, or mode when categorical.

use std::collections::BTreeMap;

use nalgebra::DMatrix;
use rayon::prelude::*;

use crate::error::{ImputeBenchError, Result};
use crate::imputation::constant::{mean, mode};
use crate::imputation::encoding::EncodedMatrix;
use crate::imputation::options::{AlgorithmParameter, ImputerOptions, ParameterType};
use crate::imputation::{AlgorithmFamily, AlgorithmId, Imputer};

const DEFAULT_K: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Weighting {
    Uniform,
    Distance,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct KnnImputer;

impl KnnImputer {
    pub fn new() -> Self {
        Self
    }
}

/// Min-max scaled copy, NaN preserved; constant columns map to 0
fn scale(values: &DMatrix<f64>) -> DMatrix<f64> {
    let mut scaled = values.clone();
    for mut column in scaled.column_iter_mut() {
        let (lo, hi) = column
            .iter()
            .filter(|x| !x.is_nan())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &x| (lo.min(x), hi.max(x)));
        let range = hi - lo;
        for x in column.iter_mut() {
            if !x.is_nan() {
                *x = if range > 0.0 { (*x - lo) / range } else { 0.0 };
            }
        }
    }
    scaled
}

fn nan_euclidean(scaled: &DMatrix<f64>, a: usize, b: usize) -> f64 {
    let width = scaled.ncols();
    let mut sum = 0.0;
    let mut common = 0usize;
    for col in 0..width {
        let (x, y) = (scaled[(a, col)], scaled[(b, col)]);
        if !x.is_nan() && !y.is_nan() {
            sum += (x - y).powi(2);
            common += 1;
        }
    }
    if common == 0 {
        f64::INFINITY
    } else {
        (sum * width as f64 / common as f64).sqrt()
    }
}

/// Vote weights for the chosen donors; exact matches dominate
fn weights(distances: &[f64], weighting: Weighting) -> Vec<f64> {
    match weighting {
        Weighting::Uniform => vec![1.0; distances.len()],
        Weighting::Distance => {
            if distances.iter().any(|&d| d == 0.0) {
                distances.iter().map(|&d| if d == 0.0 { 1.0 } else { 0.0 }).collect()
            } else {
                distances.iter().map(|&d| 1.0 / d).collect()
            }
        }
    }
}

fn weighted_majority(codes: &[f64], weights: &[f64]) -> f64 {
    let mut votes: BTreeMap<i64, f64> = BTreeMap::new();
    for (&code, &w) in codes.iter().zip(weights) {
        *votes.entry(code.round() as i64).or_insert(0.0) += w;
    }
    let mut best = f64::NAN;
    let mut best_weight = f64::NEG_INFINITY;
    for (code, weight) in votes {
        if weight > best_weight {
            best_weight = weight;
            best = code as f64;
        }
    }
    best
}

impl Imputer for KnnImputer {
    fn id(&self) -> AlgorithmId {
        AlgorithmId::new("KNN")
    }

    fn family(&self) -> AlgorithmFamily {
        AlgorithmFamily::NeighborBased
    }

    fn parameters(&self) -> Vec<AlgorithmParameter> {
        vec![
            AlgorithmParameter::new("k", DEFAULT_K, ParameterType::Integer, "Number of donor rows")
                .with_range(Some(1.0), None),
            AlgorithmParameter::new(
                "weights",
                "uniform",
                ParameterType::Enum(vec!["uniform".into(), "distance".into()]),
                "Donor weighting: uniform or inverse distance",
            ),
        ]
    }

    fn fit_transform(&self, data: &EncodedMatrix, options: &ImputerOptions) -> Result<DMatrix<f64>> {
        let k = options.usize_or("k", DEFAULT_K)?;
        if k == 0 {
            return Err(ImputeBenchError::InvalidParameter {
                name: "k".into(),
                reason: "at least one neighbour is required".into(),
            });
        }
        let weighting = match options.str_or("weights", "uniform")? {
            "distance" => Weighting::Distance,
            _ => Weighting::Uniform,
        };

        let values = data.values();
        let scaled = scale(values);
        let (rows, cols) = values.shape();
        let fallback: Vec<f64> = (0..cols)
            .map(|col| {
                let observed = data.observed(col);
                if data.is_categorical(col) {
                    mode(&observed)
                } else {
                    mean(&observed)
                }
            })
            .collect();

        let incomplete_rows: Vec<usize> = (0..rows)
            .filter(|&r| (0..cols).any(|c| data.is_absent(r, c)))
            .collect();

        let fills: Vec<(usize, Vec<(usize, f64)>)> = incomplete_rows
            .par_iter()
            .map(|&row| {
                let distances: Vec<f64> = (0..rows)
                    .map(|other| {
                        if other == row {
                            f64::INFINITY
                        } else {
                            nan_euclidean(&scaled, row, other)
                        }
                    })
                    .collect();

                let mut cells = Vec::new();
                for col in (0..cols).filter(|&c| data.is_absent(row, c)) {
                    let mut donors: Vec<(f64, usize)> = (0..rows)
                        .filter(|&other| !data.is_absent(other, col) && distances[other].is_finite())
                        .map(|other| (distances[other], other))
                        .collect();
                    if donors.is_empty() {
                        cells.push((col, fallback[col]));
                        continue;
                    }
                    donors.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
                    donors.truncate(k);

                    let donor_values: Vec<f64> = donors.iter().map(|&(_, r)| values[(r, col)]).collect();
                    let donor_distances: Vec<f64> = donors.iter().map(|&(d, _)| d).collect();
                    let w = weights(&donor_distances, weighting);
                    let value = if data.is_categorical(col) {
                        weighted_majority(&donor_values, &w)
                    } else {
                        let total: f64 = w.iter().sum();
                        donor_values.iter().zip(&w).map(|(v, w)| v * w).sum::<f64>() / total
                    };
                    cells.push((col, value));
                }
                (row, cells)
            })
            .collect();

        let mut output = values.clone();
        for (row, cells) in fills {
            for (col, value) in cells {
                output[(row, col)] = value;
            }
        }
        Ok(output)
    }
}
