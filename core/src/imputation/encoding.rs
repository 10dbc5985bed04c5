//! Numeric encoding of incomplete datasets
//!
//! Imputers see a single `DMatrix<f64>` where absent cells are NaN.
//! Categorical columns are integer-coded by a codec built from the labels
//! observed in that column; decoding rounds and clamps a code back onto a
//! known label, so every imputed categorical cell lands in the category set.

use std::collections::HashMap;

use nalgebra::DMatrix;

use crate::data::dataset::{
    Column, ColumnKind, Dataset, IncompleteDataset, IncompleteValues,
};
use crate::error::{ImputeBenchError, Result};

/// Bijection between observed labels and integer codes, first-seen order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryCodec {
    labels: Vec<String>,
    codes: HashMap<String, usize>,
}

impl CategoryCodec {
    pub fn from_observed<'a>(values: impl IntoIterator<Item = &'a str>) -> Self {
        let mut codec = Self::default();
        for label in values {
            if !codec.codes.contains_key(label) {
                codec.codes.insert(label.to_string(), codec.labels.len());
                codec.labels.push(label.to_string());
            }
        }
        codec
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn encode(&self, label: &str) -> Option<f64> {
        self.codes.get(label).map(|&c| c as f64)
    }

    pub fn decode(&self, code: f64) -> Option<&str> {
        if self.labels.is_empty() || !code.is_finite() {
            return None;
        }
        let index = code.round().clamp(0.0, (self.labels.len() - 1) as f64) as usize;
        self.labels.get(index).map(String::as_str)
    }
}

/// Incomplete dataset as a NaN-holed numeric matrix
#[derive(Debug, Clone)]
pub struct EncodedMatrix {
    values: DMatrix<f64>,
    names: Vec<String>,
    kinds: Vec<ColumnKind>,
    /// One codec per categorical column
    codecs: Vec<Option<CategoryCodec>>,
}

impl EncodedMatrix {
    pub fn encode(dataset: &IncompleteDataset) -> Result<Self> {
        let rows = dataset.n_rows();
        let cols = dataset.n_cols();
        let mut values = DMatrix::from_element(rows, cols, f64::NAN);
        let mut codecs = Vec::with_capacity(cols);

        for (col, column) in dataset.columns().iter().enumerate() {
            match &column.values {
                IncompleteValues::Numeric(v) => {
                    for (row, cell) in v.iter().enumerate() {
                        if let Some(x) = cell {
                            values[(row, col)] = *x;
                        }
                    }
                    codecs.push(None);
                }
                IncompleteValues::Categorical(v) => {
                    let codec = CategoryCodec::from_observed(v.iter().flatten().map(String::as_str));
                    for (row, cell) in v.iter().enumerate() {
                        if let Some(code) = cell.as_deref().and_then(|l| codec.encode(l)) {
                            values[(row, col)] = code;
                        }
                    }
                    codecs.push(Some(codec));
                }
            }
        }

        Ok(Self {
            values,
            names: dataset.names(),
            kinds: dataset.kinds(),
            codecs,
        })
    }

    pub fn values(&self) -> &DMatrix<f64> {
        &self.values
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn kinds(&self) -> &[ColumnKind] {
        &self.kinds
    }

    pub fn is_categorical(&self, col: usize) -> bool {
        self.kinds[col] == ColumnKind::Categorical
    }

    pub fn codec(&self, col: usize) -> Option<&CategoryCodec> {
        self.codecs[col].as_ref()
    }

    pub fn n_rows(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_cols(&self) -> usize {
        self.values.ncols()
    }

    #[inline]
    pub fn is_absent(&self, row: usize, col: usize) -> bool {
        self.values[(row, col)].is_nan()
    }

    pub fn absent_count(&self) -> usize {
        self.values.iter().filter(|x| x.is_nan()).count()
    }

    /// Observed values of one column
    pub fn observed(&self, col: usize) -> Vec<f64> {
        self.values
            .column(col)
            .iter()
            .copied()
            .filter(|x| !x.is_nan())
            .collect()
    }

    /// Decodes an imputer's output back to a complete dataset
    ///
    /// Observed cells are taken from the input, not from `output`; only the
    /// absent cells are read from the imputer.
    pub fn decode(&self, output: &DMatrix<f64>, collaborator: &str) -> Result<Dataset> {
        if output.shape() != self.values.shape() {
            return Err(ImputeBenchError::external(
                collaborator,
                format!(
                    "returned a {}x{} matrix for a {}x{} input",
                    output.nrows(),
                    output.ncols(),
                    self.n_rows(),
                    self.n_cols()
                ),
            ));
        }

        let mut columns = Vec::with_capacity(self.n_cols());
        for col in 0..self.n_cols() {
            let mut numeric = Vec::with_capacity(self.n_rows());
            for row in 0..self.n_rows() {
                let value = if self.is_absent(row, col) {
                    output[(row, col)]
                } else {
                    self.values[(row, col)]
                };
                if !value.is_finite() {
                    return Err(ImputeBenchError::external(
                        collaborator,
                        format!("left cell ({}, {}) of {} unresolved", row, col, self.names[col]),
                    ));
                }
                numeric.push(value);
            }

            let name = self.names[col].clone();
            columns.push(match &self.codecs[col] {
                None => Column::numeric(name, numeric),
                Some(codec) => {
                    let labels = numeric
                        .iter()
                        .map(|&code| {
                            codec.decode(code).map(str::to_string).ok_or_else(|| {
                                ImputeBenchError::external(
                                    collaborator,
                                    format!("column {} has no observed category to impute from", name),
                                )
                            })
                        })
                        .collect::<Result<Vec<String>>>()?;
                    Column::categorical(name, labels)
                }
            });
        }
        Dataset::new(columns)
    }
}
