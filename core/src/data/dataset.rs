//! Tabular datasets with typed columns
//!
//! A [`Dataset`] is the complete ground truth of a benchmark run. An
//! [`IncompleteDataset`] carries the same schema with optional cells; the
//! absent cells are exactly the ones a missingness mechanism suppressed.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::data::mask::MissingnessMask;
use crate::error::{ImputeBenchError, Result};

/// Column storage class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnKind {
    Numeric,
    Categorical,
}

/// Fully observed column values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnValues {
    Numeric(Vec<f64>),
    Categorical(Vec<String>),
}

impl ColumnValues {
    pub fn len(&self) -> usize {
        match self {
            Self::Numeric(v) => v.len(),
            Self::Categorical(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self) -> ColumnKind {
        match self {
            Self::Numeric(_) => ColumnKind::Numeric,
            Self::Categorical(_) => ColumnKind::Categorical,
        }
    }

    fn head(&self, n: usize) -> Self {
        match self {
            Self::Numeric(v) => Self::Numeric(v[..n].to_vec()),
            Self::Categorical(v) => Self::Categorical(v[..n].to_vec()),
        }
    }
}

/// Named, fully observed column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub values: ColumnValues,
}

impl Column {
    pub fn numeric(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            values: ColumnValues::Numeric(values),
        }
    }

    pub fn categorical<S: Into<String>>(name: impl Into<String>, values: Vec<S>) -> Self {
        Self {
            name: name.into(),
            values: ColumnValues::Categorical(values.into_iter().map(Into::into).collect()),
        }
    }

    pub fn kind(&self) -> ColumnKind {
        self.values.kind()
    }
}

/// Complete dataset used as ground truth
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    columns: Vec<Column>,
    rows: usize,
}

impl Dataset {
    /// Builds a dataset, enforcing unique names, equal lengths and finite
    /// numeric values
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        let rows = validate_schema(columns.iter().map(|c| (c.name.as_str(), c.values.len())))?;
        for column in &columns {
            if let ColumnValues::Numeric(values) = &column.values {
                if let Some(row) = values.iter().position(|v| !v.is_finite()) {
                    return Err(ImputeBenchError::InvalidDataset(format!(
                        "column {} holds a non-finite value at row {}",
                        column.name, row
                    )));
                }
            }
        }
        Ok(Self { columns, rows })
    }

    pub fn n_rows(&self) -> usize {
        self.rows
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn kinds(&self) -> Vec<ColumnKind> {
        self.columns.iter().map(Column::kind).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn is_categorical(&self) -> bool {
        self.columns.iter().all(|c| c.kind() == ColumnKind::Categorical)
    }

    /// First `n` rows, as used by sample-size sweeps
    pub fn head(&self, n: usize) -> Result<Self> {
        if n > self.rows {
            return Err(ImputeBenchError::InvalidDataset(format!(
                "requested {} rows from a dataset of {}",
                n, self.rows
            )));
        }
        Ok(Self {
            columns: self
                .columns
                .iter()
                .map(|c| Column {
                    name: c.name.clone(),
                    values: c.values.head(n),
                })
                .collect(),
            rows: n,
        })
    }
}

/// Column values where `None` marks an absent cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IncompleteValues {
    Numeric(Vec<Option<f64>>),
    Categorical(Vec<Option<String>>),
}

impl IncompleteValues {
    pub fn len(&self) -> usize {
        match self {
            Self::Numeric(v) => v.len(),
            Self::Categorical(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self) -> ColumnKind {
        match self {
            Self::Numeric(_) => ColumnKind::Numeric,
            Self::Categorical(_) => ColumnKind::Categorical,
        }
    }

    pub fn is_absent(&self, row: usize) -> bool {
        match self {
            Self::Numeric(v) => v[row].is_none(),
            Self::Categorical(v) => v[row].is_none(),
        }
    }

    pub fn observed_count(&self) -> usize {
        (0..self.len()).filter(|&r| !self.is_absent(r)).count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncompleteColumn {
    pub name: String,
    pub values: IncompleteValues,
}

/// Dataset with suppressed cells
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncompleteDataset {
    columns: Vec<IncompleteColumn>,
    rows: usize,
}

impl IncompleteDataset {
    pub fn new(columns: Vec<IncompleteColumn>) -> Result<Self> {
        let rows = validate_schema(columns.iter().map(|c| (c.name.as_str(), c.values.len())))?;
        Ok(Self { columns, rows })
    }

    /// Copies a complete dataset, leaving every cell observed
    pub fn from_complete(dataset: &Dataset) -> Self {
        let columns = dataset
            .columns()
            .iter()
            .map(|c| IncompleteColumn {
                name: c.name.clone(),
                values: match &c.values {
                    ColumnValues::Numeric(v) => {
                        IncompleteValues::Numeric(v.iter().copied().map(Some).collect())
                    }
                    ColumnValues::Categorical(v) => {
                        IncompleteValues::Categorical(v.iter().cloned().map(Some).collect())
                    }
                },
            })
            .collect();
        Self {
            columns,
            rows: dataset.n_rows(),
        }
    }

    /// Blanks every cell the mask marks, keeping the rest of `dataset`
    pub fn from_mask(dataset: &Dataset, mask: &MissingnessMask) -> Result<Self> {
        if mask.n_rows() != dataset.n_rows() || mask.n_cols() != dataset.n_cols() {
            return Err(ImputeBenchError::ShapeMismatch {
                expected: format!("{}x{}", dataset.n_rows(), dataset.n_cols()),
                actual: format!("{}x{}", mask.n_rows(), mask.n_cols()),
            });
        }
        let mut incomplete = Self::from_complete(dataset);
        for (col, column) in incomplete.columns.iter_mut().enumerate() {
            let flags = mask.column(col);
            match &mut column.values {
                IncompleteValues::Numeric(v) => {
                    for (cell, &missing) in v.iter_mut().zip(flags) {
                        if missing {
                            *cell = None;
                        }
                    }
                }
                IncompleteValues::Categorical(v) => {
                    for (cell, &missing) in v.iter_mut().zip(flags) {
                        if missing {
                            *cell = None;
                        }
                    }
                }
            }
        }
        Ok(incomplete)
    }

    pub fn n_rows(&self) -> usize {
        self.rows
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[IncompleteColumn] {
        &self.columns
    }

    pub fn names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn kinds(&self) -> Vec<ColumnKind> {
        self.columns.iter().map(|c| c.values.kind()).collect()
    }

    pub fn absent_count(&self) -> usize {
        self.columns
            .iter()
            .map(|c| c.values.len() - c.values.observed_count())
            .sum()
    }

    /// Mask of absent cells
    pub fn absent_mask(&self) -> MissingnessMask {
        let mut mask = MissingnessMask::new(self.names(), self.rows);
        for (col, column) in self.columns.iter().enumerate() {
            for row in 0..self.rows {
                if column.values.is_absent(row) {
                    mask.mark(row, col);
                }
            }
        }
        mask
    }

    pub fn head(&self, n: usize) -> Result<Self> {
        if n > self.rows {
            return Err(ImputeBenchError::InvalidDataset(format!(
                "requested {} rows from a dataset of {}",
                n, self.rows
            )));
        }
        let columns = self
            .columns
            .iter()
            .map(|c| IncompleteColumn {
                name: c.name.clone(),
                values: match &c.values {
                    IncompleteValues::Numeric(v) => IncompleteValues::Numeric(v[..n].to_vec()),
                    IncompleteValues::Categorical(v) => {
                        IncompleteValues::Categorical(v[..n].to_vec())
                    }
                },
            })
            .collect();
        Ok(Self { columns, rows: n })
    }
}

/// Shared schema validation: unique names, consistent row counts
fn validate_schema<'a>(columns: impl Iterator<Item = (&'a str, usize)>) -> Result<usize> {
    let mut seen = HashSet::new();
    let mut rows = None;
    for (name, len) in columns {
        if !seen.insert(name) {
            return Err(ImputeBenchError::InvalidDataset(format!(
                "duplicate column name {}",
                name
            )));
        }
        match rows {
            None => rows = Some(len),
            Some(expected) if expected != len => {
                return Err(ImputeBenchError::InvalidDataset(format!(
                    "column {} has {} rows, expected {}",
                    name, len, expected
                )));
            }
            _ => {}
        }
    }
    Ok(rows.unwrap_or(0))
}
