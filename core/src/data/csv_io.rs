//! CSV reading and writing for complete and incomplete datasets
//!
//! Column kinds are inferred: a column is numeric when every observed cell
//! parses as a finite float, categorical otherwise. Callers holding
//! label-coded data (for example integer-coded UCI attributes) can force the
//! categorical reading.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::data::dataset::{
    Column, ColumnKind, ColumnValues, Dataset, IncompleteColumn, IncompleteDataset,
    IncompleteValues,
};
use crate::error::{ImputeBenchError, Result};

/// Tokens read as absent cells
const MISSING_TOKENS: &[&str] = &["", "NA", "NaN", "nan", "?"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsvOptions {
    /// Read every column as categorical labels
    #[serde(default)]
    pub force_categorical: bool,
}

fn is_missing_token(cell: &str) -> bool {
    MISSING_TOKENS.contains(&cell.trim())
}

/// Raw cells per column, header order preserved
fn read_cells<R: Read>(reader: R) -> Result<(Vec<String>, Vec<Vec<Option<String>>>)> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let names: Vec<String> = csv_reader.headers()?.iter().map(str::to_string).collect();
    let mut cells = vec![Vec::new(); names.len()];
    for record in csv_reader.records() {
        let record = record?;
        if record.len() != names.len() {
            return Err(ImputeBenchError::InvalidDataset(format!(
                "record with {} fields under a header of {}",
                record.len(),
                names.len()
            )));
        }
        for (col, cell) in record.iter().enumerate() {
            cells[col].push(if is_missing_token(cell) {
                None
            } else {
                Some(cell.to_string())
            });
        }
    }
    Ok((names, cells))
}

fn infer_kind(cells: &[Option<String>], options: &CsvOptions) -> ColumnKind {
    if options.force_categorical {
        return ColumnKind::Categorical;
    }
    let numeric = cells
        .iter()
        .flatten()
        .all(|c| c.parse::<f64>().map(f64::is_finite).unwrap_or(false));
    if numeric {
        ColumnKind::Numeric
    } else {
        ColumnKind::Categorical
    }
}

fn to_incomplete(name: String, cells: Vec<Option<String>>, options: &CsvOptions) -> IncompleteColumn {
    let values = match infer_kind(&cells, options) {
        ColumnKind::Numeric => IncompleteValues::Numeric(
            cells
                .into_iter()
                .map(|c| c.and_then(|s| s.parse::<f64>().ok()))
                .collect(),
        ),
        ColumnKind::Categorical => IncompleteValues::Categorical(cells),
    };
    IncompleteColumn { name, values }
}

/// Reads a dataset that may contain absent cells
pub fn read_incomplete<R: Read>(reader: R, options: &CsvOptions) -> Result<IncompleteDataset> {
    let (names, cells) = read_cells(reader)?;
    let columns = names
        .into_iter()
        .zip(cells)
        .map(|(name, cells)| to_incomplete(name, cells, options))
        .collect();
    IncompleteDataset::new(columns)
}

/// Reads a complete dataset; any absent cell is rejected
pub fn read_dataset<R: Read>(reader: R, options: &CsvOptions) -> Result<Dataset> {
    let incomplete = read_incomplete(reader, options)?;
    let mut columns = Vec::with_capacity(incomplete.n_cols());
    for column in incomplete.columns() {
        let values = match &column.values {
            IncompleteValues::Numeric(v) => ColumnValues::Numeric(
                v.iter()
                    .map(|c| c.ok_or_else(|| absent_cell(&column.name)))
                    .collect::<Result<_>>()?,
            ),
            IncompleteValues::Categorical(v) => ColumnValues::Categorical(
                v.iter()
                    .map(|c| c.clone().ok_or_else(|| absent_cell(&column.name)))
                    .collect::<Result<_>>()?,
            ),
        };
        columns.push(Column {
            name: column.name.clone(),
            values,
        });
    }
    Dataset::new(columns)
}

fn absent_cell(column: &str) -> ImputeBenchError {
    ImputeBenchError::InvalidDataset(format!(
        "complete dataset has an absent cell in column {}",
        column
    ))
}

pub fn read_dataset_file(path: &Path, options: &CsvOptions) -> Result<Dataset> {
    let file = File::open(path)
        .map_err(|e| ImputeBenchError::external(format!("dataset file {}", path.display()), e))?;
    read_dataset(file, options)
}

pub fn read_incomplete_file(path: &Path, options: &CsvOptions) -> Result<IncompleteDataset> {
    let file = File::open(path)
        .map_err(|e| ImputeBenchError::external(format!("dataset file {}", path.display()), e))?;
    read_incomplete(file, options)
}

/// Writes a dataset; absent cells are written empty
pub fn write_incomplete<W: Write>(writer: W, dataset: &IncompleteDataset) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(dataset.names())?;
    for row in 0..dataset.n_rows() {
        let record: Vec<String> = dataset
            .columns()
            .iter()
            .map(|c| match &c.values {
                IncompleteValues::Numeric(v) => v[row].map(|x| x.to_string()).unwrap_or_default(),
                IncompleteValues::Categorical(v) => v[row].clone().unwrap_or_default(),
            })
            .collect();
        csv_writer.write_record(&record)?;
    }
    csv_writer.flush()?;
    Ok(())
}

pub fn write_dataset<W: Write>(writer: W, dataset: &Dataset) -> Result<()> {
    write_incomplete(writer, &IncompleteDataset::from_complete(dataset))
}

pub fn write_incomplete_file(path: &Path, dataset: &IncompleteDataset) -> Result<()> {
    write_incomplete(File::create(path)?, dataset)
}
