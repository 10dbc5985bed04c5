//! Result table of a sweep
//!
//! Append-only. One [`ResultRecord`] per completed combination, one
//! [`SkippedCombination`] per stage failure; both keep sweep order.

use std::fmt;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ImputeBenchError, Result};
use crate::missingness::MechanismClass;

/// Algorithm label of the structure-learning baseline on clean data
pub const COMPLETE_BASELINE: &str = "Complete";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub dataset: String,
    pub sample_size: usize,
    /// Absent for the complete-data baseline
    pub mechanism: Option<MechanismClass>,
    pub error_rate: Option<f64>,
    pub algorithm: String,
    /// Headline reconstruction error (RMSE, or PFC for all-categorical data)
    pub error: Option<f64>,
    pub rmse: Option<f64>,
    pub pfc: Option<f64>,
    pub scored_cells: usize,
    /// F1 of the structure learned from the imputed data
    pub f1: Option<f64>,
    pub shd: Option<usize>,
    pub impute_seconds: Option<f64>,
}

/// Pipeline stage a combination failed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Load,
    Inject,
    Impute,
    Score,
    Learn,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Load => "load",
            Self::Inject => "inject",
            Self::Impute => "impute",
            Self::Score => "score",
            Self::Learn => "learn",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedCombination {
    pub dataset: String,
    pub sample_size: Option<usize>,
    pub mechanism: Option<MechanismClass>,
    pub error_rate: Option<f64>,
    pub algorithm: Option<String>,
    pub stage: Stage,
    /// Stable error label, see [`ImputeBenchError::kind`]
    pub kind: String,
    pub reason: String,
}

impl SkippedCombination {
    pub fn new(dataset: &str, stage: Stage, error: &ImputeBenchError) -> Self {
        Self {
            dataset: dataset.to_string(),
            sample_size: None,
            mechanism: None,
            error_rate: None,
            algorithm: None,
            stage,
            kind: error.kind().to_string(),
            reason: error.to_string(),
        }
    }
}

impl fmt::Display for SkippedCombination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.dataset)?;
        if let Some(size) = self.sample_size {
            write!(f, " n={}", size)?;
        }
        if let Some(mechanism) = self.mechanism {
            write!(f, " {}", mechanism)?;
        }
        if let Some(rate) = self.error_rate {
            write!(f, " rate={}", rate)?;
        }
        if let Some(algorithm) = &self.algorithm {
            write!(f, " {}", algorithm)?;
        }
        write!(f, " [{}] {}", self.stage, self.reason)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultTable {
    run_id: Uuid,
    records: Vec<ResultRecord>,
    skipped: Vec<SkippedCombination>,
}

impl ResultTable {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            records: Vec::new(),
            skipped: Vec::new(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn push_record(&mut self, record: ResultRecord) {
        self.records.push(record);
    }

    pub fn push_skip(&mut self, skip: SkippedCombination) {
        self.skipped.push(skip);
    }

    pub fn records(&self) -> &[ResultRecord] {
        &self.records
    }

    pub fn skipped(&self) -> &[SkippedCombination] {
        &self.skipped
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Writes the records as CSV; absent values are empty fields
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        for record in &self.records {
            csv_writer.serialize(record)?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    /// Writes the whole table, skips included, as pretty JSON
    pub fn write_json<W: Write>(&self, writer: W) -> Result<()> {
        serde_json::to_writer_pretty(writer, self).map_err(io::Error::from)?;
        Ok(())
    }

    /// Writes JSON when `path` ends in `.json`, CSV otherwise
    pub fn write_file(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => self.write_json(file),
            _ => self.write_csv(file),
        }
    }
}

impl Default for ResultTable {
    fn default() -> Self {
        Self::new()
    }
}
