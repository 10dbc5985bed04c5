//! Process bridge to collaborators written in other languages
//!
//! Statistical routines such as MissForest, softImpute, GAIN or score-based
//! structure learners live outside this crate. They are reached by running a
//! command that exchanges CSV files; `{input}` and `{output}` in the argument
//! list are replaced with scratch-file paths.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::Command;

use log::debug;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use tempfile::TempPath;

use crate::error::{ImputeBenchError, Result};

/// External program invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            working_dir: None,
        }
    }

    /// Runs the command to completion and returns its standard output
    pub fn run(&self, substitutions: &[(&str, &Path)], extra_args: &[String]) -> Result<String> {
        let args: Vec<String> = self
            .args
            .iter()
            .map(|arg| {
                substitutions.iter().fold(arg.clone(), |acc, (key, path)| {
                    acc.replace(&format!("{{{}}}", key), &path.to_string_lossy())
                })
            })
            .chain(extra_args.iter().cloned())
            .collect();

        let mut command = Command::new(&self.program);
        command.args(&args);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }
        debug!("Running collaborator: {} {}", self.program, args.join(" "));

        let output = command
            .output()
            .map_err(|e| ImputeBenchError::external(&self.program, e))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ImputeBenchError::external(
                &self.program,
                format!("exited with {}: {}", output.status, stderr.trim()),
            ));
        }
        String::from_utf8(output.stdout).map_err(|e| ImputeBenchError::external(&self.program, e))
    }
}

/// Creates an empty scratch CSV, removed when the returned path is dropped
pub fn scratch_file() -> Result<TempPath> {
    let file = tempfile::Builder::new()
        .prefix("imputebench-")
        .suffix(".csv")
        .tempfile()?;
    Ok(file.into_temp_path())
}

/// Writes a numeric matrix with a header row; NaN cells are written as `NA`
pub fn write_matrix(path: &Path, names: &[String], matrix: &DMatrix<f64>) -> Result<()> {
    let mut writer = csv::Writer::from_writer(File::create(path)?);
    writer.write_record(names)?;
    for row in 0..matrix.nrows() {
        let record: Vec<String> = (0..matrix.ncols())
            .map(|col| {
                let value = matrix[(row, col)];
                if value.is_nan() {
                    "NA".to_string()
                } else {
                    value.to_string()
                }
            })
            .collect();
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Reads a numeric matrix written by a collaborator; the header row is skipped
pub fn read_matrix(path: &Path) -> Result<DMatrix<f64>> {
    let file = File::open(path).map_err(|e| {
        ImputeBenchError::external(format!("collaborator output {}", path.display()), e)
    })?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(file);
    let malformed = |e: csv::Error| ImputeBenchError::external("collaborator output", e);
    let width = reader.headers().map_err(malformed)?.len();
    let mut cells = Vec::new();
    let mut rows = 0;
    for record in reader.records() {
        let record = record.map_err(malformed)?;
        if record.len() != width {
            return Err(ImputeBenchError::external(
                "collaborator output",
                format!("row {} has {} fields, expected {}", rows, record.len(), width),
            ));
        }
        for cell in record.iter() {
            let value = match cell {
                "NA" | "NaN" | "nan" | "" => f64::NAN,
                text => text.parse::<f64>().map_err(|e| {
                    ImputeBenchError::external("collaborator output", format!("{}: {}", text, e))
                })?,
            };
            cells.push(value);
        }
        rows += 1;
    }
    Ok(DMatrix::from_row_slice(rows, width, &cells))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matrix_exchange_round_trip() {
        let scratch = scratch_file().unwrap();
        let names = vec!["a".to_string(), "b".to_string()];
        let matrix = DMatrix::from_row_slice(2, 2, &[1.0, f64::NAN, 2.5, -3.0]);
        write_matrix(&scratch, &names, &matrix).unwrap();

        let back = read_matrix(&scratch).unwrap();
        assert_eq!(back.shape(), (2, 2));
        assert!(back[(0, 1)].is_nan());
        assert_eq!(back[(1, 0)], 2.5);
    }

    #[test]
    fn test_scratch_file_exists_until_dropped() {
        let scratch = scratch_file().unwrap();
        let path = scratch.to_path_buf();
        assert!(path.exists());
        assert!(path.file_name().unwrap().to_string_lossy().starts_with("imputebench-"));
        std::fs::write(&scratch, "x").unwrap();
        drop(scratch);
        assert!(!path.exists());
    }

    #[test]
    fn test_scratch_files_are_distinct() {
        let a = scratch_file().unwrap();
        let b = scratch_file().unwrap();
        assert_ne!(a.to_path_buf(), b.to_path_buf());
    }

    #[test]
    fn test_missing_program_is_collaborator_error() {
        let spec = CommandSpec::new("imputebench-no-such-program", vec![]);
        let err = spec.run(&[], &[]).unwrap_err();
        assert_eq!(err.kind(), "external-collaborator");
    }
}
