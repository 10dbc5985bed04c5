//! Sweep configuration
//!
//! Read from JSON. Every field has a default, so a config naming only its
//! datasets runs the benchmark's standard grid: all three mechanisms at error
//! rates 0.1, 0.3 and 0.5 with half of the variables partially observed,
//! imputed by Mean and KNN.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::bridge::CommandSpec;
use crate::causal::structure::{CommandStructureLearner, StructureLearner};
use crate::data::source::DatasetSpec;
use crate::error::{ImputeBenchError, Result};
use crate::imputation::external::{CollaboratorImputer, CommandRoutine};
use crate::imputation::{AlgorithmFamily, AlgorithmId, Imputer, ImputerOptions};
use crate::metrics::MetricConfig;
use crate::missingness::MechanismClass;

/// One algorithm to run, with its options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmRequest {
    pub id: AlgorithmId,
    #[serde(default)]
    pub options: ImputerOptions,
}

impl AlgorithmRequest {
    pub fn new(id: &str) -> Self {
        Self {
            id: AlgorithmId::new(id),
            options: ImputerOptions::new(),
        }
    }
}

/// Imputer provided by an external program
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalImputerConfig {
    pub id: AlgorithmId,
    pub family: AlgorithmFamily,
    pub command: CommandSpec,
}

impl ExternalImputerConfig {
    /// Registry entry running the configured command
    pub fn imputer(&self) -> Arc<dyn Imputer> {
        let routine = CommandRoutine::new(self.id.as_str(), self.command.clone());
        Arc::new(CollaboratorImputer::new(
            self.id.clone(),
            self.family,
            Arc::new(routine),
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureLearnerConfig {
    pub name: String,
    pub command: CommandSpec,
}

impl StructureLearnerConfig {
    pub fn learner(&self) -> Arc<dyn StructureLearner> {
        Arc::new(CommandStructureLearner::new(&self.name, self.command.clone()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    pub datasets: Vec<DatasetSpec>,
    /// Row counts taken from the head of each dataset; empty means all rows
    pub sample_sizes: Vec<usize>,
    pub mechanisms: Vec<MechanismClass>,
    /// Maximum per-cell missing probabilities
    pub error_rates: Vec<f64>,
    /// Fraction of variables made partially observed
    pub partially_observed_ratio: f64,
    pub algorithms: Vec<AlgorithmRequest>,
    pub seed: u64,
    /// Run combinations on the rayon pool
    pub parallel: bool,
    pub imputation_timeout_secs: Option<f64>,
    pub metrics: MetricConfig,
    pub external_imputers: Vec<ExternalImputerConfig>,
    pub structure_learner: Option<StructureLearnerConfig>,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            datasets: Vec::new(),
            sample_sizes: Vec::new(),
            mechanisms: MechanismClass::ALL.to_vec(),
            error_rates: vec![0.1, 0.3, 0.5],
            partially_observed_ratio: 0.5,
            algorithms: vec![AlgorithmRequest::new("Mean"), AlgorithmRequest::new("KNN")],
            seed: 0,
            parallel: false,
            imputation_timeout_secs: None,
            metrics: MetricConfig::default(),
            external_imputers: Vec::new(),
            structure_learner: None,
        }
    }
}

impl SweepConfig {
    pub fn from_json_str(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        // Surface unknown mechanism names with their own error kind.
        if let Some(mechanisms) = value.get("mechanisms").and_then(Value::as_array) {
            for name in mechanisms.iter().filter_map(Value::as_str) {
                name.parse::<MechanismClass>()?;
            }
        }
        let config: Self = serde_json::from_value(value)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn imputation_timeout(&self) -> Option<Duration> {
        self.imputation_timeout_secs.map(Duration::from_secs_f64)
    }

    /// Total number of (dataset, size, mechanism, rate, algorithm) combinations
    pub fn combination_count(&self) -> usize {
        self.datasets.len()
            * self.sample_sizes.len().max(1)
            * self.mechanisms.len()
            * self.error_rates.len()
            * self.algorithms.len()
    }

    /// Rejects configurations no combination could run under
    pub fn validate(&self) -> Result<()> {
        let invalid = |name: &str, reason: String| ImputeBenchError::InvalidParameter {
            name: name.to_string(),
            reason,
        };

        let mut names = HashSet::new();
        for spec in &self.datasets {
            if !names.insert(spec.name()) {
                return Err(invalid("datasets", format!("duplicate dataset name {}", spec.name())));
            }
        }
        if self.mechanisms.is_empty() {
            return Err(invalid("mechanisms", "at least one mechanism is required".into()));
        }
        if self.error_rates.is_empty() {
            return Err(invalid("error_rates", "at least one error rate is required".into()));
        }
        if let Some(&rate) = self.error_rates.iter().find(|&&r| !(r > 0.0 && r <= 1.0)) {
            return Err(ImputeBenchError::InvalidRate {
                name: "error_rate",
                value: rate,
                expected: "(0, 1]",
            });
        }
        if !(0.0..=1.0).contains(&self.partially_observed_ratio) {
            return Err(ImputeBenchError::InvalidRate {
                name: "partially_observed_ratio",
                value: self.partially_observed_ratio,
                expected: "[0, 1]",
            });
        }
        if self.sample_sizes.contains(&0) {
            return Err(invalid("sample_sizes", "sample sizes must be positive".into()));
        }
        if self.algorithms.is_empty() {
            return Err(invalid("algorithms", "at least one algorithm is required".into()));
        }
        if let Some(secs) = self.imputation_timeout_secs {
            if !(secs.is_finite() && secs > 0.0) {
                return Err(invalid(
                    "imputation_timeout_secs",
                    format!("{} is not a positive duration", secs),
                ));
            }
        }
        Ok(())
    }
}
