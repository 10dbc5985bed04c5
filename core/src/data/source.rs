//! Dataset sources
//!
//! A sweep names its datasets declaratively; a [`DatasetProvider`] resolves
//! each [`DatasetSpec`] into ground-truth rows plus, when known, the causal
//! structure that generated them.

use std::fs;
use std::path::{Path, PathBuf};

use log::info;
use rand::seq::SliceRandom;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};

use crate::causal::graph::CausalGraph;
use crate::causal::discrete::{DiscreteBayesianNetwork, ProbabilityTables, StateRange};
use crate::causal::model::{CausalModel, CoefficientRange, LinearGaussianModel};
use crate::data::csv_io::{read_dataset_file, CsvOptions};
use crate::data::dataset::Dataset;
use crate::error::{ImputeBenchError, Result};

/// Declarative dataset description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DatasetSpec {
    /// Complete tabular file
    File {
        name: String,
        path: PathBuf,
        #[serde(default)]
        csv: CsvOptions,
        /// Known structure, if any, as a model string
        #[serde(default)]
        structure: Option<String>,
    },
    /// Rows sampled from a linear-Gaussian model over `structure`
    Simulated {
        name: String,
        structure: String,
        rows: usize,
        #[serde(default)]
        coefficients: CoefficientRange,
        /// Fixed seed for the model and its sample; otherwise the caller's
        /// generator is used
        #[serde(default)]
        seed: Option<u64>,
        /// Shuffle column order so imputers cannot exploit declaration order
        #[serde(default)]
        shuffle_columns: bool,
    },
    /// Rows sampled from a discrete Bayesian network over `structure`
    Discrete {
        name: String,
        structure: String,
        rows: usize,
        /// JSON [`ProbabilityTables`]; random tables are drawn when absent
        #[serde(default)]
        tables: Option<PathBuf>,
        #[serde(default)]
        states: StateRange,
        /// Dirichlet concentration of random CPT rows
        #[serde(default = "default_concentration")]
        concentration: f64,
        #[serde(default)]
        seed: Option<u64>,
        #[serde(default)]
        shuffle_columns: bool,
    },
}

fn default_concentration() -> f64 {
    1.0
}

impl DatasetSpec {
    pub fn name(&self) -> &str {
        match self {
            Self::File { name, .. } | Self::Simulated { name, .. } | Self::Discrete { name, .. } => name,
        }
    }
}

fn read_tables(path: &Path) -> Result<ProbabilityTables> {
    let text = fs::read_to_string(path)
        .map_err(|e| ImputeBenchError::external(format!("network file {}", path.display()), e))?;
    Ok(serde_json::from_str(&text)?)
}

fn shuffled(data: Dataset, rng: &mut dyn RngCore) -> Result<Dataset> {
    let mut columns = data.columns().to_vec();
    columns.shuffle(rng);
    Dataset::new(columns)
}

/// Ground truth ready for a sweep
#[derive(Debug, Clone)]
pub struct LoadedDataset {
    pub name: String,
    pub data: Dataset,
    pub graph: Option<CausalGraph>,
}

/// Resolves dataset specs; failures surface as collaborator errors
pub trait DatasetProvider: Send + Sync {
    fn load(&self, spec: &DatasetSpec, rng: &mut dyn RngCore) -> Result<LoadedDataset>;
}

/// Reads CSV files and simulates Gaussian Bayesian networks
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultDatasetProvider;

impl DatasetProvider for DefaultDatasetProvider {
    fn load(&self, spec: &DatasetSpec, rng: &mut dyn RngCore) -> Result<LoadedDataset> {
        match spec {
            DatasetSpec::File {
                name,
                path,
                csv,
                structure,
            } => {
                let data = read_dataset_file(path, csv)?;
                let graph = structure.as_deref().map(CausalGraph::parse).transpose()?;
                info!(
                    "Loaded {} from {} ({} rows, {} columns)",
                    name,
                    path.display(),
                    data.n_rows(),
                    data.n_cols()
                );
                Ok(LoadedDataset {
                    name: name.clone(),
                    data,
                    graph,
                })
            }
            DatasetSpec::Simulated {
                name,
                structure,
                rows,
                coefficients,
                seed,
                shuffle_columns,
            } => {
                let graph = CausalGraph::parse(structure)?;
                let mut seeded;
                let rng: &mut dyn RngCore = match seed {
                    Some(seed) => {
                        seeded = ChaCha20Rng::seed_from_u64(*seed);
                        &mut seeded
                    }
                    None => rng,
                };
                let model =
                    LinearGaussianModel::with_random_coefficients(graph.clone(), *coefficients, rng)?;
                let mut data = model.simulate(*rows, rng)?;
                if *shuffle_columns {
                    data = shuffled(data, rng)?;
                }
                info!("Simulated {} rows of {} over {} variables", rows, name, graph.len());
                Ok(LoadedDataset {
                    name: name.clone(),
                    data,
                    graph: Some(graph),
                })
            }
            DatasetSpec::Discrete {
                name,
                structure,
                rows,
                tables,
                states,
                concentration,
                seed,
                shuffle_columns,
            } => {
                let graph = CausalGraph::parse(structure)?;
                let mut seeded;
                let rng: &mut dyn RngCore = match seed {
                    Some(seed) => {
                        seeded = ChaCha20Rng::seed_from_u64(*seed);
                        &mut seeded
                    }
                    None => rng,
                };
                let network = match tables {
                    Some(path) => DiscreteBayesianNetwork::new(graph.clone(), read_tables(path)?)?,
                    None => DiscreteBayesianNetwork::with_random_tables(
                        graph.clone(),
                        *states,
                        *concentration,
                        rng,
                    )?,
                };
                let mut data = network.simulate(*rows, rng)?;
                if *shuffle_columns {
                    data = shuffled(data, rng)?;
                }
                info!("Sampled {} rows of {} over {} discrete variables", rows, name, graph.len());
                Ok(LoadedDataset {
                    name: name.clone(),
                    data,
                    graph: Some(graph),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulated_spec_is_reproducible_with_seed() {
        let spec = DatasetSpec::Simulated {
            name: "chain".into(),
            structure: "[A][B|A][C|B]".into(),
            rows: 50,
            coefficients: CoefficientRange::default(),
            seed: Some(5),
            shuffle_columns: false,
        };
        let provider = DefaultDatasetProvider;
        let a = provider.load(&spec, &mut ChaCha20Rng::seed_from_u64(1)).unwrap();
        let b = provider.load(&spec, &mut ChaCha20Rng::seed_from_u64(2)).unwrap();
        assert_eq!(a.data, b.data);
        assert_eq!(a.data.n_rows(), 50);
        assert_eq!(a.graph.unwrap().to_model_string(), "[A][B|A][C|B]");
    }

    #[test]
    fn test_shuffled_columns_keep_every_variable() {
        let spec = DatasetSpec::Simulated {
            name: "wide".into(),
            structure: "[A][B][C][D|A:B][E|C]".into(),
            rows: 5,
            coefficients: CoefficientRange::default(),
            seed: Some(9),
            shuffle_columns: true,
        };
        let loaded = DefaultDatasetProvider
            .load(&spec, &mut ChaCha20Rng::seed_from_u64(0))
            .unwrap();
        let mut names = loaded.data.names();
        names.sort();
        assert_eq!(names, vec!["A", "B", "C", "D", "E"]);
    }

    #[test]
    fn test_spec_deserializes_from_tagged_json() {
        let json = r#"{"kind": "file", "name": "breast", "path": "data/breast.csv"}"#;
        let spec: DatasetSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.name(), "breast");
    }

    #[test]
    fn test_missing_file_propagates_as_collaborator_error() {
        let spec = DatasetSpec::File {
            name: "ghost".into(),
            path: PathBuf::from("/nonexistent/ghost.csv"),
            csv: CsvOptions::default(),
            structure: None,
        };
        let err = DefaultDatasetProvider
            .load(&spec, &mut ChaCha20Rng::seed_from_u64(0))
            .unwrap_err();
        assert_eq!(err.kind(), "external-collaborator");
    }

    #[test]
    fn test_discrete_spec_samples_categorical_columns() {
        let spec: DatasetSpec = serde_json::from_str(
            r#"{"kind": "discrete", "name": "asia", "structure": "[A][S][T|A][L|S][B|S][E|T:L][X|E][D|B:E]", "rows": 200, "seed": 3}"#,
        )
        .unwrap();
        let loaded = DefaultDatasetProvider
            .load(&spec, &mut ChaCha20Rng::seed_from_u64(0))
            .unwrap();
        assert_eq!(loaded.data.n_rows(), 200);
        assert_eq!(loaded.data.n_cols(), 8);
        assert!(loaded.data.is_categorical());
        assert_eq!(loaded.graph.unwrap().len(), 8);
    }

    #[test]
    fn test_discrete_spec_reads_table_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("coin.json");
        fs::write(
            &path,
            r#"{"states": {"coin": ["heads", "tails"]}, "cpts": {"coin": [[1.0, 0.0]]}}"#,
        )
        .unwrap();
        let spec = DatasetSpec::Discrete {
            name: "coin".into(),
            structure: "[coin]".into(),
            rows: 10,
            tables: Some(path),
            states: StateRange::default(),
            concentration: 1.0,
            seed: Some(1),
            shuffle_columns: false,
        };
        let loaded = DefaultDatasetProvider
            .load(&spec, &mut ChaCha20Rng::seed_from_u64(0))
            .unwrap();
        assert_eq!(
            loaded.data.column("coin").unwrap().values,
            crate::data::dataset::ColumnValues::Categorical(vec!["heads".to_string(); 10])
        );
    }
}
