//! imputebench core - Benchmark harness for missing-data imputation
//!
//! Suppresses cells of a complete dataset under an MCAR, MAR or MNAR
//! mechanism, completes the result with a registered imputer and scores the
//! reconstruction against the ground truth, optionally also scoring a causal
//! structure learned from the imputed data.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

pub mod bridge;
pub mod causal;
pub mod data;
pub mod error;
pub mod experiment;
pub mod imputation;
pub mod metrics;
pub mod missingness;

pub use self::causal::{
    CausalGraph, CausalModel, DiscreteBayesianNetwork, LinearGaussianModel, StructureLearner,
};
pub use self::data::{Dataset, DatasetSpec, IncompleteDataset, MissingnessMask};
pub use self::error::{ImputeBenchError, Result};
pub use self::experiment::{ExperimentRunner, ResultTable, SweepConfig};
pub use self::imputation::{AlgorithmId, Imputer, ImputerOptions, ImputerRegistry};
pub use self::metrics::{MetricEngine, ReconstructionReport, StructuralScore};
pub use self::missingness::{derive_cause_mapping, inject, CauseMapping, MechanismClass};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
