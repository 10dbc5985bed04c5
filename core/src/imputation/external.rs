//! Black-box imputation collaborators
//!
//! Low-rank, ensemble and generative imputers (softImpute, MissForest with or
//! without Markov-blanket feature selection, GAIN) are statistical routines
//! maintained outside this crate. They plug in through [`ExternalRoutine`];
//! [`CollaboratorImputer`] adds an id, a family and documented defaults.

use std::sync::Arc;

use log::debug;
use nalgebra::DMatrix;

use crate::bridge::{read_matrix, scratch_file, write_matrix, CommandSpec};
use crate::error::{ImputeBenchError, Result};
use crate::imputation::encoding::EncodedMatrix;
use crate::imputation::options::{AlgorithmParameter, ImputerOptions, ParameterType};
use crate::imputation::{AlgorithmFamily, AlgorithmId, Imputer};

/// Opaque imputation routine
pub trait ExternalRoutine: Send + Sync {
    fn name(&self) -> &str;

    /// Fills every NaN cell of `data`; options arrive with defaults resolved
    fn fit_transform(&self, data: &EncodedMatrix, options: &ImputerOptions) -> Result<DMatrix<f64>>;
}

/// Documented defaults for each collaborator family
pub fn family_parameters(family: AlgorithmFamily) -> Vec<AlgorithmParameter> {
    match family {
        AlgorithmFamily::LowRank => vec![
            AlgorithmParameter::new(
                "grid_len",
                5,
                ParameterType::Integer,
                "Number of shrinkage values tried by cross-validation",
            )
            .with_range(Some(1.0), None),
            AlgorithmParameter::new("max_iters", 100, ParameterType::Integer, "Iteration cap")
                .with_range(Some(1.0), None),
        ],
        AlgorithmFamily::EnsembleBased => vec![
            AlgorithmParameter::new(
                "feature_selection",
                "none",
                ParameterType::Enum(vec!["none".into(), "mbfs".into()]),
                "Restrict each forest to the variable's Markov blanket (mbfs) or use all",
            ),
            AlgorithmParameter::new("max_iter", 10, ParameterType::Integer, "Refinement rounds")
                .with_range(Some(1.0), None),
            AlgorithmParameter::new("n_estimators", 100, ParameterType::Integer, "Trees per forest")
                .with_range(Some(1.0), None),
        ],
        AlgorithmFamily::GenerativeNetwork => vec![
            AlgorithmParameter::new("batch_size", 64, ParameterType::Integer, "Mini-batch size")
                .with_range(Some(1.0), None),
            AlgorithmParameter::new("hint_rate", 0.9, ParameterType::Float, "Hint mechanism rate")
                .with_range(Some(0.0), Some(1.0)),
            AlgorithmParameter::new("alpha", 10.0, ParameterType::Float, "Reconstruction loss weight")
                .with_range(Some(0.0), None),
            AlgorithmParameter::new("iterations", 10_000, ParameterType::Integer, "Training steps")
                .with_range(Some(1.0), None),
        ],
        AlgorithmFamily::ConstantFill | AlgorithmFamily::NeighborBased => Vec::new(),
    }
}

/// Registry entry backed by an external routine
pub struct CollaboratorImputer {
    id: AlgorithmId,
    family: AlgorithmFamily,
    parameters: Vec<AlgorithmParameter>,
    routine: Arc<dyn ExternalRoutine>,
}

impl CollaboratorImputer {
    pub fn new(id: AlgorithmId, family: AlgorithmFamily, routine: Arc<dyn ExternalRoutine>) -> Self {
        Self {
            id,
            family,
            parameters: family_parameters(family),
            routine,
        }
    }

    pub fn with_parameters(mut self, parameters: Vec<AlgorithmParameter>) -> Self {
        self.parameters = parameters;
        self
    }
}

impl Imputer for CollaboratorImputer {
    fn id(&self) -> AlgorithmId {
        self.id.clone()
    }

    fn family(&self) -> AlgorithmFamily {
        self.family
    }

    fn parameters(&self) -> Vec<AlgorithmParameter> {
        self.parameters.clone()
    }

    fn fit_transform(&self, data: &EncodedMatrix, options: &ImputerOptions) -> Result<DMatrix<f64>> {
        let options = options.resolved(&self.parameters)?;
        self.routine
            .fit_transform(data, &options)
            .map_err(|err| match err {
                ImputeBenchError::ExternalCollaborator { .. } => err,
                other => ImputeBenchError::external(self.routine.name(), other),
            })
    }
}

/// Exchanges CSV files with an external program
///
/// The program receives `{input}` (encoded matrix, `NA` for absent cells) and
/// `{output}` placeholders, then one `--name=value` argument per option and
/// `--categorical=i,j,...` listing categorical column indices.
#[derive(Debug, Clone)]
pub struct CommandRoutine {
    name: String,
    command: CommandSpec,
}

impl CommandRoutine {
    pub fn new(name: impl Into<String>, command: CommandSpec) -> Self {
        Self {
            name: name.into(),
            command,
        }
    }
}

impl ExternalRoutine for CommandRoutine {
    fn name(&self) -> &str {
        &self.name
    }

    fn fit_transform(&self, data: &EncodedMatrix, options: &ImputerOptions) -> Result<DMatrix<f64>> {
        let input = scratch_file()?;
        let output = scratch_file()?;
        write_matrix(&input, data.names(), data.values())?;

        let mut extra: Vec<String> = options
            .iter()
            .map(|(name, value)| format!("--{}={}", name, value))
            .collect();
        let categorical: Vec<String> = (0..data.n_cols())
            .filter(|&c| data.is_categorical(c))
            .map(|c| c.to_string())
            .collect();
        if !categorical.is_empty() {
            extra.push(format!("--categorical={}", categorical.join(",")));
        }

        self.command
            .run(&[("input", &*input), ("output", &*output)], &extra)?;
        let matrix = read_matrix(&output)?;
        debug!("{} returned a {}x{} matrix", self.name, matrix.nrows(), matrix.ncols());
        Ok(matrix)
    }
}
