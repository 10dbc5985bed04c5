//! Imputation algorithms behind a uniform adapter
//!
//! Every imputer, native or external, sees the same [`EncodedMatrix`] and
//! returns a matrix of the same shape. The [`ImputerRegistry`] owns the
//! encode/decode round trip, so observed cells always come back unchanged and
//! categorical cells always decode to a known label.

pub mod constant;
pub mod encoding;
pub mod external;
pub mod neighbor;
pub mod options;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use log::debug;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::data::dataset::{Dataset, IncompleteDataset};
use crate::error::{ImputeBenchError, Result};

pub use self::constant::{ConstantImputer, FillStrategy};
pub use self::encoding::{CategoryCodec, EncodedMatrix};
pub use self::external::{family_parameters, CollaboratorImputer, CommandRoutine, ExternalRoutine};
pub use self::neighbor::KnnImputer;
pub use self::options::{
    AlgorithmParameter, ImputerOptions, OptionValue, ParameterConstraints, ParameterType,
};

/// Algorithm identifier used for registry dispatch and result tables
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlgorithmId(String);

impl AlgorithmId {
    pub fn new(name: &str) -> Self {
        Self(name.to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AlgorithmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Broad class of an imputation method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlgorithmFamily {
    /// One statistic per column (mean, median, mode)
    ConstantFill,
    /// Donor rows chosen by distance (KNN)
    NeighborBased,
    /// Matrix completion by nuclear-norm shrinkage (softImpute)
    LowRank,
    /// Iterated random forests (MissForest and its Markov-blanket variant)
    EnsembleBased,
    /// Adversarially trained generator (GAIN)
    GenerativeNetwork,
}

/// Uniform imputation contract
pub trait Imputer: Send + Sync {
    fn id(&self) -> AlgorithmId;

    fn family(&self) -> AlgorithmFamily;

    /// Supported options with their defaults
    fn parameters(&self) -> Vec<AlgorithmParameter>;

    /// Rejects options this imputer does not understand
    fn validate_options(&self, options: &ImputerOptions) -> Result<()> {
        options.validate(&self.parameters())
    }

    /// Returns `data` with every NaN cell filled
    fn fit_transform(&self, data: &EncodedMatrix, options: &ImputerOptions) -> Result<DMatrix<f64>>;
}

/// Dispatch table from algorithm id to imputer
#[derive(Clone)]
pub struct ImputerRegistry {
    imputers: HashMap<AlgorithmId, Arc<dyn Imputer>>,
}

impl ImputerRegistry {
    pub fn new() -> Self {
        Self {
            imputers: HashMap::new(),
        }
    }

    /// Registry with the native imputers: Mean, Median, Mode and KNN
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(ConstantImputer::new(FillStrategy::Mean)));
        registry.register(Arc::new(ConstantImputer::new(FillStrategy::Median)));
        registry.register(Arc::new(ConstantImputer::new(FillStrategy::Mode)));
        registry.register(Arc::new(KnnImputer::new()));
        registry
    }

    /// Adds or replaces the imputer under its own id
    pub fn register(&mut self, imputer: Arc<dyn Imputer>) {
        let id = imputer.id();
        debug!("Registering imputer {} ({:?})", id, imputer.family());
        self.imputers.insert(id, imputer);
    }

    pub fn get(&self, id: &AlgorithmId) -> Option<&Arc<dyn Imputer>> {
        self.imputers.get(id)
    }

    pub fn contains(&self, id: &AlgorithmId) -> bool {
        self.imputers.contains_key(id)
    }

    /// Registered ids in sorted order
    pub fn ids(&self) -> Vec<AlgorithmId> {
        let mut ids: Vec<AlgorithmId> = self.imputers.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Completes `incomplete` with the imputer registered under `id`
    pub fn impute(
        &self,
        incomplete: &IncompleteDataset,
        id: &AlgorithmId,
        options: &ImputerOptions,
    ) -> Result<Dataset> {
        let imputer = self
            .get(id)
            .ok_or_else(|| ImputeBenchError::UnsupportedAlgorithm(id.to_string()))?;
        imputer.validate_options(options)?;

        let encoded = EncodedMatrix::encode(incomplete)?;
        debug!(
            "{} imputing {} absent cells in a {}x{} matrix",
            id,
            encoded.absent_count(),
            encoded.n_rows(),
            encoded.n_cols()
        );
        let output = imputer.fit_transform(&encoded, options)?;
        encoded.decode(&output, id.as_str())
    }
}

impl Default for ImputerRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for ImputerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImputerRegistry")
            .field("imputers", &self.ids())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::{ColumnValues, IncompleteColumn, IncompleteValues};

    fn incomplete() -> IncompleteDataset {
        IncompleteDataset::new(vec![
            IncompleteColumn {
                name: "x".into(),
                values: IncompleteValues::Numeric(vec![Some(1.0), None, Some(5.0), Some(6.0)]),
            },
            IncompleteColumn {
                name: "c".into(),
                values: IncompleteValues::Categorical(vec![
                    Some("u".into()),
                    Some("v".into()),
                    None,
                    Some("v".into()),
                ]),
            },
        ])
        .unwrap()
    }

    struct Shrinking;

    impl Imputer for Shrinking {
        fn id(&self) -> AlgorithmId {
            AlgorithmId::new("Shrinking")
        }

        fn family(&self) -> AlgorithmFamily {
            AlgorithmFamily::LowRank
        }

        fn parameters(&self) -> Vec<AlgorithmParameter> {
            Vec::new()
        }

        fn fit_transform(&self, _: &EncodedMatrix, _: &ImputerOptions) -> Result<DMatrix<f64>> {
            Ok(DMatrix::zeros(1, 1))
        }
    }

    #[test]
    fn test_default_registry_contents() {
        let registry = ImputerRegistry::with_defaults();
        let ids: Vec<String> = registry.ids().iter().map(|id| id.to_string()).collect();
        assert_eq!(ids, vec!["KNN", "Mean", "Median", "Mode"]);
    }

    #[test]
    fn test_unregistered_algorithm_rejected() {
        let registry = ImputerRegistry::with_defaults();
        let err = registry
            .impute(&incomplete(), &AlgorithmId::new("GAIN"), &ImputerOptions::new())
            .unwrap_err();
        assert!(matches!(err, ImputeBenchError::UnsupportedAlgorithm(ref a) if a == "GAIN"));
    }

    #[test]
    fn test_every_default_imputer_preserves_observed_cells() {
        let registry = ImputerRegistry::with_defaults();
        for id in registry.ids() {
            let data = registry.impute(&incomplete(), &id, &ImputerOptions::new()).unwrap();
            match &data.column("x").unwrap().values {
                ColumnValues::Numeric(v) => {
                    assert_eq!((v[0], v[2], v[3]), (1.0, 5.0, 6.0), "{}", id);
                    assert!(v[1].is_finite());
                }
                _ => panic!("x stays numeric"),
            }
            match &data.column("c").unwrap().values {
                ColumnValues::Categorical(v) => {
                    assert_eq!((&v[0][..], &v[1][..], &v[3][..]), ("u", "v", "v"), "{}", id);
                    assert!(v[2] == "u" || v[2] == "v");
                }
                _ => panic!("c stays categorical"),
            }
        }
    }

    #[test]
    fn test_shape_violation_is_collaborator_error() {
        let mut registry = ImputerRegistry::new();
        registry.register(Arc::new(Shrinking));
        let err = registry
            .impute(&incomplete(), &AlgorithmId::new("Shrinking"), &ImputerOptions::new())
            .unwrap_err();
        assert_eq!(err.kind(), "external-collaborator");
    }

    #[test]
    fn test_unknown_option_rejected() {
        let registry = ImputerRegistry::with_defaults();
        let err = registry
            .impute(
                &incomplete(),
                &AlgorithmId::new("Mean"),
                &ImputerOptions::new().with("k", 3i64),
            )
            .unwrap_err();
        assert!(matches!(err, ImputeBenchError::InvalidParameter { .. }));
    }
}
