//! Imputation quality metrics

pub mod reconstruction;
pub mod structural;

use crate::causal::graph::CausalGraph;
use crate::data::dataset::Dataset;
use crate::data::mask::MissingnessMask;
use crate::error::Result;

pub use self::reconstruction::{MetricConfig, ReconstructionReport, RmseScale};
pub use self::structural::{structural_fidelity, StructuralScore};

/// Stateless scorer carrying the metric configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricEngine {
    config: MetricConfig,
}

impl MetricEngine {
    pub fn new(config: MetricConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MetricConfig {
        &self.config
    }

    pub fn reconstruction_error(
        &self,
        ground_truth: &Dataset,
        imputed: &Dataset,
        mask: &MissingnessMask,
    ) -> Result<ReconstructionReport> {
        reconstruction::reconstruction_error(ground_truth, imputed, mask, &self.config)
    }

    pub fn structural_fidelity(&self, truth: &CausalGraph, learned: &CausalGraph) -> StructuralScore {
        structural_fidelity(truth, learned)
    }
}
