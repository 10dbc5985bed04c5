//! Structural causal models used to simulate ground-truth data
//!
//! Gaussian Bayesian networks are the synthetic workloads of the benchmark: each
//! variable is a linear function of its parents plus independent Gaussian
//! noise, sampled in topological order.

use std::collections::HashMap;

use rand::{Rng, RngCore};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::causal::graph::CausalGraph;
use crate::data::dataset::{Column, Dataset};
use crate::error::{ImputeBenchError, Result};

/// Known generative structure that can emit rows
pub trait CausalModel: Send + Sync {
    /// Ground-truth DAG
    fn structure(&self) -> &CausalGraph;

    /// Draws `rows` independent samples, columns in declaration order
    fn simulate(&self, rows: usize, rng: &mut dyn RngCore) -> Result<Dataset>;
}

/// Magnitude range for randomly drawn edge coefficients
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoefficientRange {
    pub min_abs: f64,
    pub max_abs: f64,
}

impl Default for CoefficientRange {
    fn default() -> Self {
        Self {
            min_abs: 0.5,
            max_abs: 2.0,
        }
    }
}

/// Linear-Gaussian structural equation model
#[derive(Debug, Clone)]
pub struct LinearGaussianModel {
    graph: CausalGraph,
    /// Coefficient per (parent, child) edge
    coefficients: HashMap<(String, String), f64>,
    intercepts: HashMap<String, f64>,
    noise_std: HashMap<String, f64>,
}

impl LinearGaussianModel {
    /// Model with explicit coefficients; unspecified edges default to 1,
    /// intercepts to 0 and noise to unit variance
    pub fn new(graph: CausalGraph, coefficients: HashMap<(String, String), f64>) -> Result<Self> {
        for (parent, child) in coefficients.keys() {
            let declared = graph
                .parents(child)
                .map(|ps| ps.iter().any(|p| p == parent))
                .unwrap_or(false);
            if !declared {
                return Err(ImputeBenchError::Format(format!(
                    "coefficient for {} -> {} names an edge outside the structure",
                    parent, child
                )));
            }
        }
        let mut coefficients = coefficients;
        for edge in graph.edges() {
            coefficients.entry(edge).or_insert(1.0);
        }
        let intercepts = graph.nodes().iter().map(|n| (n.clone(), 0.0)).collect();
        let noise_std = graph.nodes().iter().map(|n| (n.clone(), 1.0)).collect();
        Ok(Self {
            graph,
            coefficients,
            intercepts,
            noise_std,
        })
    }

    /// Model with coefficients drawn uniformly from ±`range`
    pub fn with_random_coefficients<R: Rng + ?Sized>(
        graph: CausalGraph,
        range: CoefficientRange,
        rng: &mut R,
    ) -> Result<Self> {
        if !(range.min_abs >= 0.0 && range.min_abs <= range.max_abs) {
            return Err(ImputeBenchError::InvalidParameter {
                name: "coefficient_range".into(),
                reason: format!("[{}, {}] is not a valid magnitude range", range.min_abs, range.max_abs),
            });
        }
        let coefficients = graph
            .edges()
            .into_iter()
            .map(|edge| {
                let magnitude = if range.max_abs > range.min_abs {
                    rng.gen_range(range.min_abs..range.max_abs)
                } else {
                    range.min_abs
                };
                let sign = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
                (edge, sign * magnitude)
            })
            .collect();
        Self::new(graph, coefficients)
    }

    pub fn coefficient(&self, parent: &str, child: &str) -> Option<f64> {
        self.coefficients
            .get(&(parent.to_string(), child.to_string()))
            .copied()
    }

    pub fn set_noise_std(&mut self, node: &str, std: f64) -> Result<()> {
        if !(std.is_finite() && std > 0.0) {
            return Err(ImputeBenchError::InvalidParameter {
                name: "noise_std".into(),
                reason: format!("{} must be positive and finite", std),
            });
        }
        match self.noise_std.get_mut(node) {
            Some(slot) => {
                *slot = std;
                Ok(())
            }
            None => Err(ImputeBenchError::UnknownVariable(node.to_string())),
        }
    }
}

impl CausalModel for LinearGaussianModel {
    fn structure(&self) -> &CausalGraph {
        &self.graph
    }

    fn simulate(&self, rows: usize, rng: &mut dyn RngCore) -> Result<Dataset> {
        let mut values: HashMap<String, Vec<f64>> = HashMap::with_capacity(self.graph.len());
        for node in self.graph.topological_order()? {
            let noise = Normal::new(0.0, self.noise_std[&node])
                .map_err(|e| ImputeBenchError::InvalidParameter {
                    name: "noise_std".into(),
                    reason: e.to_string(),
                })?;
            let intercept = self.intercepts[&node];
            let mut column: Vec<f64> = (0..rows)
                .map(|_| intercept + noise.sample(&mut *rng))
                .collect();
            for parent in self.graph.parents(&node).unwrap_or(&[]) {
                let weight = self.coefficients[&(parent.clone(), node.clone())];
                for (cell, parent_value) in column.iter_mut().zip(&values[parent]) {
                    *cell += weight * parent_value;
                }
            }
            values.insert(node, column);
        }

        let columns = self
            .graph
            .nodes()
            .iter()
            .map(|node| Column::numeric(node.clone(), values.remove(node).unwrap_or_default()))
            .collect();
        Dataset::new(columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn test_simulation_follows_structure() {
        let graph = CausalGraph::parse("[X][Y|X]").unwrap();
        let mut coefficients = HashMap::new();
        coefficients.insert(("X".to_string(), "Y".to_string()), 2.0);
        let model = LinearGaussianModel::new(graph, coefficients).unwrap();

        let mut rng = ChaCha20Rng::seed_from_u64(7);
        let data = model.simulate(20_000, &mut rng).unwrap();
        assert_eq!(data.names(), vec!["X".to_string(), "Y".to_string()]);

        let (x, y) = match (&data.columns()[0].values, &data.columns()[1].values) {
            (
                crate::data::dataset::ColumnValues::Numeric(x),
                crate::data::dataset::ColumnValues::Numeric(y),
            ) => (x.clone(), y.clone()),
            _ => panic!("simulated columns are numeric"),
        };
        let n = x.len() as f64;
        let mean_x = x.iter().sum::<f64>() / n;
        let mean_y = y.iter().sum::<f64>() / n;
        let cov: f64 = x.iter().zip(&y).map(|(a, b)| (a - mean_x) * (b - mean_y)).sum::<f64>() / n;
        let var_x: f64 = x.iter().map(|a| (a - mean_x).powi(2)).sum::<f64>() / n;
        assert_abs_diff_eq!(cov / var_x, 2.0, epsilon = 0.05);
    }

    #[test]
    fn test_random_coefficients_respect_range() {
        let graph = CausalGraph::parse("[A][B|A][C|A:B]").unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(11);
        let model =
            LinearGaussianModel::with_random_coefficients(graph, CoefficientRange::default(), &mut rng)
                .unwrap();
        for (parent, child) in model.structure().edges() {
            let w = model.coefficient(&parent, &child).unwrap().abs();
            assert!((0.5..2.0).contains(&w));
        }
    }

    #[test]
    fn test_same_seed_same_sample() {
        let graph = CausalGraph::parse("[A][B|A]").unwrap();
        let model = LinearGaussianModel::new(graph, HashMap::new()).unwrap();
        let a = model.simulate(10, &mut ChaCha20Rng::seed_from_u64(3)).unwrap();
        let b = model.simulate(10, &mut ChaCha20Rng::seed_from_u64(3)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_coefficient_outside_structure_rejected() {
        let graph = CausalGraph::parse("[A][B]").unwrap();
        let mut coefficients = HashMap::new();
        coefficients.insert(("A".to_string(), "B".to_string()), 1.0);
        assert!(LinearGaussianModel::new(graph, coefficients).is_err());
    }
}
