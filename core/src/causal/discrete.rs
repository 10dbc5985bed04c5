//! Discrete Bayesian networks
//!
//! Every variable takes one of a finite set of states, drawn from a
//! conditional probability table (CPT) row picked by its parents' states.
//! These are the categorical synthetic workloads (asia, alarm, insurance and
//! the like), scored by the mismatch rate rather than RMSE.

use std::collections::BTreeMap;

use rand::distributions::WeightedIndex;
use rand::{Rng, RngCore};
use rand_distr::{Distribution, Gamma};
use serde::{Deserialize, Serialize};

use crate::causal::graph::CausalGraph;
use crate::causal::model::CausalModel;
use crate::data::dataset::{Column, Dataset};
use crate::error::{ImputeBenchError, Result};

const PROBABILITY_TOLERANCE: f64 = 1e-6;

/// Bounds on the number of states of a randomly generated variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateRange {
    pub min: usize,
    pub max: usize,
}

impl Default for StateRange {
    fn default() -> Self {
        Self { min: 2, max: 4 }
    }
}

/// State labels and CPTs keyed by variable
///
/// `cpts[v][j]` is the distribution over `states[v]` under parent
/// configuration `j`. Configurations count in mixed radix over the parents in
/// declaration order, the last parent varying fastest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProbabilityTables {
    pub states: BTreeMap<String, Vec<String>>,
    pub cpts: BTreeMap<String, Vec<Vec<f64>>>,
}

fn invalid(name: &str, reason: String) -> ImputeBenchError {
    ImputeBenchError::InvalidParameter {
        name: name.to_string(),
        reason,
    }
}

/// Bayesian network over categorical variables
#[derive(Debug, Clone)]
pub struct DiscreteBayesianNetwork {
    graph: CausalGraph,
    tables: ProbabilityTables,
    samplers: BTreeMap<String, Vec<WeightedIndex<f64>>>,
}

impl DiscreteBayesianNetwork {
    /// Checks every table against the graph: one row per parent
    /// configuration, one probability per state, rows summing to one
    pub fn new(graph: CausalGraph, tables: ProbabilityTables) -> Result<Self> {
        if let Some(extra) = tables.states.keys().find(|v| !graph.contains(v)) {
            return Err(ImputeBenchError::UnknownVariable(extra.clone()));
        }

        let mut samplers = BTreeMap::new();
        for node in graph.nodes() {
            let states = tables
                .states
                .get(node)
                .filter(|s| !s.is_empty())
                .ok_or_else(|| invalid("states", format!("{} has no states", node)))?;
            let mut configurations = 1usize;
            for parent in graph.parents(node).unwrap_or(&[]) {
                configurations *= tables.states.get(parent).map_or(0, Vec::len);
            }
            let cpt = tables
                .cpts
                .get(node)
                .ok_or_else(|| invalid("cpts", format!("{} has no table", node)))?;
            if cpt.len() != configurations {
                return Err(invalid(
                    "cpts",
                    format!("{} has {} rows, expected {}", node, cpt.len(), configurations),
                ));
            }

            let mut rows = Vec::with_capacity(cpt.len());
            for (j, row) in cpt.iter().enumerate() {
                if row.len() != states.len() {
                    return Err(invalid(
                        "cpts",
                        format!("{} row {} has {} entries for {} states", node, j, row.len(), states.len()),
                    ));
                }
                let total: f64 = row.iter().sum();
                if row.iter().any(|p| !(p.is_finite() && *p >= 0.0))
                    || (total - 1.0).abs() > PROBABILITY_TOLERANCE
                {
                    return Err(invalid(
                        "cpts",
                        format!("{} row {} is not a probability distribution", node, j),
                    ));
                }
                rows.push(
                    WeightedIndex::new(row)
                        .map_err(|e| invalid("cpts", format!("{} row {}: {}", node, j, e)))?,
                );
            }
            samplers.insert(node.clone(), rows);
        }

        Ok(Self {
            graph,
            tables,
            samplers,
        })
    }

    /// Network with state counts drawn from `range` and CPT rows drawn from a
    /// symmetric Dirichlet with the given concentration
    pub fn with_random_tables<R: Rng + ?Sized>(
        graph: CausalGraph,
        range: StateRange,
        concentration: f64,
        rng: &mut R,
    ) -> Result<Self> {
        if range.min == 0 || range.min > range.max {
            return Err(invalid(
                "states",
                format!("[{}, {}] is not a valid state range", range.min, range.max),
            ));
        }
        let gamma = Gamma::new(concentration, 1.0)
            .map_err(|e| invalid("concentration", format!("{}: {}", concentration, e)))?;

        let mut tables = ProbabilityTables::default();
        for node in graph.nodes() {
            let count = rng.gen_range(range.min..=range.max);
            let labels = (0..count).map(|i| format!("s{}", i)).collect();
            tables.states.insert(node.clone(), labels);
        }
        for node in graph.nodes() {
            let count = tables.states[node].len();
            let configurations: usize = graph
                .parents(node)
                .unwrap_or(&[])
                .iter()
                .map(|p| tables.states[p].len())
                .product();
            let mut cpt = Vec::with_capacity(configurations);
            for _ in 0..configurations {
                let draws: Vec<f64> = (0..count).map(|_| gamma.sample(&mut *rng)).collect();
                let total: f64 = draws.iter().sum();
                let row = if total > 0.0 {
                    draws.iter().map(|d| d / total).collect()
                } else {
                    vec![1.0 / count as f64; count]
                };
                cpt.push(row);
            }
            tables.cpts.insert(node.clone(), cpt);
        }
        Self::new(graph, tables)
    }

    pub fn tables(&self) -> &ProbabilityTables {
        &self.tables
    }

    pub fn states(&self, node: &str) -> Option<&[String]> {
        self.tables.states.get(node).map(Vec::as_slice)
    }
}

impl CausalModel for DiscreteBayesianNetwork {
    fn structure(&self) -> &CausalGraph {
        &self.graph
    }

    fn simulate(&self, rows: usize, rng: &mut dyn RngCore) -> Result<Dataset> {
        let mut drawn: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for node in self.graph.topological_order()? {
            let parents = self.graph.parents(&node).unwrap_or(&[]);
            let samplers = &self.samplers[&node];
            let mut column = Vec::with_capacity(rows);
            for row in 0..rows {
                let mut configuration = 0;
                for parent in parents {
                    configuration =
                        configuration * self.tables.states[parent].len() + drawn[parent][row];
                }
                column.push(samplers[configuration].sample(&mut *rng));
            }
            drawn.insert(node, column);
        }

        let columns = self
            .graph
            .nodes()
            .iter()
            .map(|node| {
                let states = &self.tables.states[node];
                let labels: Vec<String> = drawn
                    .remove(node)
                    .unwrap_or_default()
                    .into_iter()
                    .map(|i| states[i].clone())
                    .collect();
                Column::categorical(node.clone(), labels)
            })
            .collect();
        Dataset::new(columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::ColumnValues;
    use approx::assert_abs_diff_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn smoker_tables() -> ProbabilityTables {
        let mut tables = ProbabilityTables::default();
        tables.states.insert("smoke".into(), vec!["yes".into(), "no".into()]);
        tables.states.insert("lung".into(), vec!["yes".into(), "no".into()]);
        tables.cpts.insert("smoke".into(), vec![vec![0.3, 0.7]]);
        tables
            .cpts
            .insert("lung".into(), vec![vec![0.9, 0.1], vec![0.2, 0.8]]);
        tables
    }

    fn labels(data: &Dataset, col: usize) -> Vec<String> {
        match &data.columns()[col].values {
            ColumnValues::Categorical(v) => v.clone(),
            ColumnValues::Numeric(_) => panic!("discrete columns are categorical"),
        }
    }

    #[test]
    fn test_sample_frequencies_follow_tables() {
        let graph = CausalGraph::parse("[smoke][lung|smoke]").unwrap();
        let network = DiscreteBayesianNetwork::new(graph, smoker_tables()).unwrap();
        let data = network
            .simulate(20_000, &mut ChaCha20Rng::seed_from_u64(4))
            .unwrap();
        assert!(data.is_categorical());

        let smoke = labels(&data, 0);
        let lung = labels(&data, 1);
        let smokers = smoke.iter().filter(|s| *s == "yes").count();
        assert_abs_diff_eq!(smokers as f64 / 20_000.0, 0.3, epsilon = 0.02);

        let sick_smokers = smoke
            .iter()
            .zip(&lung)
            .filter(|(s, l)| *s == "yes" && *l == "yes")
            .count();
        assert_abs_diff_eq!(sick_smokers as f64 / smokers as f64, 0.9, epsilon = 0.03);
    }

    #[test]
    fn test_random_tables_are_distributions() {
        let graph = CausalGraph::parse("[A][B][C|A:B][D|C]").unwrap();
        let range = StateRange { min: 2, max: 3 };
        let network =
            DiscreteBayesianNetwork::with_random_tables(graph, range, 1.0, &mut ChaCha20Rng::seed_from_u64(8))
                .unwrap();
        let tables = network.tables();
        for (node, states) in &tables.states {
            assert!((2..=3).contains(&states.len()), "{}", node);
        }
        let expected_rows = tables.states["A"].len() * tables.states["B"].len();
        assert_eq!(tables.cpts["C"].len(), expected_rows);
        for row in tables.cpts.values().flatten() {
            assert_abs_diff_eq!(row.iter().sum::<f64>(), 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_wrong_row_count_rejected() {
        let graph = CausalGraph::parse("[smoke][lung|smoke]").unwrap();
        let mut tables = smoker_tables();
        tables.cpts.insert("lung".into(), vec![vec![0.5, 0.5]]);
        let err = DiscreteBayesianNetwork::new(graph, tables).unwrap_err();
        assert_eq!(err.kind(), "invalid-parameter");
    }

    #[test]
    fn test_row_not_summing_to_one_rejected() {
        let graph = CausalGraph::parse("[smoke][lung|smoke]").unwrap();
        let mut tables = smoker_tables();
        tables.cpts.insert("smoke".into(), vec![vec![0.3, 0.3]]);
        assert!(DiscreteBayesianNetwork::new(graph, tables).is_err());
    }

    #[test]
    fn test_states_outside_graph_rejected() {
        let graph = CausalGraph::parse("[smoke]").unwrap();
        let err = DiscreteBayesianNetwork::new(graph, smoker_tables()).unwrap_err();
        assert!(matches!(err, ImputeBenchError::UnknownVariable(ref v) if v == "lung"));
    }

    #[test]
    fn test_tables_read_from_json() {
        let json = r#"{
            "states": {"smoke": ["yes", "no"], "lung": ["yes", "no"]},
            "cpts": {"smoke": [[0.3, 0.7]], "lung": [[0.9, 0.1], [0.2, 0.8]]}
        }"#;
        let tables: ProbabilityTables = serde_json::from_str(json).unwrap();
        assert_eq!(tables, smoker_tables());
    }
}
