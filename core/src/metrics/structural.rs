//! Structural fidelity of a learned causal graph

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::causal::graph::CausalGraph;

/// Directed-edge agreement between a learned and a true structure
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StructuralScore {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// Structural Hamming distance: missing, extra and reversed edges
    pub shd: usize,
    pub true_positives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
}

/// Scores `learned` against `truth`
///
/// A reversed edge counts as one false positive and one false negative for
/// precision and recall, but only once in the Hamming distance.
pub fn structural_fidelity(truth: &CausalGraph, learned: &CausalGraph) -> StructuralScore {
    let true_edges = truth.edge_set();
    let learned_edges = learned.edge_set();

    let tp = true_edges.intersection(&learned_edges).count();
    let fp = learned_edges.len() - tp;
    let fn_ = true_edges.len() - tp;

    let ratio = |num: usize, den: usize, empty: f64| if den == 0 { empty } else { num as f64 / den as f64 };
    // With nothing to find, nothing found is perfect.
    let precision = ratio(tp, tp + fp, if fn_ == 0 { 1.0 } else { 0.0 });
    let recall = ratio(tp, tp + fn_, if fp == 0 { 1.0 } else { 0.0 });
    let f1 = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };

    StructuralScore {
        precision,
        recall,
        f1,
        shd: hamming_distance(&true_edges, &learned_edges),
        true_positives: tp,
        false_positives: fp,
        false_negatives: fn_,
    }
}

fn hamming_distance(
    true_edges: &HashSet<(String, String)>,
    learned_edges: &HashSet<(String, String)>,
) -> usize {
    let unordered = |(a, b): &(String, String)| {
        if a <= b {
            (a.clone(), b.clone())
        } else {
            (b.clone(), a.clone())
        }
    };
    let skeleton: BTreeSet<(String, String)> = true_edges
        .iter()
        .chain(learned_edges.iter())
        .map(unordered)
        .collect();

    skeleton
        .iter()
        .filter(|(a, b)| {
            let forward = (a.clone(), b.clone());
            let backward = (b.clone(), a.clone());
            let same = |edge: &(String, String)| true_edges.contains(edge) == learned_edges.contains(edge);
            !(same(&forward) && same(&backward))
        })
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn graph(s: &str) -> CausalGraph {
        CausalGraph::parse(s).unwrap()
    }

    #[test]
    fn test_identical_graphs_score_perfectly() {
        let g = graph("[A][B|A][C|A:B]");
        let score = structural_fidelity(&g, &g);
        assert_abs_diff_eq!(score.f1, 1.0);
        assert_eq!(score.shd, 0);
    }

    #[test]
    fn test_empty_graphs_score_perfectly() {
        let score = structural_fidelity(&graph("[A][B]"), &graph("[A][B]"));
        assert_abs_diff_eq!(score.f1, 1.0);
        assert_eq!(score.shd, 0);
    }

    #[test]
    fn test_reversed_edge() {
        let score = structural_fidelity(&graph("[A][B|A][C|B]"), &graph("[B][A|B][C|B]"));
        assert_eq!(score.true_positives, 1);
        assert_eq!(score.false_positives, 1);
        assert_eq!(score.false_negatives, 1);
        assert_abs_diff_eq!(score.f1, 0.5);
        assert_eq!(score.shd, 1);
    }

    #[test]
    fn test_missing_and_extra_edges() {
        let score = structural_fidelity(&graph("[A][B|A][C]"), &graph("[A][B][C|A]"));
        assert_abs_diff_eq!(score.precision, 0.0);
        assert_abs_diff_eq!(score.recall, 0.0);
        assert_abs_diff_eq!(score.f1, 0.0);
        assert_eq!(score.shd, 2);
    }

    #[test]
    fn test_empty_learned_graph() {
        let score = structural_fidelity(&graph("[A][B|A]"), &graph("[A][B]"));
        assert_abs_diff_eq!(score.recall, 0.0);
        assert_abs_diff_eq!(score.f1, 0.0);
        assert_eq!(score.shd, 1);
    }
}
