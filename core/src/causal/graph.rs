//! Causal DAG over named variables
//!
//! Structures travel as bracket model strings, the format used by Bayesian
//! network repositories: every node appears once in brackets, followed by its
//! parents after `|`, separated by `:`.
//!
//! ```text
//! [A][S][T|A][L|S][B|S][E|T:L][X|E][D|B:E]
//! ```

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ImputeBenchError, Result};

/// Directed acyclic graph with parent sets per variable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CausalGraph {
    /// Nodes in declaration order
    nodes: Vec<String>,
    /// Parent list per node, declaration order preserved
    parents: BTreeMap<String, Vec<String>>,
}

impl CausalGraph {
    /// Parses a bracket model string into a validated DAG
    pub fn parse(description: &str) -> Result<Self> {
        let mut rest = description.trim();
        if rest.is_empty() {
            return Err(ImputeBenchError::Format("empty structure description".into()));
        }

        let mut declared = Vec::new();
        while !rest.is_empty() {
            let body_start = rest.strip_prefix('[').ok_or_else(|| {
                ImputeBenchError::Format(format!("expected '[' at \"{}\"", truncate(rest)))
            })?;
            let close = body_start.find(']').ok_or_else(|| {
                ImputeBenchError::Format(format!("unterminated node at \"{}\"", truncate(rest)))
            })?;
            let body = &body_start[..close];
            if body.contains('[') {
                return Err(ImputeBenchError::Format(format!("nested bracket in \"{}\"", body)));
            }

            let (node, parent_list) = match body.split_once('|') {
                Some((node, parents)) => (node.trim(), Some(parents)),
                None => (body.trim(), None),
            };
            if node.is_empty() {
                return Err(ImputeBenchError::Format("node without a name".into()));
            }
            let parents = match parent_list {
                Some(list) => list
                    .split(':')
                    .map(|p| {
                        let p = p.trim();
                        if p.is_empty() {
                            Err(ImputeBenchError::Format(format!("empty parent name for {}", node)))
                        } else {
                            Ok(p.to_string())
                        }
                    })
                    .collect::<Result<Vec<_>>>()?,
                None => Vec::new(),
            };
            declared.push((node.to_string(), parents));
            rest = body_start[close + 1..].trim_start();
        }

        Self::from_parents(declared)
    }

    /// Builds a graph from explicit parent sets, rejecting undeclared parents,
    /// duplicates, self loops and cycles
    pub fn from_parents(declared: Vec<(String, Vec<String>)>) -> Result<Self> {
        let mut nodes = Vec::with_capacity(declared.len());
        let mut parents = BTreeMap::new();
        for (node, node_parents) in declared {
            if parents.contains_key(&node) {
                return Err(ImputeBenchError::Format(format!("node {} declared twice", node)));
            }
            let mut unique = HashSet::new();
            for parent in &node_parents {
                if *parent == node {
                    return Err(ImputeBenchError::Format(format!("self loop on {}", node)));
                }
                if !unique.insert(parent) {
                    return Err(ImputeBenchError::Format(format!(
                        "parent {} listed twice for {}",
                        parent, node
                    )));
                }
            }
            nodes.push(node.clone());
            parents.insert(node, node_parents);
        }
        for (node, node_parents) in &parents {
            if let Some(missing) = node_parents.iter().find(|p| !parents.contains_key(*p)) {
                return Err(ImputeBenchError::Format(format!(
                    "parent {} of {} is not declared",
                    missing, node
                )));
            }
        }

        let graph = Self { nodes, parents };
        graph.topological_order()?;
        Ok(graph)
    }

    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, node: &str) -> bool {
        self.parents.contains_key(node)
    }

    pub fn parents(&self, node: &str) -> Option<&[String]> {
        self.parents.get(node).map(Vec::as_slice)
    }

    /// Directed edges as (parent, child)
    pub fn edges(&self) -> Vec<(String, String)> {
        self.nodes
            .iter()
            .flat_map(|child| {
                self.parents[child]
                    .iter()
                    .map(move |parent| (parent.clone(), child.clone()))
            })
            .collect()
    }

    pub fn edge_set(&self) -> HashSet<(String, String)> {
        self.edges().into_iter().collect()
    }

    /// Kahn ordering; parents always precede children
    pub fn topological_order(&self) -> Result<Vec<String>> {
        let mut in_degree: HashMap<&str, usize> = self
            .nodes
            .iter()
            .map(|n| (n.as_str(), self.parents[n].len()))
            .collect();
        let mut children: HashMap<&str, Vec<&str>> = HashMap::new();
        for node in &self.nodes {
            for parent in &self.parents[node] {
                children.entry(parent.as_str()).or_default().push(node.as_str());
            }
        }

        let mut queue: VecDeque<&str> = self
            .nodes
            .iter()
            .map(String::as_str)
            .filter(|n| in_degree[n] == 0)
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(node) = queue.pop_front() {
            order.push(node.to_string());
            for child in children.get(node).into_iter().flatten() {
                if let Some(degree) = in_degree.get_mut(child) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(child);
                    }
                }
            }
        }

        if order.len() != self.nodes.len() {
            return Err(ImputeBenchError::Format("structure contains a cycle".into()));
        }
        Ok(order)
    }

    /// Canonical model string in declaration order
    pub fn to_model_string(&self) -> String {
        let mut out = String::new();
        for node in &self.nodes {
            let parents = &self.parents[node];
            if parents.is_empty() {
                out.push_str(&format!("[{}]", node));
            } else {
                out.push_str(&format!("[{}|{}]", node, parents.join(":")));
            }
        }
        out
    }
}

impl FromStr for CausalGraph {
    type Err = ImputeBenchError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for CausalGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_model_string())
    }
}

fn truncate(text: &str) -> String {
    text.chars().take(24).collect()
}
