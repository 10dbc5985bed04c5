//! Causal structures: DAG parsing, Gaussian and discrete simulation, structure
//! learning

pub mod discrete;
pub mod graph;
pub mod model;
pub mod structure;

pub use self::discrete::{DiscreteBayesianNetwork, ProbabilityTables, StateRange};
pub use self::graph::CausalGraph;
pub use self::model::{CausalModel, CoefficientRange, LinearGaussianModel};
pub use self::structure::{CommandStructureLearner, StructureLearner};
