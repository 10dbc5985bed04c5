//! Structure-learning collaborators
//!
//! Learning a DAG from data (GES, hill climbing, PC) is delegated. The harness
//! only needs a learned structure to score against the ground truth.

use log::debug;

use crate::bridge::{scratch_file, CommandSpec};
use crate::causal::graph::CausalGraph;
use crate::data::csv_io::write_dataset;
use crate::data::dataset::Dataset;
use crate::error::{ImputeBenchError, Result};

/// Learns a causal structure from complete data
pub trait StructureLearner: Send + Sync {
    fn name(&self) -> &str;

    fn learn(&self, dataset: &Dataset) -> Result<CausalGraph>;
}

/// Runs an external learner that reads `{input}` and prints a model string
#[derive(Debug, Clone)]
pub struct CommandStructureLearner {
    name: String,
    command: CommandSpec,
}

impl CommandStructureLearner {
    pub fn new(name: impl Into<String>, command: CommandSpec) -> Self {
        Self {
            name: name.into(),
            command,
        }
    }
}

impl StructureLearner for CommandStructureLearner {
    fn name(&self) -> &str {
        &self.name
    }

    fn learn(&self, dataset: &Dataset) -> Result<CausalGraph> {
        let input = scratch_file()?;
        write_dataset(std::fs::File::create(&input)?, dataset)?;
        let stdout = self.command.run(&[("input", &*input)], &[])?;

        // Learners may log before the result; the structure is the last line.
        let line = stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .last()
            .ok_or_else(|| ImputeBenchError::external(&self.name, "printed no structure"))?;
        debug!("{} learned {}", self.name, line);
        CausalGraph::parse(line)
            .map_err(|e| ImputeBenchError::external(&self.name, format!("unparsable output: {}", e)))
    }
}
