//! Experiment sweep
//!
//! Iterates dataset → sample size → mechanism → error rate → algorithm and
//! runs `load → inject → impute → score` for each combination. A stage
//! failure is logged and recorded as a [`SkippedCombination`]; the sweep itself
//! always completes.
//!
//! Randomness is keyed: the injection for (dataset, mechanism, rate) draws
//! from a generator seeded by the sweep seed and that key alone, so a
//! parallel sweep produces the same table as a sequential one.

use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::RecvTimeoutError;
use log::{debug, info, warn};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use rayon::prelude::*;

use crate::causal::graph::CausalGraph;
use crate::causal::structure::StructureLearner;
use crate::data::dataset::{Dataset, IncompleteDataset};
use crate::data::source::{DatasetProvider, DefaultDatasetProvider, LoadedDataset};
use crate::error::{ImputeBenchError, Result};
use crate::experiment::cache::{CacheKey, IncompleteCache, Injection};
use crate::experiment::config::{AlgorithmRequest, StructureLearnerConfig, SweepConfig};
use crate::experiment::results::{
    ResultRecord, ResultTable, SkippedCombination, Stage, COMPLETE_BASELINE,
};
use crate::imputation::{AlgorithmId, ImputerOptions, ImputerRegistry};
use crate::metrics::MetricEngine;
use crate::missingness::{derive_cause_mapping, inject, MechanismClass};

/// FNV-1a over the key parts, mixed into the sweep seed
pub fn combination_seed(seed: u64, parts: &[&str]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    let mut hash = OFFSET;
    for part in parts {
        for byte in part.bytes().chain(std::iter::once(0xff)) {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(PRIME);
        }
    }
    seed ^ hash
}

/// One (mechanism, rate, algorithm) cell of a dataset/size block
struct Task<'a> {
    mechanism: MechanismClass,
    error_rate: f64,
    request: &'a AlgorithmRequest,
}

/// Result of one combination: a record unless a stage failed, plus skips
struct TaskOutcome {
    record: Option<ResultRecord>,
    skips: Vec<SkippedCombination>,
}

pub struct ExperimentRunner {
    config: SweepConfig,
    provider: Arc<dyn DatasetProvider>,
    registry: ImputerRegistry,
    structure_learner: Option<Arc<dyn StructureLearner>>,
    metrics: MetricEngine,
    cache: IncompleteCache,
}

impl ExperimentRunner {
    /// Validates `config` and registers its external collaborators
    pub fn new(config: SweepConfig) -> Result<Self> {
        config.validate()?;

        let mut registry = ImputerRegistry::with_defaults();
        for external in &config.external_imputers {
            registry.register(external.imputer());
        }
        let structure_learner = config
            .structure_learner
            .as_ref()
            .map(StructureLearnerConfig::learner);

        Ok(Self {
            metrics: MetricEngine::new(config.metrics),
            config,
            provider: Arc::new(DefaultDatasetProvider),
            registry,
            structure_learner,
            cache: IncompleteCache::new(),
        })
    }

    pub fn with_provider(mut self, provider: Arc<dyn DatasetProvider>) -> Self {
        self.provider = provider;
        self
    }

    pub fn with_registry(mut self, registry: ImputerRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_structure_learner(mut self, learner: Arc<dyn StructureLearner>) -> Self {
        self.structure_learner = Some(learner);
        self
    }

    pub fn registry_mut(&mut self) -> &mut ImputerRegistry {
        &mut self.registry
    }

    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    /// Runs every combination and returns the table
    pub fn run(&self) -> ResultTable {
        let mut table = ResultTable::new();
        info!(
            "Sweep {} starting: {} datasets, {} combinations",
            table.run_id(),
            self.config.datasets.len(),
            self.config.combination_count()
        );
        let started = Instant::now();

        for spec in &self.config.datasets {
            let mut rng = ChaCha20Rng::seed_from_u64(combination_seed(
                self.config.seed,
                &["load", spec.name()],
            ));
            let loaded = match self.provider.load(spec, &mut rng) {
                Ok(loaded) => loaded,
                Err(err) => {
                    record_skip(&mut table, SkippedCombination::new(spec.name(), Stage::Load, &err));
                    continue;
                }
            };

            let sizes = if self.config.sample_sizes.is_empty() {
                vec![loaded.data.n_rows()]
            } else {
                self.config.sample_sizes.clone()
            };
            for size in sizes {
                self.run_block(&loaded, size, &mut table);
            }
        }

        info!(
            "Sweep {} finished in {:.1}s: {} records, {} skipped",
            table.run_id(),
            started.elapsed().as_secs_f64(),
            table.len(),
            table.skipped().len()
        );
        table
    }

    /// Every mechanism/rate/algorithm combination at one sample size
    fn run_block(&self, loaded: &LoadedDataset, size: usize, table: &mut ResultTable) {
        let truth = match loaded.data.head(size) {
            Ok(truth) => truth,
            Err(err) => {
                let mut skip = SkippedCombination::new(&loaded.name, Stage::Load, &err);
                skip.sample_size = Some(size);
                record_skip(table, skip);
                return;
            }
        };

        if let (Some(learner), Some(graph)) = (&self.structure_learner, &loaded.graph) {
            match learner.learn(&truth) {
                Ok(learned) => {
                    let score = self.metrics.structural_fidelity(graph, &learned);
                    table.push_record(ResultRecord {
                        dataset: loaded.name.clone(),
                        sample_size: size,
                        mechanism: None,
                        error_rate: None,
                        algorithm: COMPLETE_BASELINE.to_string(),
                        error: None,
                        rmse: None,
                        pfc: None,
                        scored_cells: 0,
                        f1: Some(score.f1),
                        shd: Some(score.shd),
                        impute_seconds: None,
                    });
                }
                Err(err) => {
                    let mut skip = SkippedCombination::new(&loaded.name, Stage::Learn, &err);
                    skip.sample_size = Some(size);
                    skip.algorithm = Some(COMPLETE_BASELINE.to_string());
                    record_skip(table, skip);
                }
            }
        }

        let mut tasks = Vec::new();
        for &mechanism in &self.config.mechanisms {
            for &error_rate in &self.config.error_rates {
                for request in &self.config.algorithms {
                    tasks.push(Task {
                        mechanism,
                        error_rate,
                        request,
                    });
                }
            }
        }

        let outcomes: Vec<TaskOutcome> = if self.config.parallel {
            tasks
                .par_iter()
                .map(|task| self.run_task(loaded, &truth, size, task))
                .collect()
        } else {
            tasks
                .iter()
                .map(|task| self.run_task(loaded, &truth, size, task))
                .collect()
        };

        for outcome in outcomes {
            if let Some(record) = outcome.record {
                table.push_record(record);
            }
            for skip in outcome.skips {
                record_skip(table, skip);
            }
        }
    }

    fn run_task(&self, loaded: &LoadedDataset, truth: &Dataset, size: usize, task: &Task<'_>) -> TaskOutcome {
        let skip = |stage: Stage, err: &ImputeBenchError| {
            let mut skip = SkippedCombination::new(&loaded.name, stage, err);
            skip.sample_size = Some(size);
            skip.mechanism = Some(task.mechanism);
            skip.error_rate = Some(task.error_rate);
            skip.algorithm = Some(task.request.id.to_string());
            skip
        };
        let failed = |stage: Stage, err: ImputeBenchError| TaskOutcome {
            record: None,
            skips: vec![skip(stage, &err)],
        };

        let key = CacheKey::new(&loaded.name, task.mechanism, task.error_rate);
        let injection = match self
            .cache
            .get_or_try_insert_with(key, || self.build_injection(loaded, task.mechanism, task.error_rate))
        {
            Ok(injection) => injection,
            Err(err) => return failed(Stage::Inject, err),
        };
        let incomplete = match injection.incomplete.head(size) {
            Ok(incomplete) => incomplete,
            Err(err) => return failed(Stage::Inject, err),
        };
        let mask = injection.mask.head(size);

        let started = Instant::now();
        let imputed = match self.impute_bounded(&incomplete, &task.request.id, &task.request.options) {
            Ok(imputed) => imputed,
            Err(err) => return failed(Stage::Impute, err),
        };
        let impute_seconds = started.elapsed().as_secs_f64();

        let report = match self.metrics.reconstruction_error(truth, &imputed, &mask) {
            Ok(report) => report,
            Err(err) => return failed(Stage::Score, err),
        };

        let mut skips = Vec::new();
        let mut structure = None;
        if let (Some(learner), Some(graph)) = (&self.structure_learner, &loaded.graph) {
            match learner.learn(&imputed) {
                Ok(learned) => structure = Some(self.metrics.structural_fidelity(graph, &learned)),
                Err(err) => skips.push(skip(Stage::Learn, &err)),
            }
        }

        debug!(
            "{} n={} {} rate={} {}: error {:.4}",
            loaded.name,
            size,
            task.mechanism,
            task.error_rate,
            task.request.id,
            report.summary()
        );
        TaskOutcome {
            record: Some(ResultRecord {
                dataset: loaded.name.clone(),
                sample_size: size,
                mechanism: Some(task.mechanism),
                error_rate: Some(task.error_rate),
                algorithm: task.request.id.to_string(),
                error: Some(report.summary()),
                rmse: report.numeric_rmse,
                pfc: report.categorical_pfc,
                scored_cells: report.scored_cells(),
                f1: structure.map(|s| s.f1),
                shd: structure.map(|s| s.shd),
                impute_seconds: Some(impute_seconds),
            }),
            skips,
        }
    }

    /// Mechanism draw and injection on the full dataset
    fn build_injection(
        &self,
        loaded: &LoadedDataset,
        mechanism: MechanismClass,
        error_rate: f64,
    ) -> Result<Injection> {
        let rate = error_rate.to_string();
        let mut rng = ChaCha20Rng::seed_from_u64(combination_seed(
            self.config.seed,
            &[&loaded.name, mechanism.as_str(), &rate],
        ));
        let structure = loaded.graph.as_ref().map(CausalGraph::to_model_string);
        let mapping = derive_cause_mapping(
            &loaded.data.names(),
            mechanism,
            self.config.partially_observed_ratio,
            structure.as_deref(),
            &mut rng,
        )?;
        let (incomplete, mask) = inject(&loaded.data, &mapping, error_rate, &mut rng)?;
        info!(
            "Generated {} {} rate={}: {} of {} cells absent",
            loaded.name,
            mechanism,
            error_rate,
            mask.count(),
            mask.n_rows() * mask.n_cols()
        );

        Ok(Injection {
            mapping,
            incomplete,
            mask,
        })
    }

    /// Imputes on a helper thread when a timeout is configured
    fn impute_bounded(
        &self,
        incomplete: &IncompleteDataset,
        id: &AlgorithmId,
        options: &ImputerOptions,
    ) -> Result<Dataset> {
        match self.config.imputation_timeout() {
            None => self.registry.impute(incomplete, id, options),
            Some(limit) => impute_with_timeout(&self.registry, incomplete, id, options, limit),
        }
    }
}

/// Runs one imputation with a deadline
///
/// An expired imputation keeps running on its detached thread; its result is
/// discarded.
pub fn impute_with_timeout(
    registry: &ImputerRegistry,
    incomplete: &IncompleteDataset,
    id: &AlgorithmId,
    options: &ImputerOptions,
    limit: Duration,
) -> Result<Dataset> {
    let (sender, receiver) = crossbeam_channel::bounded(1);
    let registry = registry.clone();
    let incomplete = incomplete.clone();
    let worker_id = id.clone();
    let options = options.clone();

    thread::Builder::new()
        .name(format!("imputebench-{}", id))
        .spawn(move || {
            let _ = sender.send(registry.impute(&incomplete, &worker_id, &options));
        })?;

    match receiver.recv_timeout(limit) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => Err(ImputeBenchError::Timeout {
            algorithm: id.to_string(),
            limit,
        }),
        Err(RecvTimeoutError::Disconnected) => Err(ImputeBenchError::external(
            id.as_str(),
            "imputation thread ended without a result",
        )),
    }
}

fn record_skip(table: &mut ResultTable, skip: SkippedCombination) {
    warn!("Skipping {} ({})", skip, skip.kind);
    table.push_skip(skip);
}

/// Convenience entry point: load a JSON config, run it, write the table
pub fn run_config_file(config_path: &Path, output: &Path) -> Result<ResultTable> {
    let config = SweepConfig::from_json_file(config_path)?;
    let table = ExperimentRunner::new(config)?.run();
    table.write_file(output)?;
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::source::DatasetSpec;
    use crate::imputation::encoding::EncodedMatrix;
    use crate::imputation::{AlgorithmFamily, AlgorithmParameter, Imputer};
    use nalgebra::DMatrix;

    fn simulated(name: &str, rows: usize) -> DatasetSpec {
        DatasetSpec::Simulated {
            name: name.into(),
            structure: "[A][B|A][C|A:B][D|C]".into(),
            rows,
            coefficients: Default::default(),
            seed: Some(3),
            shuffle_columns: false,
        }
    }

    struct Sleepy;

    impl Imputer for Sleepy {
        fn id(&self) -> AlgorithmId {
            AlgorithmId::new("Sleepy")
        }

        fn family(&self) -> AlgorithmFamily {
            AlgorithmFamily::GenerativeNetwork
        }

        fn parameters(&self) -> Vec<AlgorithmParameter> {
            Vec::new()
        }

        fn fit_transform(&self, data: &EncodedMatrix, _: &ImputerOptions) -> Result<DMatrix<f64>> {
            thread::sleep(Duration::from_secs(3));
            Ok(data.values().map(|x| if x.is_nan() { 0.0 } else { x }))
        }
    }

    #[test]
    fn test_combination_seed_depends_on_every_part() {
        let a = combination_seed(1, &["d", "MAR", "0.3"]);
        assert_ne!(a, combination_seed(1, &["d", "MAR", "0.5"]));
        assert_ne!(a, combination_seed(2, &["d", "MAR", "0.3"]));
        assert_ne!(combination_seed(0, &["ab", "c"]), combination_seed(0, &["a", "bc"]));
        assert_eq!(a, combination_seed(1, &["d", "MAR", "0.3"]));
    }

    #[test]
    fn test_sweep_records_every_combination() {
        let config = SweepConfig {
            datasets: vec![simulated("chain", 300)],
            sample_sizes: vec![100, 300],
            error_rates: vec![0.2],
            ..SweepConfig::default()
        };
        let table = ExperimentRunner::new(config).unwrap().run();
        assert_eq!(table.len(), 2 * 3 * 2);
        assert!(table.skipped().is_empty());
        assert!(table
            .records()
            .iter()
            .all(|r| r.rmse.map_or(false, |e| e.is_finite() && e > 0.0)));
    }

    #[test]
    fn test_parallel_and_sequential_sweeps_agree() {
        let base = SweepConfig {
            datasets: vec![simulated("chain", 200)],
            error_rates: vec![0.3, 0.5],
            seed: 17,
            ..SweepConfig::default()
        };
        let sequential = ExperimentRunner::new(base.clone()).unwrap().run();
        let parallel = ExperimentRunner::new(SweepConfig {
            parallel: true,
            ..base
        })
        .unwrap()
        .run();
        let errors = |t: &ResultTable| t.records().iter().map(|r| r.error).collect::<Vec<_>>();
        assert_eq!(errors(&sequential), errors(&parallel));
    }

    #[test]
    fn test_oversized_sample_is_skipped() {
        let config = SweepConfig {
            datasets: vec![simulated("small", 50)],
            sample_sizes: vec![50, 80],
            mechanisms: vec![MechanismClass::Mcar],
            error_rates: vec![0.3],
            ..SweepConfig::default()
        };
        let table = ExperimentRunner::new(config).unwrap().run();
        assert_eq!(table.len(), 2);
        assert_eq!(table.skipped().len(), 1);
        assert_eq!(table.skipped()[0].stage, Stage::Load);
        assert_eq!(table.skipped()[0].sample_size, Some(80));
    }

    #[test]
    fn test_unregistered_algorithm_is_skipped_not_fatal() {
        let config = SweepConfig {
            datasets: vec![simulated("chain", 100)],
            mechanisms: vec![MechanismClass::Mcar],
            error_rates: vec![0.3],
            algorithms: vec![AlgorithmRequest::new("Mean"), AlgorithmRequest::new("softImpute")],
            ..SweepConfig::default()
        };
        let table = ExperimentRunner::new(config).unwrap().run();
        assert_eq!(table.len(), 1);
        assert_eq!(table.skipped()[0].kind, "unsupported-algorithm");
        assert_eq!(table.skipped()[0].stage, Stage::Impute);
    }

    #[test]
    fn test_timeout_becomes_skip() {
        let config = SweepConfig {
            datasets: vec![simulated("chain", 60)],
            mechanisms: vec![MechanismClass::Mcar],
            error_rates: vec![0.3],
            algorithms: vec![AlgorithmRequest::new("Mean"), AlgorithmRequest::new("Sleepy")],
            imputation_timeout_secs: Some(0.25),
            ..SweepConfig::default()
        };
        let mut runner = ExperimentRunner::new(config).unwrap();
        runner.registry_mut().register(Arc::new(Sleepy));
        let table = runner.run();
        assert_eq!(table.len(), 1);
        assert_eq!(table.skipped()[0].kind, "timeout");
    }
}
