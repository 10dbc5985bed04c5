//! Benchmark sweeps: configuration, caching, execution and results

pub mod cache;
pub mod config;
pub mod results;
pub mod runner;

pub use self::cache::{CacheKey, IncompleteCache, Injection};
pub use self::config::{
    AlgorithmRequest, ExternalImputerConfig, StructureLearnerConfig, SweepConfig,
};
pub use self::results::{
    ResultRecord, ResultTable, SkippedCombination, Stage, COMPLETE_BASELINE,
};
pub use self::runner::{combination_seed, impute_with_timeout, run_config_file, ExperimentRunner};
