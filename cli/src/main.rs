//! imputebench command line
//!
//! `run` executes a sweep from a JSON config, `single` evaluates one
//! mechanism/rate/algorithm on one dataset (scoring a re-learned structure
//! when the dataset has a true graph), `inject` only writes the incomplete
//! dataset.

use std::path::PathBuf;
use std::process;

use clap::{Args, Parser, Subcommand};
use log::info;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

use imputebench_core::data::csv_io::{write_incomplete_file, CsvOptions};
use imputebench_core::data::source::{DatasetProvider, DatasetSpec, DefaultDatasetProvider, LoadedDataset};
use imputebench_core::experiment::{
    ExperimentRunner, ExternalImputerConfig, StructureLearnerConfig, SweepConfig,
};
use imputebench_core::imputation::{AlgorithmId, ImputerOptions, ImputerRegistry};
use imputebench_core::metrics::{MetricEngine, ReconstructionReport, StructuralScore};
use imputebench_core::missingness::{derive_cause_mapping, inject, CauseMapping, MechanismClass};
use imputebench_core::{Dataset, ImputeBenchError, IncompleteDataset, MissingnessMask, Result};

#[derive(Parser, Debug)]
#[command(name = "imputebench", version, about = "Benchmark imputation under MCAR, MAR and MNAR missingness")]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a sweep described by a JSON config
    Run {
        #[arg(short, long)]
        config: PathBuf,
        /// Result table; `.json` writes JSON, anything else CSV
        #[arg(short, long, default_value = "results.csv")]
        output: PathBuf,
        /// Override the config's parallel flag
        #[arg(long)]
        parallel: bool,
    },
    /// Evaluate one algorithm on one incomplete dataset
    Single {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        missingness: MissingnessArgs,
        #[arg(short, long, default_value = "KNN")]
        algorithm: String,
        /// Options as a JSON object, e.g. '{"k": 3}'
        #[arg(long)]
        options: Option<String>,
        #[command(flatten)]
        collaborators: CollaboratorArgs,
        /// Also write the imputed dataset
        #[arg(long)]
        imputed_output: Option<PathBuf>,
    },
    /// Write an incomplete copy of a dataset
    Inject {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        missingness: MissingnessArgs,
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[derive(Args, Debug)]
struct SourceArgs {
    /// Complete CSV dataset
    #[arg(long, conflicts_with = "structure")]
    data: Option<PathBuf>,
    /// Read every CSV column as categorical
    #[arg(long)]
    categorical: bool,
    /// Model string of a network to sample from, e.g. "[A][B|A]"
    #[arg(long)]
    structure: Option<String>,
    /// Sample the structure as a discrete network with random CPTs
    #[arg(long, requires = "structure")]
    discrete: bool,
    /// Rows to sample from the structure
    #[arg(long, default_value_t = 1000)]
    rows: usize,
    /// Keep only the first N rows
    #[arg(long)]
    size: Option<usize>,
}

#[derive(Args, Debug)]
struct MissingnessArgs {
    #[arg(short, long, default_value = "MAR")]
    missing_type: String,
    #[arg(short, long, default_value_t = 0.3)]
    error_rate: f64,
    /// Fraction of variables made partially observed
    #[arg(long, default_value_t = 0.5)]
    ratio: f64,
    #[arg(long, default_value_t = 0)]
    seed: u64,
}

#[derive(Args, Debug, Default)]
struct CollaboratorArgs {
    /// External imputer as JSON, e.g.
    /// '{"id": "MF", "family": "EnsembleBased", "command": {"program": "Rscript", "args": ["mf.R", "{input}", "{output}"]}}'
    #[arg(long = "external")]
    externals: Vec<String>,
    /// Structure learner as JSON: {"name": ..., "command": {...}}
    #[arg(long)]
    structure_learner: Option<String>,
}

impl SourceArgs {
    fn spec(&self) -> Result<DatasetSpec> {
        match (&self.data, &self.structure) {
            (Some(path), _) => Ok(DatasetSpec::File {
                name: path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "data".into()),
                path: path.clone(),
                csv: CsvOptions {
                    force_categorical: self.categorical,
                },
                structure: None,
            }),
            (None, Some(structure)) if self.discrete => Ok(DatasetSpec::Discrete {
                name: "discrete".into(),
                structure: structure.clone(),
                rows: self.rows,
                tables: None,
                states: Default::default(),
                concentration: 1.0,
                seed: None,
                shuffle_columns: false,
            }),
            (None, Some(structure)) => Ok(DatasetSpec::Simulated {
                name: "simulated".into(),
                structure: structure.clone(),
                rows: self.rows,
                coefficients: Default::default(),
                seed: None,
                shuffle_columns: false,
            }),
            (None, None) => Err(ImputeBenchError::InvalidParameter {
                name: "data".into(),
                reason: "either --data or --structure is required".into(),
            }),
        }
    }

    fn load(&self, rng: &mut ChaCha20Rng) -> Result<LoadedDataset> {
        let mut loaded = DefaultDatasetProvider.load(&self.spec()?, rng)?;
        if let Some(size) = self.size {
            loaded.data = loaded.data.head(size)?;
        }
        Ok(loaded)
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

/// Loads the dataset and suppresses cells as the arguments describe
fn prepare(
    source: &SourceArgs,
    missingness: &MissingnessArgs,
) -> Result<(LoadedDataset, CauseMapping, IncompleteDataset, MissingnessMask)> {
    let mechanism: MechanismClass = missingness.missing_type.parse()?;
    let mut rng = ChaCha20Rng::seed_from_u64(missingness.seed);
    let loaded = source.load(&mut rng)?;
    let structure = loaded.graph.as_ref().map(|g| g.to_model_string());
    let mapping = derive_cause_mapping(
        &loaded.data.names(),
        mechanism,
        missingness.ratio,
        structure.as_deref(),
        &mut rng,
    )?;
    let (incomplete, mask) = inject(&loaded.data, &mapping, missingness.error_rate, &mut rng)?;
    info!(
        "{} {} rate={}: {} of {} cells absent",
        loaded.name,
        mechanism,
        missingness.error_rate,
        mask.count(),
        mask.n_rows() * mask.n_cols()
    );
    Ok((loaded, mapping, incomplete, mask))
}

fn run_sweep(config: PathBuf, output: PathBuf, parallel: bool) -> Result<()> {
    let mut config = SweepConfig::from_json_file(&config)?;
    config.parallel |= parallel;
    let table = ExperimentRunner::new(config)?.run();
    table.write_file(&output)?;
    println!(
        "{} records, {} skipped -> {}",
        table.len(),
        table.skipped().len(),
        output.display()
    );
    Ok(())
}

/// Everything `single` reports
struct SingleOutcome {
    loaded: LoadedDataset,
    mapping: CauseMapping,
    imputed: Dataset,
    report: ReconstructionReport,
    structure: Option<StructuralScore>,
}

fn evaluate_single(
    source: &SourceArgs,
    missingness: &MissingnessArgs,
    algorithm: &str,
    options: &ImputerOptions,
    collaborators: &CollaboratorArgs,
) -> Result<SingleOutcome> {
    let mut registry = ImputerRegistry::with_defaults();
    for text in &collaborators.externals {
        let external: ExternalImputerConfig = serde_json::from_str(text)?;
        registry.register(external.imputer());
    }
    let learner = match &collaborators.structure_learner {
        Some(text) => Some(serde_json::from_str::<StructureLearnerConfig>(text)?.learner()),
        None => None,
    };

    let (loaded, mapping, incomplete, mask) = prepare(source, missingness)?;
    let imputed = registry.impute(&incomplete, &AlgorithmId::new(algorithm), options)?;
    let metrics = MetricEngine::default();
    let report = metrics.reconstruction_error(&loaded.data, &imputed, &mask)?;
    let structure = match (&learner, &loaded.graph) {
        (Some(learner), Some(graph)) => {
            Some(metrics.structural_fidelity(graph, &learner.learn(&imputed)?))
        }
        _ => None,
    };
    Ok(SingleOutcome {
        loaded,
        mapping,
        imputed,
        report,
        structure,
    })
}

fn run_single(
    source: SourceArgs,
    missingness: MissingnessArgs,
    algorithm: String,
    options: Option<String>,
    collaborators: CollaboratorArgs,
    imputed_output: Option<PathBuf>,
) -> Result<()> {
    let options: ImputerOptions = match options {
        Some(text) => serde_json::from_str(&text)?,
        None => ImputerOptions::new(),
    };
    let outcome = evaluate_single(&source, &missingness, &algorithm, &options, &collaborators)?;
    for (variable, causes) in outcome.mapping.iter() {
        println!("{} <- {:?}", variable, causes);
    }
    if let Some(rmse) = outcome.report.numeric_rmse {
        println!("RMSE: {}", rmse);
    }
    if let Some(pfc) = outcome.report.categorical_pfc {
        println!("PFC: {}", pfc);
    }
    match (&outcome.structure, &outcome.loaded.graph) {
        (Some(score), _) => println!("F1: {} SHD: {}", score.f1, score.shd),
        (None, Some(_)) if collaborators.structure_learner.is_none() => {
            info!("No structure learner given; structural fidelity not scored")
        }
        _ => {}
    }

    if let Some(path) = imputed_output {
        write_incomplete_file(&path, &IncompleteDataset::from_complete(&outcome.imputed))?;
    }
    Ok(())
}

fn run_inject(source: SourceArgs, missingness: MissingnessArgs, output: PathBuf) -> Result<()> {
    let (_, mapping, incomplete, _) = prepare(&source, &missingness)?;
    write_incomplete_file(&output, &incomplete)?;
    println!("{}", serde_json::to_string(&mapping)?);
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Run {
            config,
            output,
            parallel,
        } => run_sweep(config, output, parallel),
        Commands::Single {
            source,
            missingness,
            algorithm,
            options,
            collaborators,
            imputed_output,
        } => run_single(source, missingness, algorithm, options, collaborators, imputed_output),
        Commands::Inject {
            source,
            missingness,
            output,
        } => run_inject(source, missingness, output),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
