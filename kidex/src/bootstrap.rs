use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use clap::Parser;
use kidex_domain::{CycleChainEnumerator, EnumerationLimits, GraphModel};
use kidex_optimizer::{AllocationConfig, HighsOracle, SequencerConfig, SolverOracle, allocate};
use kidex_parser::parse_instance;
use kidex_presentation::{CatalogPresenter, ReportContext, ReportPresenter};
use tracing_subscriber::EnvFilter;

/// Selects a lexicographically optimal set of kidney exchange cycles and
/// chains for an instance file.
#[derive(Debug, Parser)]
#[command(name = "kidex", version)]
pub struct Cli {
    /// Instance file: three count headers, vertex lines, then arc lines
    instance: PathBuf,

    /// Write the report here instead of stdout
    output: Option<PathBuf>,

    /// Longest cycle, in pairs
    #[arg(long, env = "KIDEX_MAX_CYCLE_LENGTH", default_value_t = 3)]
    max_cycle_length: usize,

    /// Longest chain, in vertices including its non-directed donor
    #[arg(long, env = "KIDEX_MAX_CHAIN_LENGTH", default_value_t = 4)]
    max_chain_length: usize,

    /// Wall-clock budget for the optimisation
    #[arg(long, env = "KIDEX_TIME_LIMIT_SECS", default_value_t = 7200)]
    time_limit_secs: u64,

    /// Integer solves allowed per objective
    #[arg(long, env = "KIDEX_MAX_ITERATIONS", default_value_t = 2000)]
    max_iterations: u32,

    /// Print every enumerated cycle and chain before the report
    #[arg(long)]
    list_structures: bool,
}

/// Resolved run configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub instance: PathBuf,
    pub output: Option<PathBuf>,
    pub allocation: AllocationConfig,
    pub list_structures: bool,
}

impl From<Cli> for AppConfig {
    fn from(cli: Cli) -> Self {
        Self {
            instance: cli.instance,
            output: cli.output,
            allocation: AllocationConfig {
                limits: EnumerationLimits::new(cli.max_cycle_length, cli.max_chain_length),
                sequencer: SequencerConfig {
                    time_limit: Duration::from_secs(cli.time_limit_secs),
                    max_iterations: cli.max_iterations,
                    ..SequencerConfig::default()
                },
            },
            list_structures: cli.list_structures,
        }
    }
}

impl AppConfig {
    /// Reads `.env` first so its values can back the `KIDEX_*` options.
    pub fn from_env_and_args() -> Self {
        let _ = dotenvy::dotenv();
        Cli::parse().into()
    }
}

/// Text produced by one run.
#[derive(Debug, Default)]
pub struct RunOutput {
    pub catalog: Option<String>,
    pub report: String,
}

/// Initialize logging and tracing
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

pub fn run() -> Result<()> {
    let config = AppConfig::from_env_and_args();
    init_logging();

    let output = execute(&config, &mut HighsOracle::new())?;
    if let Some(catalog) = &output.catalog {
        println!("{catalog}");
    }
    match &config.output {
        Some(path) => {
            fs::write(path, &output.report)
                .with_context(|| format!("Failed to write report to '{}'", path.display()))?;
            tracing::info!(path = %path.display(), "report written");
        }
        None => print!("{}", output.report),
    }
    Ok(())
}

pub fn execute(config: &AppConfig, oracle: &mut impl SolverOracle) -> Result<RunOutput> {
    let graph = load_graph(&config.instance)?;

    let catalog = config.list_structures.then(|| {
        let structures = CycleChainEnumerator::new(&graph, config.allocation.limits).enumerate();
        CatalogPresenter::render(&structures)
    });

    let allocation = allocate(&graph, &config.allocation, oracle)
        .context("Invalid optimisation settings")?;
    tracing::info!(
        selected = allocation.selected.len(),
        transplants = allocation.total_transplants(),
        score = allocation.total_score(),
        optimal = allocation.optimal,
        "allocation finished"
    );

    let instance = config.instance.display().to_string();
    let context = ReportContext {
        instance: &instance,
        limits: config.allocation.limits,
    };
    Ok(RunOutput {
        catalog,
        report: ReportPresenter::render(&allocation, &context),
    })
}

fn load_graph(path: &Path) -> Result<GraphModel> {
    let source = fs::read_to_string(path)
        .with_context(|| format!("Failed to read '{}'", path.display()))?;
    let instance = parse_instance(&source)
        .with_context(|| format!("Failed to parse '{}'", path.display()))?;
    let graph = GraphModel::from_instance(&instance)
        .with_context(|| format!("Invalid compatibility graph in '{}'", path.display()))?;
    tracing::info!(
        pairs = instance.num_pairs,
        ndds = instance.num_ndds,
        arcs = graph.arc_count(),
        "loaded instance"
    );
    Ok(graph)
}
