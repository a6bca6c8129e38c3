//! altlb CLI - Command-line interface for the alternation-trading lower bound search

mod format;

use altlb_math::rational::{parse as parse_rational, rat};
use altlb_search::{
    Annotation, AnnotationError, CatalogChoice, CatalogError, ObjectiveMode, ProgramBuilder,
    RuleCatalog, SearchConfig, SearchDriver, SearchError, SearchFailure, SearchReport,
    SimplexOracle, SweepConfig, VerifyError, WitnessReport, rank_annotations, run_sweep,
    validate_sweep, verify_report, witness_from_report,
};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{Level, debug, warn};
use tracing_subscriber::FmtSubscriber;

use format::{
    Style, eprintln_colored, format_annotations, format_ranks, format_report, format_sweep,
    format_verified, to_json,
};

/// Configuration file structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct CliConfig {
    /// Default verbosity level
    #[serde(default)]
    verbosity: Option<String>,
    /// Default output format
    #[serde(default)]
    format: Option<String>,
    /// Enable colors by default
    #[serde(default)]
    color: Option<bool>,
    /// Default rule catalog
    #[serde(default)]
    catalog: Option<String>,
    /// Default slowdown input weight
    #[serde(default)]
    alpha: Option<f64>,
    /// Default maximum annotation length
    #[serde(default)]
    max_length: Option<usize>,
    /// Default bisection precision
    #[serde(default)]
    epsilon: Option<f64>,
    /// Default per-query timeout in milliseconds
    #[serde(default)]
    query_timeout_ms: Option<u64>,
    /// Default number of worker threads
    #[serde(default)]
    threads: Option<usize>,
}

impl CliConfig {
    /// Load configuration from the default locations
    fn load() -> Self {
        let config_path = dirs::home_dir()
            .map(|mut p| {
                p.push(".altlbrc");
                p
            })
            .filter(|p| p.exists())
            .or_else(|| {
                dirs::config_dir().map(|mut p| {
                    p.push("altlb");
                    p.push("config.yaml");
                    p
                })
            });

        if let Some(path) = config_path
            && path.exists()
            && let Ok(contents) = fs::read_to_string(&path)
            && let Ok(config) = serde_yaml::from_str(&contents)
        {
            return config;
        }

        Self::default()
    }

    /// Load configuration from an explicit file; errors are fatal here
    fn load_from(path: &Path) -> Result<Self, CliError> {
        let contents = fs::read_to_string(path).map_err(|source| CliError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&contents).map_err(|e| CliError::ConfigFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Merge configuration with command-line arguments
    fn merge_with_args(&self, args: &mut Args) {
        // Only apply config if arg is not explicitly set
        if args.verbosity == Verbosity::Normal
            && let Some(ref v) = self.verbosity
        {
            match v.as_str() {
                "quiet" => args.verbosity = Verbosity::Quiet,
                "verbose" => args.verbosity = Verbosity::Verbose,
                "debug" => args.verbosity = Verbosity::Debug,
                "trace" => args.verbosity = Verbosity::Trace,
                _ => {}
            }
        }

        if args.format.is_none()
            && let Some(ref f) = self.format
        {
            args.format = OutputFormat::from_str(f, true).ok();
        }

        if let Some(color) = self.color
            && !color
        {
            args.no_color = true;
        }
    }

    /// Catalog named on the command line, else in the file, else standard
    fn catalog_choice(&self, arg: Option<CatalogArg>) -> Result<CatalogChoice, CliError> {
        Ok(match (arg, &self.catalog) {
            (Some(arg), _) => arg.into(),
            (None, Some(name)) => name.parse()?,
            (None, None) => CatalogChoice::Standard,
        })
    }

    fn catalog(&self, opts: &CatalogOpts) -> Result<RuleCatalog, CliError> {
        let catalog = self.catalog_choice(opts.catalog)?.build();
        match opts.alpha.or(self.alpha) {
            Some(alpha) => Ok(catalog.with_alpha(alpha)?),
            None => Ok(catalog),
        }
    }

    /// Search configuration from tuning flags over file defaults
    fn search_config(&self, tuning: &TuningOpts, max_length: Option<usize>) -> SearchConfig {
        let mut config = SearchConfig::new();
        if let Some(max_length) = max_length.or(self.max_length) {
            config = config.with_max_length(max_length);
        }
        if let Some(epsilon) = tuning.epsilon.or(self.epsilon) {
            config = config.with_epsilon(epsilon);
        }
        if let Some(threads) = tuning.threads.or(self.threads) {
            config = config.with_threads(threads);
        }
        config = match tuning.query_timeout.or(self.query_timeout_ms) {
            Some(0) => config.without_query_timeout(),
            Some(ms) => config.with_query_timeout(Duration::from_millis(ms)),
            None => config,
        };
        if let Some(ms) = tuning.total_timeout.filter(|&ms| ms > 0) {
            config = config.with_total_timeout(Duration::from_millis(ms));
        }
        if let Some(constant) = tuning.initial {
            config = config.with_initial_constant(constant);
        }
        if let Some(n) = tuning.max_doublings {
            config = config.with_max_doublings(n);
        }
        if let Some(n) = tuning.max_halvings {
            config = config.with_max_halvings(n);
        }
        if let Some(n) = tuning.max_bisections {
            config = config.with_max_bisections(n);
        }
        if let Some(objective) = tuning.objective {
            config = config.with_objective(objective.into());
        }
        config
    }
}

/// Output format for results
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
enum OutputFormat {
    /// Human-readable text (default)
    Text,
    /// JSON format
    Json,
}

/// Verbosity level
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, PartialOrd, Ord)]
enum Verbosity {
    /// No output except results
    Quiet,
    /// Minimal output
    Normal,
    /// Probe history and witness details
    Verbose,
    /// Debug output
    Debug,
    /// Trace output
    Trace,
}

/// Built-in rule catalogs
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
enum CatalogArg {
    /// Open, Speedup and Slowdown with balanced alternations
    Standard,
    /// A single speedup followed by a single slowdown
    TwoStep,
}

impl From<CatalogArg> for CatalogChoice {
    fn from(arg: CatalogArg) -> Self {
        match arg {
            CatalogArg::Standard => CatalogChoice::Standard,
            CatalogArg::TwoStep => CatalogChoice::TwoStep,
        }
    }
}

/// Objective attached to each feasibility query
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
enum ObjectiveArg {
    /// Pure feasibility
    Feasibility,
    /// Minimize the exponent of the starting line
    MinimizeStartExponent,
}

impl From<ObjectiveArg> for ObjectiveMode {
    fn from(arg: ObjectiveArg) -> Self {
        match arg {
            ObjectiveArg::Feasibility => ObjectiveMode::Feasibility,
            ObjectiveArg::MinimizeStartExponent => ObjectiveMode::MinimizeStartExponent,
        }
    }
}

/// Catalog selection shared by several commands
#[derive(clap::Args, Debug, Clone, Default)]
struct CatalogOpts {
    /// Rule catalog
    #[arg(long, value_enum)]
    catalog: Option<CatalogArg>,

    /// Slowdown input weight (positive)
    #[arg(long)]
    alpha: Option<f64>,
}

/// Search tuning shared by several commands
#[derive(clap::Args, Debug, Clone, Default)]
struct TuningOpts {
    /// First constant probed
    #[arg(long, value_name = "C")]
    initial: Option<f64>,

    /// Stop bisecting once the bracket is narrower than this
    #[arg(short, long)]
    epsilon: Option<f64>,

    /// Upper bound on doubling steps
    #[arg(long)]
    max_doublings: Option<usize>,

    /// Upper bound on halving steps
    #[arg(long)]
    max_halvings: Option<usize>,

    /// Upper bound on bisection steps
    #[arg(long)]
    max_bisections: Option<usize>,

    /// Per-query timeout in milliseconds (0 = no timeout)
    #[arg(long, value_name = "MS")]
    query_timeout: Option<u64>,

    /// Timeout for the whole run in milliseconds (0 = no timeout)
    #[arg(long, value_name = "MS")]
    total_timeout: Option<u64>,

    /// Worker threads (0 = global pool, 1 = sequential)
    #[arg(short = 'j', long)]
    threads: Option<usize>,

    /// Objective attached to each query
    #[arg(long, value_enum)]
    objective: Option<ObjectiveArg>,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Find the largest constant with a proof of bounded length
    Search {
        #[command(flatten)]
        catalog: CatalogOpts,

        /// Maximum annotation length
        #[arg(short = 'n', long)]
        max_length: Option<usize>,

        #[command(flatten)]
        tuning: TuningOpts,

        /// Restrict the search to one annotation (e.g. `O+---`)
        #[arg(short, long)]
        annotation: Option<String>,

        /// Write the JSON report to this file
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Write the witness program in LP format to this file
        #[arg(long, value_name = "FILE")]
        export_lp: Option<PathBuf>,
    },

    /// Run the search over a grid of slowdown weights and lengths
    Sweep {
        /// Rule catalog
        #[arg(long, value_enum)]
        catalog: Option<CatalogArg>,

        /// Slowdown input weights to sweep
        #[arg(long, value_delimiter = ',', default_value = "1")]
        alphas: Vec<f64>,

        /// Maximum annotation lengths to sweep
        #[arg(long, value_delimiter = ',', required = true)]
        lengths: Vec<usize>,

        /// Also report every annotation tied at the best constant
        #[arg(long)]
        ties: bool,

        #[command(flatten)]
        tuning: TuningOpts,

        /// Write the JSON rows to this file
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// List the valid annotations up to a length
    Enumerate {
        /// Rule catalog
        #[arg(long, value_enum)]
        catalog: Option<CatalogArg>,

        /// Maximum annotation length
        #[arg(short = 'n', long)]
        max_length: Option<usize>,

        /// Only annotations of exactly the maximum length
        #[arg(long)]
        exact: bool,

        /// Print only the number of annotations
        #[arg(long)]
        count: bool,
    },

    /// Rank every annotation of one length by its best constant
    Rank {
        #[command(flatten)]
        catalog: CatalogOpts,

        /// Annotation length
        #[arg(value_name = "LENGTH")]
        length: usize,

        #[command(flatten)]
        tuning: TuningOpts,
    },

    /// Re-check the witness of a saved report in exact arithmetic
    Verify {
        /// Search report or bare witness (JSON)
        #[arg(value_name = "FILE")]
        input: PathBuf,

        // Overrides the catalog recorded in the report
        #[command(flatten)]
        catalog: CatalogOpts,

        /// Allowed slack per constraint, e.g. `0` or `1/1000000`
        #[arg(long, default_value = "0")]
        tolerance: String,
    },

    /// Generate shell completions
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// altlb - Proof search for alternation-trading time-space lower bounds
#[derive(Parser, Debug, Clone)]
#[command(name = "altlb")]
#[command(author = "COOLJAPAN OU (Team KitaSan)")]
#[command(version)]
#[command(about = "Search for alternation-trading proofs of time-space lower bounds")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Verbosity level
    #[arg(short, long, value_enum, default_value = "normal", global = true)]
    verbosity: Verbosity,

    /// Enable quiet mode (equivalent to --verbosity quiet)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output format
    #[arg(short = 'f', long, value_enum, global = true)]
    format: Option<OutputFormat>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Configuration file (defaults to ~/.altlbrc or the user config dir)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,
}

/// Errors that end the process
#[derive(Error, Debug)]
enum CliError {
    #[error("{0}")]
    Catalog(#[from] CatalogError),
    #[error("invalid annotation: {0}")]
    Annotation(#[from] AnnotationError),
    #[error(transparent)]
    Search(#[from] SearchError),
    #[error(transparent)]
    Aborted(Box<SearchFailure>),
    #[error("{path} does not verify: {source}")]
    Verify { path: String, source: VerifyError },
    #[error("cannot read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot parse {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid configuration file {}: {reason}", .path.display())]
    ConfigFile { path: PathBuf, reason: String },
    #[error("{0}")]
    Usage(String),
}

impl CliError {
    /// 1 for failed runs and failed checks, 2 for bad input
    fn exit_code(&self) -> i32 {
        match self {
            Self::Aborted(_) | Self::Verify { .. } | Self::Write { .. } => 1,
            Self::Search(SearchError::Config(_) | SearchError::Catalog(_)) => 2,
            Self::Search(_) => 1,
            _ => 2,
        }
    }
}

fn main() {
    let mut args = Args::parse();

    if let Command::Completions { shell } = args.command {
        let mut cmd = Args::command();
        let bin_name = cmd.get_name().to_string();
        generate(shell, &mut cmd, bin_name, &mut std::io::stdout());
        return;
    }

    // Load configuration file and merge with args
    let config = match args.config.as_deref() {
        Some(path) => match CliConfig::load_from(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln_colored(!args.no_color, &format!("Error: {}", e));
                std::process::exit(e.exit_code());
            }
        },
        None => CliConfig::load(),
    };
    config.merge_with_args(&mut args);

    // Determine verbosity level
    let verbosity = if args.quiet {
        Verbosity::Quiet
    } else {
        args.verbosity
    };

    // Set up logging; stdout is reserved for results
    if verbosity >= Verbosity::Verbose {
        let level = match verbosity {
            Verbosity::Trace => Level::TRACE,
            Verbosity::Debug => Level::DEBUG,
            _ => Level::INFO,
        };
        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .with_writer(std::io::stderr)
            .finish();
        if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
            eprintln_colored(
                !args.no_color,
                &format!("Failed to set tracing subscriber: {}", e),
            );
            std::process::exit(1);
        }
    }
    debug!(?config, "loaded configuration");

    let style = Style {
        color: !args.no_color,
        verbose: verbosity >= Verbosity::Verbose,
        format: args.format.unwrap_or(OutputFormat::Text),
    };

    if let Err(e) = run(&args.command, &config, &style) {
        if let CliError::Aborted(failure) = &e {
            emit(&format_report(&failure.partial, &style));
        }
        eprintln_colored(style.color, &format!("Error: {}", e));
        std::process::exit(e.exit_code());
    }
}

fn run(command: &Command, config: &CliConfig, style: &Style) -> Result<(), CliError> {
    match command {
        Command::Search {
            catalog,
            max_length,
            tuning,
            annotation,
            output,
            export_lp,
        } => {
            let catalog = config.catalog(catalog)?;
            let search = config.search_config(tuning, *max_length);
            let objective = search.objective;
            let driver = SearchDriver::new(catalog, SimplexOracle::new(), search)?;

            let result = match annotation {
                Some(text) => {
                    let annotation = Annotation::parse(driver.catalog(), text)?;
                    driver.search_annotation(&annotation)
                }
                None => driver.run(),
            };
            let report = result.map_err(|failure| CliError::Aborted(Box::new(failure)))?;

            if let Some(path) = output {
                write_file(path, &to_json(&report))?;
            }
            if let Some(path) = export_lp {
                export_witness_program(driver.catalog(), &report, objective, path)?;
            }
            emit(&format_report(&report, style));
            Ok(())
        }

        Command::Sweep {
            catalog,
            alphas,
            lengths,
            ties,
            tuning,
            output,
        } => {
            let sweep = SweepConfig {
                catalog: config.catalog_choice(*catalog)?,
                alphas: alphas.clone(),
                lengths: lengths.clone(),
                search: config.search_config(tuning, None),
                collect_ties: *ties,
            };
            validate_sweep(&sweep)?;

            let rows = run_sweep(&SimplexOracle::new(), &sweep)?;
            if let Some(path) = output {
                write_file(path, &to_json(&rows))?;
            }
            emit(&format_sweep(&rows, style));
            Ok(())
        }

        Command::Enumerate {
            catalog,
            max_length,
            exact,
            count,
        } => {
            let catalog = config.catalog(&CatalogOpts {
                catalog: *catalog,
                alpha: None,
            })?;
            let max_length = max_length
                .or(config.max_length)
                .unwrap_or(SearchConfig::default().max_length);
            let annotations: Vec<Annotation> = catalog
                .enumerate(max_length)
                .filter(|a| !exact || a.len() == max_length)
                .collect();

            if *count {
                emit(&annotations.len().to_string());
            } else {
                emit(&format_annotations(&annotations, style));
            }
            Ok(())
        }

        Command::Rank {
            catalog,
            length,
            tuning,
        } => {
            let catalog = config.catalog(catalog)?;
            let search = config.search_config(tuning, Some(*length));
            let driver = SearchDriver::new(catalog, SimplexOracle::new(), search)?;
            let ranks = rank_annotations(&driver, *length)?;
            emit(&format_ranks(&ranks, style));
            Ok(())
        }

        Command::Verify {
            input,
            catalog,
            tolerance,
        } => verify(input, catalog, tolerance, config, style),

        // Handled before configuration is loaded
        Command::Completions { .. } => Ok(()),
    }
}

/// Verify a saved report, or a bare witness against the selected catalog.
fn verify(
    input: &Path,
    opts: &CatalogOpts,
    tolerance: &str,
    config: &CliConfig,
    style: &Style,
) -> Result<(), CliError> {
    let tolerance = parse_rational(tolerance)
        .filter(|t| *t >= rat(0))
        .ok_or_else(|| CliError::Usage(format!("invalid tolerance `{}`", tolerance)))?;
    let text = fs::read_to_string(input).map_err(|source| CliError::Read {
        path: input.to_path_buf(),
        source,
    })?;

    let (witness, catalog) = match SearchReport::from_json(&text) {
        Ok(report) => {
            let witness = report.witness.ok_or_else(|| {
                CliError::Usage(format!("{} carries no witness", input.display()))
            })?;
            let choice = match opts.catalog {
                Some(arg) => arg.into(),
                None => report.catalog.parse::<CatalogChoice>()?,
            };
            let catalog = choice
                .build()
                .with_alpha(opts.alpha.unwrap_or(report.alpha))?;
            (witness, catalog)
        }
        Err(_) => {
            let witness: WitnessReport =
                serde_json::from_str(&text).map_err(|source| CliError::Json {
                    path: input.to_path_buf(),
                    source,
                })?;
            (witness, config.catalog(opts)?)
        }
    };

    verify_report(&catalog, &witness, &tolerance).map_err(|source| CliError::Verify {
        path: input.display().to_string(),
        source,
    })?;
    emit(&format_verified(&witness, catalog.name(), style));
    Ok(())
}

/// Write the program of the report's witness in LP format.
fn export_witness_program(
    catalog: &RuleCatalog,
    report: &SearchReport,
    objective: ObjectiveMode,
    path: &Path,
) -> Result<(), CliError> {
    let Some(serialized) = &report.witness else {
        warn!("no witness to export");
        eprintln!("No witness found; {} not written", path.display());
        return Ok(());
    };
    let witness = witness_from_report(catalog, serialized).map_err(|source| CliError::Verify {
        path: path.display().to_string(),
        source,
    })?;
    let program = ProgramBuilder::new(catalog)
        .with_objective(objective)
        .build(&witness.annotation, &witness.constant);
    write_file(path, &program.to_lp_format())
}

fn write_file(path: &Path, contents: &str) -> Result<(), CliError> {
    fs::write(path, contents).map_err(|source| CliError::Write {
        path: path.to_path_buf(),
        source,
    })
}

fn emit(text: &str) {
    if !text.is_empty() {
        println!("{}", text);
    }
}
