use flakehunt_core::config::{DEFAULT_CONFIG_FILE, HuntConfig, HuntSettings, RunConfig};
use flakehunt_core::{ConfigError, Hunt, StopReason};

use anyhow::Context;
use clap::{CommandFactory, Parser};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Runs a command over and over, in parallel, to catch sporadic failures.
///
/// Example: flakehunt -p 8 ./pkg.test -test.run=TestFlaky -test.cpu=10
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Run N processes in parallel [default: number of CPUs]
    #[arg(short = 'p', long = "parallelism", value_name = "N")]
    parallelism: Option<usize>,

    /// Maximum number of failures until exiting [default: 100]
    #[arg(long, value_name = "N")]
    limit: Option<usize>,

    /// Timeout each process after DURATION, e.g. 90s or 10m [default: 10m]
    #[arg(long, value_name = "DURATION")]
    timeout: Option<String>,

    /// Kill timed out processes; with --kill=false only print their pid so a
    /// debugger can be attached [default: true]
    #[arg(
        long,
        value_name = "BOOL",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true"
    )]
    kill: Option<bool>,

    /// Fail only if output matches REGEXP
    #[arg(long, value_name = "REGEXP")]
    failure: Option<String>,

    /// Ignore failure if output matches REGEXP
    #[arg(long, value_name = "REGEXP")]
    ignore: Option<String>,

    /// Write failure logs to PATH plus a unique suffix
    #[arg(short = 'o', long = "output", value_name = "PATH")]
    output: Option<PathBuf>,

    /// Exit on first failure
    #[arg(short = 'f', long = "fail-fast")]
    fail_fast: bool,

    /// TOML config file with a [hunt] table [default: ./flakehunt.toml if present]
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable debug logging on stderr
    #[arg(short, long)]
    verbose: bool,

    /// Target command and its arguments
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "COMMAND")]
    command: Vec<String>,
}

impl Cli {
    fn overrides(&self) -> HuntSettings {
        HuntSettings {
            parallelism: self.parallelism,
            limit: self.limit,
            timeout: self.timeout.clone(),
            kill: self.kill,
            failure: self.failure.clone(),
            ignore: self.ignore.clone(),
            output: self.output.clone(),
            fail_fast: self.fail_fast.then_some(true),
            command: self.command.clone(),
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose {
        "flakehunt=debug,flakehunt_core=debug"
    } else {
        "flakehunt=info,flakehunt_core=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init();
}

fn load_config(cli: &Cli) -> Result<RunConfig, ConfigError> {
    let file = match &cli.config {
        Some(path) => HuntConfig::load_from_file(path)?,
        None => {
            let default_path = Path::new(DEFAULT_CONFIG_FILE);
            if default_path.exists() {
                tracing::debug!(path = ?default_path, "loading default config file");
                HuntConfig::load_from_file(default_path)?
            } else {
                HuntConfig::default()
            }
        }
    };
    RunConfig::from_settings(cli.overrides().merged_over(file.hunt))
}

fn hunt(config: RunConfig) -> anyhow::Result<StopReason> {
    Hunt::new(config)
        .run(std::io::stdout())
        .context("hunt aborted")
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            println!("{e}");
            if e.is_usage_error() {
                eprintln!("{}", Cli::command().render_usage());
            }
            return ExitCode::FAILURE;
        }
    };

    // Returning from main ends the process, including workers still blocked
    // on a running target.
    match hunt(config) {
        Ok(reason) => println!("{reason}"),
        Err(e) => println!("{e:#}"),
    }
    ExitCode::FAILURE
}
