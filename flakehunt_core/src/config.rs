pub use crate::duration::parse_duration;
use crate::matcher::OutputMatcher;
use serde::Deserialize;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Config file looked up in the working directory when none is given explicitly.
pub const DEFAULT_CONFIG_FILE: &str = "flakehunt.toml";

pub const DEFAULT_LIMIT: usize = 100;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Time a timed-out process gets to exit after the soft interrupt before it
/// is killed.
pub const KILL_GRACE_PERIOD: Duration = Duration::from_secs(10);

/// Interval between periodic progress snapshots.
pub const PROGRESS_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file at {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse TOML from config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("bad {kind} regexp: {source}")]
    BadPattern {
        kind: &'static str,
        #[source]
        source: regex::Error,
    },

    #[error("invalid duration {input:?}: {reason}")]
    InvalidDuration { input: String, reason: String },

    #[error("parallelism must be at least 1")]
    InvalidParallelism,

    #[error("timeout must be positive")]
    InvalidTimeout,

    #[error("failure limit must be at least 1")]
    InvalidLimit,

    #[error("no target command given")]
    MissingCommand,
}

impl ConfigError {
    /// Whether the error comes from a bad flag value, in which case the
    /// caller should show usage along with the diagnostic.
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            ConfigError::InvalidParallelism
                | ConfigError::InvalidTimeout
                | ConfigError::InvalidLimit
                | ConfigError::MissingCommand
                | ConfigError::InvalidDuration { .. }
        )
    }
}

/// Raw, unvalidated hunt settings as they appear in a config file or on the
/// command line. Every field is optional so layers can be merged.
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct HuntSettings {
    pub parallelism: Option<usize>,
    pub limit: Option<usize>,
    pub timeout: Option<String>,
    pub kill: Option<bool>,
    pub failure: Option<String>,
    pub ignore: Option<String>,
    pub output: Option<PathBuf>,
    pub fail_fast: Option<bool>,
    #[serde(default)]
    pub command: Vec<String>,
}

impl HuntSettings {
    /// Layers `self` on top of `base`: every value set in `self` wins.
    pub fn merged_over(self, base: HuntSettings) -> HuntSettings {
        HuntSettings {
            parallelism: self.parallelism.or(base.parallelism),
            limit: self.limit.or(base.limit),
            timeout: self.timeout.or(base.timeout),
            kill: self.kill.or(base.kill),
            failure: self.failure.or(base.failure),
            ignore: self.ignore.or(base.ignore),
            output: self.output.or(base.output),
            fail_fast: self.fail_fast.or(base.fail_fast),
            command: if self.command.is_empty() {
                base.command
            } else {
                self.command
            },
        }
    }
}

/// On-disk configuration file.
///
/// ```toml
/// [hunt]
/// parallelism = 8
/// timeout = "90s"
/// failure = "data race"
/// command = ["./pkg.test", "-test.run=TestFlaky"]
/// ```
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct HuntConfig {
    #[serde(default)]
    pub hunt: HuntSettings,
}

impl HuntConfig {
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Immutable settings for one hunt. Built once before any worker starts and
/// shared read-only afterwards.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub parallelism: usize,
    /// Per-run timeout. Zero disables the timeout guard entirely.
    pub timeout: Duration,
    /// Kill timed-out processes; otherwise only report their pid so a
    /// debugger can be attached.
    pub kill_on_timeout: bool,
    pub failure: Option<OutputMatcher>,
    pub ignore: Option<OutputMatcher>,
    /// Failure artifacts are written to this path plus a unique suffix.
    pub output_prefix: PathBuf,
    pub limit: usize,
    pub fail_fast: bool,
    /// Target program followed by its arguments.
    pub command: Vec<String>,
    pub grace_period: Duration,
    pub progress_interval: Duration,
}

impl RunConfig {
    /// Defaults for every knob, running `command`.
    pub fn new(command: Vec<String>) -> Self {
        Self {
            parallelism: default_parallelism(),
            timeout: DEFAULT_TIMEOUT,
            kill_on_timeout: true,
            failure: None,
            ignore: None,
            output_prefix: default_output_prefix(),
            limit: DEFAULT_LIMIT,
            fail_fast: false,
            command,
            grace_period: KILL_GRACE_PERIOD,
            progress_interval: PROGRESS_INTERVAL,
        }
    }

    /// Resolves merged settings into a validated config. Unlike
    /// [`RunConfig::validate`], a zero timeout is rejected here: it is only
    /// reachable through the programmatic API.
    pub fn from_settings(settings: HuntSettings) -> Result<Self, ConfigError> {
        let mut config = RunConfig::new(settings.command);

        if let Some(parallelism) = settings.parallelism {
            config.parallelism = parallelism;
        }
        if let Some(limit) = settings.limit {
            config.limit = limit;
        }
        if let Some(timeout) = settings.timeout.as_deref() {
            config.timeout = parse_duration(timeout)?;
            if config.timeout.is_zero() {
                return Err(ConfigError::InvalidTimeout);
            }
        }
        if let Some(kill) = settings.kill {
            config.kill_on_timeout = kill;
        }
        config.failure = compile_pattern("failure", settings.failure.as_deref())?;
        config.ignore = compile_pattern("ignore", settings.ignore.as_deref())?;
        if let Some(output) = settings.output {
            config.output_prefix = output;
        }
        if let Some(fail_fast) = settings.fail_fast {
            config.fail_fast = fail_fast;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.parallelism == 0 {
            return Err(ConfigError::InvalidParallelism);
        }
        if self.limit == 0 {
            return Err(ConfigError::InvalidLimit);
        }
        if self.command.first().is_none_or(|program| program.is_empty()) {
            return Err(ConfigError::MissingCommand);
        }
        Ok(())
    }
}

/// Empty patterns mean "not configured", the same as an absent flag.
fn compile_pattern(
    kind: &'static str,
    pattern: Option<&str>,
) -> Result<Option<OutputMatcher>, ConfigError> {
    match pattern {
        None | Some("") => Ok(None),
        Some(pattern) => OutputMatcher::new(pattern)
            .map(Some)
            .map_err(|source| ConfigError::BadPattern { kind, source }),
    }
}

pub fn default_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

/// `<tmpdir>/flakehunt-YYYYMMDDTHHMMSS-`
pub fn default_output_prefix() -> PathBuf {
    let stamp = chrono::Local::now().format("flakehunt-%Y%m%dT%H%M%S-");
    std::env::temp_dir().join(stamp.to_string())
}
