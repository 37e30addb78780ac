pub mod aggregator;
pub mod config;
pub mod duration;
pub mod event;
pub mod executor;
pub mod guard;
pub mod hunt;
pub mod matcher;
pub mod oracle;
pub mod output;
pub mod process;
pub mod reporter;
pub mod sink;
pub mod stats;
pub mod worker;

pub use aggregator::{Aggregator, AggregatorError, Flow, StopReason};
pub use config::{ConfigError, HuntConfig, HuntSettings, RunConfig};
pub use duration::{HumanDuration, parse_duration};
pub use event::{Event, RunResult};
pub use executor::{CommandExecutor, ExecutionStatus, ProcessOutput};
pub use guard::{Escalation, GuardOutcome, TimeoutGuard};
pub use hunt::{Hunt, HuntError};
pub use matcher::OutputMatcher;
pub use oracle::{FailureOracle, Oracle, Verdict};
pub use output::{CapturedOutput, SharedOutput};
pub use process::{PidSignaller, ProcessControl};
pub use reporter::ProgressReporter;
pub use sink::{FailureSink, SinkError};
pub use stats::RunStats;
pub use worker::Worker;
