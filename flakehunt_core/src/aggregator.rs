use crate::config::RunConfig;
use crate::event::{Event, RunResult};
use crate::sink::{FailureSink, SinkError};
use crate::stats::RunStats;
use std::fmt;
use std::io::{self, Write};
use std::path::Path;
use std::sync::mpsc::Receiver;
use thiserror::Error;
use tracing::debug;

/// Failure output longer than this is cut short on stdout. The artifact
/// always holds the full output.
pub const DISPLAY_LIMIT: usize = 2 << 10;

/// Why the hunt ended. Both are expected outcomes, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    FailFast,
    LimitReached,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::FailFast => write!(f, "fail fast enabled, exiting"),
            StopReason::LimitReached => write!(f, "failure limit hit, exiting"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop(StopReason),
}

#[derive(Error, Debug)]
pub enum AggregatorError {
    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error("failed to write progress output: {0}")]
    Output(#[from] io::Error),

    #[error("every producer hung up")]
    Disconnected,
}

/// The single consumer of run results and ticks. Sole owner of the
/// statistics and the only caller of the failure sink.
pub struct Aggregator<W: Write> {
    stats: RunStats,
    sink: FailureSink,
    limit: u64,
    fail_fast: bool,
    out: W,
}

impl<W: Write> Aggregator<W> {
    pub fn new(config: &RunConfig, sink: FailureSink, out: W) -> Self {
        Self {
            stats: RunStats::new(),
            sink,
            limit: config.limit as u64,
            fail_fast: config.fail_fast,
            out,
        }
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    pub fn into_output(self) -> W {
        self.out
    }

    /// Consumes events until the termination policy fires.
    pub fn run(mut self, events: Receiver<Event>) -> Result<StopReason, AggregatorError> {
        for event in events {
            if let Flow::Stop(reason) = self.handle(event)? {
                return Ok(reason);
            }
        }
        Err(AggregatorError::Disconnected)
    }

    pub fn handle(&mut self, event: Event) -> Result<Flow, AggregatorError> {
        match event {
            Event::Finished(result) => self.on_result(result),
            Event::Tick => {
                self.print_progress()?;
                Ok(Flow::Continue)
            }
        }
    }

    fn on_result(&mut self, result: RunResult) -> Result<Flow, AggregatorError> {
        self.stats.record_run(result.duration);
        if self.stats.runs() == 1 {
            self.print_progress()?;
        }
        if !result.is_failure() {
            return Ok(Flow::Continue);
        }

        self.stats.record_failure();
        let path = self.sink.persist(&result.output)?;
        self.print_failure(&path, &result.output)?;
        self.print_progress()?;

        if self.fail_fast {
            return Ok(Flow::Stop(StopReason::FailFast));
        }
        if self.stats.failures() >= self.limit {
            debug!(failures = self.stats.failures(), "failure limit reached");
            return Ok(Flow::Stop(StopReason::LimitReached));
        }
        Ok(Flow::Continue)
    }

    fn print_progress(&mut self) -> io::Result<()> {
        writeln!(self.out, "{}", self.stats.progress())?;
        self.out.flush()
    }

    /// One `write_all`, so a timeout notice from a guard cannot land inside
    /// the block.
    fn print_failure(&mut self, path: &Path, output: &[u8]) -> io::Result<()> {
        let mut block = format!("{}\n", path.display()).into_bytes();
        if output.len() > DISPLAY_LIMIT {
            block.extend_from_slice(&output[..DISPLAY_LIMIT]);
            block.extend_from_slice("\n…\n".as_bytes());
        } else {
            block.extend_from_slice(output);
            block.push(b'\n');
        }
        self.out.write_all(&block)?;
        self.out.flush()
    }
}
