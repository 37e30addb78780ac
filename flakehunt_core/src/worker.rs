use crate::config::RunConfig;
use crate::event::{Event, RunResult};
use crate::executor::{CommandExecutor, ExecutionStatus, ProcessOutput};
use crate::oracle::{FailureOracle, Oracle, Verdict};
use crate::output::SharedOutput;
use std::sync::mpsc::SyncSender;
use std::time::Instant;
use tracing::debug;

/// Runs the target over and over, handing every result to the aggregator.
pub struct Worker {
    id: usize,
    executor: CommandExecutor,
    oracle: FailureOracle,
    results: SyncSender<Event>,
}

impl Worker {
    /// `report` receives the timeout notices of this worker's runs.
    pub fn new(
        id: usize,
        config: &RunConfig,
        results: SyncSender<Event>,
        report: SharedOutput,
    ) -> Self {
        Self {
            id,
            executor: CommandExecutor::new(config, report),
            oracle: FailureOracle::from_config(config),
            results,
        }
    }

    /// Loops until the aggregator stops receiving. Each send blocks until the
    /// aggregator takes the result.
    pub fn run(self) {
        loop {
            let result = self.run_once();
            if self.results.send(Event::Finished(result)).is_err() {
                debug!(worker = self.id, "aggregator gone, worker exiting");
                return;
            }
        }
    }

    /// Executes the target once and classifies the run.
    pub fn run_once(&self) -> RunResult {
        let started = Instant::now();
        let ProcessOutput { output, status, .. } = self.executor.execute();
        let verdict = self.oracle.examine(&status, &output);
        let duration = started.elapsed();

        match verdict {
            Verdict::Failure => RunResult::failure(with_error_trailer(output, &status), duration),
            Verdict::Pass => RunResult::pass(duration),
        }
    }
}

fn with_error_trailer(mut output: Vec<u8>, status: &ExecutionStatus) -> Vec<u8> {
    output.extend_from_slice(format!("\nERROR: {status}").as_bytes());
    output
}
