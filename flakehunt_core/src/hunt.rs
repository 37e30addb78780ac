use crate::aggregator::{Aggregator, AggregatorError, StopReason};
use crate::config::{ConfigError, RunConfig};
use crate::event::Event;
use crate::output::SharedOutput;
use crate::reporter::ProgressReporter;
use crate::sink::FailureSink;
use crate::worker::Worker;
use std::io::Write;
use std::sync::mpsc;
use std::thread;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum HuntError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to spawn {role} thread: {source}")]
    Spawn {
        role: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Aggregator(#[from] AggregatorError),
}

/// Wires `parallelism` workers and the progress reporter into one aggregator
/// over a zero-capacity channel.
pub struct Hunt {
    config: RunConfig,
}

impl Hunt {
    pub fn new(config: RunConfig) -> Self {
        Self { config }
    }

    /// Runs until the termination policy fires or an infrastructure error
    /// occurs. The aggregator runs on the calling thread; it and the timeout
    /// guards share `out`.
    ///
    /// Workers are not joined on return: they exit on their next delivery
    /// attempt, and any target still running is left to the caller's process
    /// exit.
    pub fn run<W: Write + Send + 'static>(&self, out: W) -> Result<StopReason, HuntError> {
        let config = &self.config;
        config.validate()?;
        info!(
            parallelism = config.parallelism,
            timeout = ?config.timeout,
            limit = config.limit,
            fail_fast = config.fail_fast,
            command = ?config.command,
            "starting hunt"
        );

        let out = SharedOutput::new(out);
        let (events, inbox) = mpsc::sync_channel::<Event>(0);
        for id in 0..config.parallelism {
            let worker = Worker::new(id, config, events.clone(), out.clone());
            thread::Builder::new()
                .name(format!("worker-{id}"))
                .spawn(move || worker.run())
                .map_err(|source| HuntError::Spawn {
                    role: "worker",
                    source,
                })?;
        }
        ProgressReporter::new(config.progress_interval, events)
            .spawn()
            .map_err(|source| HuntError::Spawn {
                role: "progress",
                source,
            })?;

        let sink = FailureSink::new(&config.output_prefix);
        let reason = Aggregator::new(config, sink, out).run(inbox)?;
        info!(%reason, "hunt finished");
        Ok(reason)
    }
}
