use std::time::Duration;

/// Outcome of one target execution as delivered to the aggregator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    /// Captured output plus error trailer for a failure; empty for a pass.
    pub output: Vec<u8>,
    pub duration: Duration,
}

impl RunResult {
    pub fn pass(duration: Duration) -> Self {
        Self {
            output: Vec::new(),
            duration,
        }
    }

    pub fn failure(output: Vec<u8>, duration: Duration) -> Self {
        Self { output, duration }
    }

    pub fn is_failure(&self) -> bool {
        !self.output.is_empty()
    }
}

/// Everything the aggregator consumes, from a single channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Finished(RunResult),
    Tick,
}
