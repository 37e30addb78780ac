use crate::config::RunConfig;
use crate::executor::ExecutionStatus;
use crate::matcher::OutputMatcher;

/// Classification of a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Failure,
}

/// An `Oracle` decides whether a finished run counts as a failure.
pub trait Oracle: Send + Sync {
    /// Examines the completion status and the captured combined output of a run.
    fn examine(&self, status: &ExecutionStatus, output: &[u8]) -> Verdict;
}

/// The standard oracle: a run fails when it did not complete successfully,
/// its output matches the failure pattern (if any), and it does not match the
/// ignore pattern (if any).
///
/// A successful completion is never a failure, whatever the patterns say.
#[derive(Debug, Clone, Default)]
pub struct FailureOracle {
    failure: Option<OutputMatcher>,
    ignore: Option<OutputMatcher>,
}

impl FailureOracle {
    pub fn new(failure: Option<OutputMatcher>, ignore: Option<OutputMatcher>) -> Self {
        Self { failure, ignore }
    }

    pub fn from_config(config: &RunConfig) -> Self {
        Self::new(config.failure.clone(), config.ignore.clone())
    }
}

impl Oracle for FailureOracle {
    fn examine(&self, status: &ExecutionStatus, output: &[u8]) -> Verdict {
        if status.is_success() {
            return Verdict::Pass;
        }
        let wanted = self.failure.as_ref().is_none_or(|m| m.matches(output));
        let ignored = self.ignore.as_ref().is_some_and(|m| m.matches(output));
        if wanted && !ignored {
            Verdict::Failure
        } else {
            Verdict::Pass
        }
    }
}
