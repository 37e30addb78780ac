use crate::config::RunConfig;
use crate::guard::{Escalation, GuardOutcome, TimeoutGuard};
use crate::output::SharedOutput;
use crate::process::{self, PidSignaller};
use std::fmt;
use std::io::{self, Read};
use std::process::{Command, ExitStatus, Stdio};
use tracing::debug;

/// How a target run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionStatus {
    Success,
    /// Exited normally with a non-zero code.
    Exited(i32),
    /// Terminated by a signal (Unix only).
    Signaled(i32),
    /// The process could not be started at all.
    SpawnFailed(String),
    /// Started, but its completion status could not be collected.
    WaitFailed(String),
}

impl ExecutionStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionStatus::Success)
    }
}

impl From<ExitStatus> for ExecutionStatus {
    fn from(status: ExitStatus) -> Self {
        if status.success() {
            return ExecutionStatus::Success;
        }
        if let Some(code) = status.code() {
            return ExecutionStatus::Exited(code);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return ExecutionStatus::Signaled(signal);
            }
        }
        ExecutionStatus::WaitFailed(format!("exited abnormally: {status}"))
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionStatus::Success => write!(f, "success"),
            ExecutionStatus::Exited(code) => write!(f, "exit status {code}"),
            ExecutionStatus::Signaled(signal) => write!(f, "signal: {signal}"),
            ExecutionStatus::SpawnFailed(msg) | ExecutionStatus::WaitFailed(msg) => {
                write!(f, "{msg}")
            }
        }
    }
}

/// Everything captured from one run of the target.
#[derive(Debug)]
pub struct ProcessOutput {
    /// Interleaved stdout and stderr.
    pub output: Vec<u8>,
    pub status: ExecutionStatus,
    /// `None` when the run was not guarded (zero timeout or spawn failure).
    pub guard: Option<GuardOutcome>,
}

/// Runs the configured target command once per [`CommandExecutor::execute`].
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    command: Vec<String>,
    escalation: Escalation,
    report: SharedOutput,
}

impl CommandExecutor {
    /// Timeouts with kill disabled are announced on `report`.
    pub fn new(config: &RunConfig, report: SharedOutput) -> Self {
        Self {
            command: config.command.clone(),
            escalation: Escalation::from_config(config),
            report,
        }
    }

    pub fn execute(&self) -> ProcessOutput {
        let Some((program, args)) = self.command.split_first() else {
            return spawn_failure("no target command".to_string());
        };

        let pipe = io::pipe()
            .and_then(|(reader, writer)| Ok((reader, writer.try_clone()?, writer)));
        let (mut reader, stdout, stderr) = match pipe {
            Ok(pipe) => pipe,
            Err(e) => return spawn_failure(format!("failed to create output pipe: {e}")),
        };

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr);
        let spawned = cmd.spawn();
        // The command owns our copies of the write end; the read below only
        // reaches EOF once they are closed.
        drop(cmd);

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                let msg = format!("failed to start {program:?}: {e}");
                debug!(error = %msg, "spawn failed");
                return spawn_failure(msg);
            }
        };

        let pid = child.id();
        let guard = (!self.escalation.timeout.is_zero()).then(|| {
            TimeoutGuard::arm(PidSignaller::new(pid), self.escalation, self.report.clone())
        });

        let mut output = Vec::new();
        if let Err(e) = reader.read_to_end(&mut output) {
            debug!(pid, error = %e, "reading target output failed");
        }
        // The guard must be settled while the exited child still holds its
        // pid; reaping first would let a late signal hit a recycled pid.
        if let Err(e) = process::wait_for_exit(pid) {
            debug!(pid, error = %e, "waiting for target exit failed");
        }
        let guard = guard.map(TimeoutGuard::disarm);
        let status = match child.wait() {
            Ok(status) => ExecutionStatus::from(status),
            Err(e) => ExecutionStatus::WaitFailed(format!("failed to wait for target: {e}")),
        };

        ProcessOutput {
            output,
            status,
            guard,
        }
    }
}

fn spawn_failure(msg: String) -> ProcessOutput {
    ProcessOutput {
        output: Vec::new(),
        status: ExecutionStatus::SpawnFailed(msg),
        guard: None,
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::output::CapturedOutput;
    use std::time::Duration;

    fn shell(script: &str) -> RunConfig {
        RunConfig::new(vec!["/bin/sh".into(), "-c".into(), script.into()])
    }

    fn executor(config: &RunConfig) -> CommandExecutor {
        CommandExecutor::new(config, SharedOutput::sink())
    }

    #[test]
    fn successful_run_captures_output() {
        let executor = executor(&shell("echo hello"));
        let result = executor.execute();
        assert_eq!(result.status, ExecutionStatus::Success);
        assert_eq!(result.output, b"hello\n");
        assert_eq!(result.guard, Some(GuardOutcome::Cancelled));
    }

    #[test]
    fn stdout_and_stderr_are_combined_in_order() {
        let executor = executor(&shell("echo out; echo err >&2; echo out2"));
        let result = executor.execute();
        assert_eq!(result.output, b"out\nerr\nout2\n");
    }

    #[test]
    fn exit_code_is_reported() {
        let executor = executor(&shell("echo boom; exit 3"));
        let result = executor.execute();
        assert_eq!(result.status, ExecutionStatus::Exited(3));
        assert_eq!(result.status.to_string(), "exit status 3");
        assert_eq!(result.output, b"boom\n");
    }

    #[test]
    fn missing_program_is_a_spawn_failure() {
        let config = RunConfig::new(vec!["./this_command_does_not_exist_ever_12345".into()]);
        let result = executor(&config).execute();
        match &result.status {
            ExecutionStatus::SpawnFailed(msg) => {
                assert!(msg.contains("failed to start"), "Unexpected message: {msg}")
            }
            other => panic!("Expected SpawnFailed, got {other:?}"),
        }
        assert!(result.output.is_empty());
        assert!(result.guard.is_none());
    }

    #[test]
    fn zero_timeout_runs_unguarded() {
        let config = RunConfig {
            timeout: Duration::ZERO,
            ..shell("true")
        };
        let result = executor(&config).execute();
        assert_eq!(result.status, ExecutionStatus::Success);
        assert!(result.guard.is_none());
    }

    #[test]
    fn hung_target_is_interrupted_then_killed() {
        // Ignores SIGABRT, so only the kill after the grace period ends it.
        let config = RunConfig {
            timeout: Duration::from_millis(100),
            grace_period: Duration::from_millis(200),
            ..shell("trap '' ABRT; while :; do sleep 0.05; done")
        };
        let result = executor(&config).execute();

        assert_eq!(result.guard, Some(GuardOutcome::Terminated));
        assert_eq!(result.status, ExecutionStatus::Signaled(libc::SIGKILL));
        assert!(!result.status.is_success());
    }

    #[test]
    fn timed_out_target_that_honours_interrupt_stops_early() {
        let config = RunConfig {
            timeout: Duration::from_millis(100),
            grace_period: Duration::from_secs(10),
            ..shell("exec sleep 30")
        };
        let result = executor(&config).execute();

        assert_eq!(result.guard, Some(GuardOutcome::Interrupted));
        assert_eq!(result.status, ExecutionStatus::Signaled(libc::SIGABRT));
    }

    #[test]
    fn timeout_without_kill_prints_pid_and_lets_target_finish() {
        let config = RunConfig {
            timeout: Duration::from_millis(50),
            kill_on_timeout: false,
            ..shell("sleep 0.3; echo finished")
        };
        let captured = CapturedOutput::new();
        let result = CommandExecutor::new(&config, SharedOutput::new(captured.clone())).execute();

        assert_eq!(result.guard, Some(GuardOutcome::Reported));
        assert_eq!(result.status, ExecutionStatus::Success);
        assert_eq!(result.output, b"finished\n");

        let printed = captured.contents();
        let line = printed.trim_end();
        let pid = line
            .strip_prefix("process ")
            .and_then(|rest| rest.strip_suffix(" timed out"))
            .unwrap_or_else(|| panic!("Unexpected timeout report: {printed:?}"));
        assert!(pid.parse::<u32>().is_ok(), "Expected a pid, got {pid:?}");
    }

    #[test]
    fn guard_settles_before_the_status_is_collected() {
        // Exits right after the interrupt window opens; the guard must still
        // see a completed run rather than a kill.
        let config = RunConfig {
            timeout: Duration::from_millis(100),
            grace_period: Duration::from_secs(10),
            ..shell("trap 'exit 7' ABRT; while :; do sleep 0.05; done")
        };
        let result = executor(&config).execute();

        assert_eq!(result.guard, Some(GuardOutcome::Interrupted));
        assert_eq!(result.status, ExecutionStatus::Exited(7));
    }
}
