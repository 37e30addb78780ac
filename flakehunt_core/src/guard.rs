//! Per-run timeout enforcement.
//!
//! A guard is armed right after the target starts and disarmed as soon as the
//! target completes. If the timeout fires first, the guard escalates: report
//! the pid and stop (kill disabled), or send a soft interrupt, wait out the
//! grace period, and kill.

use crate::config::RunConfig;
use crate::output::SharedOutput;
use crate::process::ProcessControl;
use std::io::Write;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

/// Timeout policy for a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Escalation {
    pub timeout: Duration,
    pub kill: bool,
    pub grace: Duration,
}

impl Escalation {
    pub fn from_config(config: &RunConfig) -> Self {
        Self {
            timeout: config.timeout,
            kill: config.kill_on_timeout,
            grace: config.grace_period,
        }
    }
}

/// How a guard finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardOutcome {
    /// The run completed before the timeout.
    Cancelled,
    /// Timed out with kill disabled; the pid was printed and the process left alone.
    Reported,
    /// Timed out, interrupted, and the run completed within the grace period.
    Interrupted,
    /// Timed out and still running after the grace period; killed.
    Terminated,
}

pub struct TimeoutGuard {
    done: Sender<()>,
    watcher: JoinHandle<GuardOutcome>,
}

impl TimeoutGuard {
    /// Starts the timer for `process`. With kill disabled, a timeout is
    /// announced on `report` instead.
    pub fn arm<P: ProcessControl>(
        process: P,
        escalation: Escalation,
        report: SharedOutput,
    ) -> Self {
        let (done, done_rx) = mpsc::channel();
        let watcher = thread::spawn(move || watch(&process, escalation, &done_rx, report));
        Self { done, watcher }
    }

    /// Signals that the run completed and waits for the watcher to settle.
    pub fn disarm(self) -> GuardOutcome {
        // The watcher may already have returned (kill disabled); that is fine.
        let _ = self.done.send(());
        match self.watcher.join() {
            Ok(outcome) => outcome,
            Err(payload) => std::panic::resume_unwind(payload),
        }
    }
}

fn watch<P: ProcessControl>(
    process: &P,
    escalation: Escalation,
    done: &Receiver<()>,
    mut report: SharedOutput,
) -> GuardOutcome {
    if completed_within(done, escalation.timeout) {
        return GuardOutcome::Cancelled;
    }

    let pid = process.pid();
    if !escalation.kill {
        if let Err(e) = writeln!(report, "process {pid} timed out") {
            debug!(pid, error = %e, "failed to report timeout");
        }
        return GuardOutcome::Reported;
    }

    warn!(pid, timeout = ?escalation.timeout, "process timed out, interrupting");
    if let Err(e) = process.interrupt() {
        debug!(pid, error = %e, "interrupt failed");
    }
    if completed_within(done, escalation.grace) {
        return GuardOutcome::Interrupted;
    }

    warn!(pid, grace = ?escalation.grace, "process ignored interrupt, killing");
    if let Err(e) = process.terminate() {
        debug!(pid, error = %e, "kill failed");
    }
    GuardOutcome::Terminated
}

/// True if "done" arrived (or its sender went away) before `wait` elapsed.
fn completed_within(done: &Receiver<()>, wait: Duration) -> bool {
    match done.recv_timeout(wait) {
        Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
        Err(RecvTimeoutError::Timeout) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::CapturedOutput;
    use std::io;
    use std::sync::{Arc, Mutex};
    use std::time::Instant;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Action {
        Interrupt,
        Terminate,
    }

    /// Records every signal with the time it was sent.
    #[derive(Clone)]
    struct RecordingControl {
        log: Arc<Mutex<Vec<(Action, Instant)>>>,
    }

    impl RecordingControl {
        fn new() -> Self {
            Self {
                log: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn actions(&self) -> Vec<Action> {
            self.log.lock().unwrap().iter().map(|(a, _)| *a).collect()
        }

        fn sent_at(&self, action: Action) -> Option<Instant> {
            self.log
                .lock()
                .unwrap()
                .iter()
                .find(|(a, _)| *a == action)
                .map(|(_, at)| *at)
        }
    }

    impl ProcessControl for RecordingControl {
        fn pid(&self) -> u32 {
            4242
        }

        fn interrupt(&self) -> io::Result<()> {
            self.log
                .lock()
                .unwrap()
                .push((Action::Interrupt, Instant::now()));
            Ok(())
        }

        fn terminate(&self) -> io::Result<()> {
            self.log
                .lock()
                .unwrap()
                .push((Action::Terminate, Instant::now()));
            Ok(())
        }
    }

    fn quiet() -> SharedOutput {
        SharedOutput::sink()
    }

    fn escalation(timeout_ms: u64, kill: bool, grace_ms: u64) -> Escalation {
        Escalation {
            timeout: Duration::from_millis(timeout_ms),
            kill,
            grace: Duration::from_millis(grace_ms),
        }
    }

    #[test]
    fn done_before_timeout_cancels_without_signals() {
        let control = RecordingControl::new();
        let guard = TimeoutGuard::arm(control.clone(), escalation(5_000, true, 5_000), quiet());

        assert_eq!(guard.disarm(), GuardOutcome::Cancelled);
        assert!(
            control.actions().is_empty(),
            "No signal may be sent when the run completes in time"
        );
    }

    #[test]
    fn timeout_without_kill_reports_pid_on_hunt_output() {
        let control = RecordingControl::new();
        let captured = CapturedOutput::new();
        let guard = TimeoutGuard::arm(
            control.clone(),
            escalation(20, false, 20),
            SharedOutput::new(captured.clone()),
        );
        thread::sleep(Duration::from_millis(200));

        assert_eq!(guard.disarm(), GuardOutcome::Reported);
        assert!(control.actions().is_empty());
        assert_eq!(
            captured.contents(),
            "process 4242 timed out\n",
            "The pid must be announced on the writer the hunt reports to"
        );
    }

    #[test]
    fn completed_run_reports_nothing() {
        let captured = CapturedOutput::new();
        let guard = TimeoutGuard::arm(
            RecordingControl::new(),
            escalation(5_000, false, 20),
            SharedOutput::new(captured.clone()),
        );

        assert_eq!(guard.disarm(), GuardOutcome::Cancelled);
        assert_eq!(captured.contents(), "");
    }

    #[test]
    fn done_during_grace_stops_after_interrupt() {
        let control = RecordingControl::new();
        let guard = TimeoutGuard::arm(control.clone(), escalation(20, true, 5_000), quiet());

        let deadline = Instant::now() + Duration::from_secs(5);
        while control.actions().is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }

        assert_eq!(guard.disarm(), GuardOutcome::Interrupted);
        assert_eq!(control.actions(), vec![Action::Interrupt]);
    }

    #[test]
    fn unresponsive_process_is_killed_after_grace() {
        let control = RecordingControl::new();
        let armed_at = Instant::now();
        let guard = TimeoutGuard::arm(control.clone(), escalation(20, true, 150), quiet());
        thread::sleep(Duration::from_millis(400));

        assert_eq!(guard.disarm(), GuardOutcome::Terminated);
        assert_eq!(
            control.actions(),
            vec![Action::Interrupt, Action::Terminate]
        );

        let interrupted = control.sent_at(Action::Interrupt).unwrap();
        let terminated = control.sent_at(Action::Terminate).unwrap();
        assert!(interrupted.duration_since(armed_at) >= Duration::from_millis(20));
        assert!(
            terminated.duration_since(interrupted) >= Duration::from_millis(150),
            "Kill must not be sent before the grace period has elapsed"
        );
    }

    #[cfg(unix)]
    #[test]
    fn real_process_is_interrupted_on_timeout() {
        use crate::process::PidSignaller;
        use std::os::unix::process::ExitStatusExt;
        use std::process::Command;

        let mut child = Command::new("sleep").arg("30").spawn().unwrap();
        let guard = TimeoutGuard::arm(
            PidSignaller::new(child.id()),
            escalation(50, true, 5_000),
            quiet(),
        );
        let status = child.wait().unwrap();

        assert_eq!(guard.disarm(), GuardOutcome::Interrupted);
        assert_eq!(status.signal(), Some(libc::SIGABRT));
    }
}
