use std::io;

/// Signal-level control over a running target process.
pub trait ProcessControl: Send + 'static {
    fn pid(&self) -> u32;

    /// Asks the process to stop in a way that makes it dump diagnostic state
    /// (SIGABRT on Unix). Platforms without such a signal force-stop instead.
    fn interrupt(&self) -> io::Result<()>;

    /// Stops the process unconditionally.
    fn terminate(&self) -> io::Result<()>;
}

/// Signals a process by pid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PidSignaller {
    pid: u32,
}

impl PidSignaller {
    pub fn new(pid: u32) -> Self {
        Self { pid }
    }
}

impl ProcessControl for PidSignaller {
    fn pid(&self) -> u32 {
        self.pid
    }

    #[cfg(unix)]
    fn interrupt(&self) -> io::Result<()> {
        send_signal(self.pid, libc::SIGABRT)
    }

    #[cfg(not(unix))]
    fn interrupt(&self) -> io::Result<()> {
        self.terminate()
    }

    #[cfg(unix)]
    fn terminate(&self) -> io::Result<()> {
        send_signal(self.pid, libc::SIGKILL)
    }

    #[cfg(not(unix))]
    fn terminate(&self) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "signalling by pid is only supported on unix",
        ))
    }
}

#[cfg(unix)]
fn send_signal(pid: u32, signal: libc::c_int) -> io::Result<()> {
    let pid = libc::pid_t::try_from(pid)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;
    let ret = unsafe { libc::kill(pid, signal) };
    if ret == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// Blocks until the child `pid` has exited, leaving it unreaped. Until the
/// caller reaps it the pid stays reserved by the zombie, so a late signal
/// cannot reach an unrelated process.
#[cfg(any(
    target_os = "linux",
    target_os = "android",
    target_os = "macos",
    target_os = "freebsd"
))]
pub fn wait_for_exit(pid: u32) -> io::Result<()> {
    let id = pid as libc::id_t;
    loop {
        let mut info: libc::siginfo_t = unsafe { std::mem::zeroed() };
        let ret = unsafe {
            libc::waitid(
                libc::P_PID,
                id,
                &mut info,
                libc::WEXITED | libc::WNOWAIT,
            )
        };
        if ret == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

/// Without `WNOWAIT` the exit is only observed by reaping it.
#[cfg(not(any(
    target_os = "linux",
    target_os = "android",
    target_os = "macos",
    target_os = "freebsd"
)))]
pub fn wait_for_exit(_pid: u32) -> io::Result<()> {
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::process::ExitStatusExt;
    use std::process::Command;

    #[test]
    fn interrupt_delivers_sigabrt() {
        let mut child = Command::new("sleep").arg("30").spawn().unwrap();
        let signaller = PidSignaller::new(child.id());
        assert_eq!(signaller.pid(), child.id());

        signaller.interrupt().unwrap();
        let status = child.wait().unwrap();
        assert_eq!(status.signal(), Some(libc::SIGABRT));
    }

    #[test]
    fn terminate_delivers_sigkill() {
        let mut child = Command::new("sleep").arg("30").spawn().unwrap();
        PidSignaller::new(child.id()).terminate().unwrap();
        let status = child.wait().unwrap();
        assert_eq!(status.signal(), Some(libc::SIGKILL));
    }

    #[test]
    fn signalling_a_reaped_process_reports_an_error() {
        let mut child = Command::new("true").spawn().unwrap();
        let pid = child.id();
        child.wait().unwrap();
        // The pid may in theory be recycled, but not within this window in practice.
        assert!(PidSignaller::new(pid).terminate().is_err());
    }

    #[cfg(any(target_os = "linux", target_os = "macos"))]
    #[test]
    fn exited_child_keeps_its_pid_until_reaped() {
        let mut child = Command::new("/bin/sh").args(["-c", "exit 3"]).spawn().unwrap();
        wait_for_exit(child.id()).unwrap();

        // The zombie still owns the pid, so signalling it is harmless.
        PidSignaller::new(child.id()).terminate().unwrap();

        let status = child.wait().unwrap();
        assert_eq!(status.code(), Some(3), "The exit status must survive the wait");
    }

    #[cfg(any(target_os = "linux", target_os = "macos"))]
    #[test]
    fn waiting_for_exit_does_not_return_early() {
        let started = std::time::Instant::now();
        let mut child = Command::new("sleep").arg("0.2").spawn().unwrap();
        wait_for_exit(child.id()).unwrap();
        assert!(started.elapsed() >= std::time::Duration::from_millis(200));
        assert!(child.wait().unwrap().success());
    }
}
