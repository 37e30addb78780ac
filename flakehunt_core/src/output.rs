use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard};

/// The hunt's stdout surface, shared between the aggregator and the timeout
/// guards. Each `write_all`/`write_fmt` call holds the lock for its whole
/// duration, so lines from different threads never interleave.
#[derive(Clone)]
pub struct SharedOutput {
    inner: Arc<Mutex<dyn Write + Send>>,
}

impl SharedOutput {
    pub fn new<W: Write + Send + 'static>(out: W) -> Self {
        Self {
            inner: Arc::new(Mutex::new(out)),
        }
    }

    /// Discards everything.
    pub fn sink() -> Self {
        Self::new(io::sink())
    }

    fn lock(&self) -> MutexGuard<'_, dyn Write + Send + 'static> {
        // A panic mid-write leaves at worst a partial line behind.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl fmt::Debug for SharedOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedOutput").finish_non_exhaustive()
    }
}

impl Write for SharedOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.lock().write(buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.lock().write_all(buf)
    }

    fn write_fmt(&mut self, args: std::fmt::Arguments<'_>) -> io::Result<()> {
        self.lock().write_fmt(args)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.lock().flush()
    }
}

/// In-memory writer whose contents stay readable after being handed to a
/// [`SharedOutput`].
#[derive(Clone, Default)]
pub struct CapturedOutput {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl CapturedOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        let buffer = self
            .buffer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

impl Write for CapturedOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn lines_from_many_threads_stay_whole() {
        let captured = CapturedOutput::new();
        let output = SharedOutput::new(captured.clone());

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let mut out = output.clone();
                thread::spawn(move || {
                    for i in 0..50 {
                        writeln!(out, "thread {t} line {i} {}", "x".repeat(64)).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let text = captured.contents();
        assert_eq!(text.lines().count(), 400);
        for line in text.lines() {
            assert!(
                line.starts_with("thread ") && line.ends_with(&"x".repeat(64)),
                "Interleaved line: {line:?}"
            );
        }
    }
}
