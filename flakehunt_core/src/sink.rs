use std::ffi::OsString;
use std::io::Write;
use std::path::{MAIN_SEPARATOR, Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("failed to create failure artifact in {dir:?}: {source}")]
    Create {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write failure artifact {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to keep failure artifact {path:?}: {source}")]
    Keep {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Persists the output of failing runs, one new file per failure.
///
/// The configured prefix is split like a path: everything up to the last
/// separator is the directory, the rest is the file-name prefix. A random
/// suffix makes every file name unique.
#[derive(Debug, Clone)]
pub struct FailureSink {
    dir: PathBuf,
    file_prefix: OsString,
}

impl FailureSink {
    pub fn new(output_prefix: &Path) -> Self {
        let (dir, file_prefix) = split_prefix(output_prefix);
        let dir = if dir.as_os_str().is_empty() {
            std::env::temp_dir()
        } else {
            dir
        };
        Self { dir, file_prefix }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes `output` verbatim to a freshly created file and returns its path.
    pub fn persist(&self, output: &[u8]) -> Result<PathBuf, SinkError> {
        let mut file = tempfile::Builder::new()
            .prefix(&self.file_prefix)
            .tempfile_in(&self.dir)
            .map_err(|source| SinkError::Create {
                dir: self.dir.clone(),
                source,
            })?;

        if let Err(source) = file.write_all(output).and_then(|()| file.flush()) {
            return Err(SinkError::Write {
                path: file.path().to_path_buf(),
                source,
            });
        }

        let (_, path) = file.keep().map_err(|e| SinkError::Keep {
            path: e.file.path().to_path_buf(),
            source: e.error,
        })?;
        debug!(path = %path.display(), bytes = output.len(), "failure artifact written");
        Ok(path)
    }
}

fn split_prefix(prefix: &Path) -> (PathBuf, OsString) {
    let ends_with_separator = prefix
        .to_str()
        .is_some_and(|s| s.ends_with('/') || s.ends_with(MAIN_SEPARATOR));
    if ends_with_separator {
        return (prefix.to_path_buf(), OsString::new());
    }
    match prefix.file_name() {
        Some(name) => (
            prefix.parent().map(Path::to_path_buf).unwrap_or_default(),
            name.to_os_string(),
        ),
        None => (prefix.to_path_buf(), OsString::new()),
    }
}
