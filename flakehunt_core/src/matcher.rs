use regex::bytes::Regex;
use std::fmt;

/// A compiled pattern tested against the raw combined output of a run.
///
/// Output is matched as bytes because targets are free to print anything,
/// including invalid UTF-8.
#[derive(Clone)]
pub struct OutputMatcher {
    regex: Regex,
}

impl OutputMatcher {
    /// Compiles `pattern`. Invalid syntax is returned to the caller, which
    /// treats it as a configuration error.
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(pattern)?,
        })
    }

    pub fn matches(&self, output: &[u8]) -> bool {
        self.regex.is_match(output)
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

impl fmt::Debug for OutputMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("OutputMatcher").field(&self.as_str()).finish()
    }
}
