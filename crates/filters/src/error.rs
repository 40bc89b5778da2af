//! Error types returned while compiling and parsing filter rules.

/// A pattern failed to compile into a matcher.
#[derive(Debug, thiserror::Error)]
#[error("failed to compile pattern {pattern:?}: {source}")]
pub struct FilterError {
    pattern: String,
    #[source]
    source: globset::Error,
}

impl FilterError {
    pub(crate) fn new(pattern: &str, source: globset::Error) -> Self {
        Self {
            pattern: pattern.to_string(),
            source,
        }
    }

    /// The pattern text that failed to compile.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

/// A rules file or a rule-syntax line could not be parsed.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{path}: {message}")]
pub struct RuleParseError {
    /// Path of the file being read, or the caller-supplied label for an
    /// in-memory rule string.
    pub path: String,
    /// Human-readable description of what went wrong.
    pub message: String,
    /// Line number within `path` the error occurred at, when applicable.
    pub line: Option<usize>,
}

impl RuleParseError {
    pub(crate) fn new(path: impl Into<String>, message: impl Into<String>, line: Option<usize>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            line,
        }
    }

    pub(crate) fn io(path: impl Into<String>, source: &std::io::Error) -> Self {
        Self::new(path, source.to_string(), None)
    }
}
