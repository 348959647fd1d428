//! Shared error types for the coverage engine

use std::path::PathBuf;
use thiserror::Error;

/// Analysis phase identifiers, used in timeout diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisPhase {
    /// Parsing source text into an AST
    Parse,
    /// Extracting executable lines, functions and blocks from the AST
    Extract,
    /// Marking non-executable lines from raw-text literal spans
    MarkLines,
}

impl std::fmt::Display for AnalysisPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AnalysisPhase::Parse => "parse",
            AnalysisPhase::Extract => "extract",
            AnalysisPhase::MarkLines => "mark-lines",
        };
        f.write_str(name)
    }
}

/// Main error type for coverage engine operations.
///
/// Per-file failures are isolated: none of these variants aborts a
/// session. `ParseFailed` and `AnalysisTimeout` trigger the heuristic
/// fallback, `FileUnreadable` excludes the file from totals, and
/// `InvariantViolation` is detected and self-healed during
/// reconciliation.
#[derive(Debug, Error)]
pub enum CoverageError {
    /// Malformed source that the grammar parser rejected
    #[error("parse failed for {file}: {message}")]
    ParseFailed { file: PathBuf, message: String },

    /// An analysis phase exceeded its wall-clock budget
    #[error("analysis budget exhausted in {phase} phase for {file} after {analyzed_lines} lines")]
    AnalysisTimeout {
        file: PathBuf,
        phase: AnalysisPhase,
        analyzed_lines: usize,
    },

    /// Missing or permission-denied source file
    #[error("cannot read {path}")]
    FileUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A hit mark was found on a non-executable line after reconciliation
    #[error("hit mark on non-executable line {line} of {file}")]
    InvariantViolation { file: PathBuf, line: usize },

    /// Invalid configuration values
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Invalid glob pattern in include/exclude configuration
    #[error(transparent)]
    Pattern(#[from] glob::PatternError),

    /// IO errors outside the per-file read path
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CoverageError {
    /// Create a file-read error with path context
    pub fn unreadable(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileUnreadable {
            path: path.into(),
            source,
        }
    }

    /// Create a parse error for a file
    pub fn parse_failed(file: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ParseFailed {
            file: file.into(),
            message: message.into(),
        }
    }
}

/// Result type alias using the engine's error type
pub type Result<T> = std::result::Result<T, CoverageError>;
