//! Thin file-system helpers.
//!
//! All reads funnel through [`read_file`] so unreadable files map to a
//! single error variant that callers can isolate and log.

use std::fs;
use std::path::Path;

use crate::core::{CoverageError, Result};

pub fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| CoverageError::unreadable(path, e))
}

pub fn file_exists(path: &Path) -> bool {
    path.exists() && path.is_file()
}

/// Number of physical lines in a source string.
pub fn count_lines(source: &str) -> usize {
    source.lines().count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn count_lines_handles_trailing_newline() {
        assert_eq!(count_lines("a\nb\n"), 2);
        assert_eq!(count_lines("a\nb"), 2);
        assert_eq!(count_lines(""), 0);
    }

    #[test]
    fn read_missing_file_is_unreadable() {
        let err = read_file(&PathBuf::from("/nonexistent/x.py")).unwrap_err();
        assert!(matches!(err, CoverageError::FileUnreadable { .. }));
    }
}
