//! Execution tracking.
//!
//! The host runtime pushes [`ExecEvent`] records as code executes; the
//! tracker is a pure event consumer with no knowledge of how the events
//! are produced. It records raw occurrence only. Deciding whether a hit
//! line is actually executable is reconciliation's job.

use log::warn;
use std::path::{Path, PathBuf};

use crate::analyzer::fingerprint;
use crate::core::FileData;
use crate::io;
use crate::session::Session;

/// One instrumentation event from the host runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecEvent {
    /// A line transition in the given file
    Line { file: PathBuf, line: usize },
    /// A function call entered at the given line
    Call { file: PathBuf, line: usize },
}

/// The host-side hook the engine attaches on `start` and detaches on
/// `stop`. Implementations must save any previously installed hook in
/// `install` and put it back in `restore`.
pub trait EventSource {
    fn install(&mut self) -> crate::core::Result<()>;
    fn restore(&mut self) -> crate::core::Result<()>;
}

/// A source for hosts that deliver events by direct push; install and
/// restore have nothing to do.
#[derive(Debug, Default)]
pub struct NullEventSource;

impl EventSource for NullEventSource {
    fn install(&mut self) -> crate::core::Result<()> {
        Ok(())
    }

    fn restore(&mut self) -> crate::core::Result<()> {
        Ok(())
    }
}

/// Dispatch one event into session state. O(1) per event once a file
/// has been seeded.
pub fn consume(session: &mut Session, event: ExecEvent) {
    match event {
        ExecEvent::Line { file, line } => track_line(session, &file, line),
        ExecEvent::Call { file, line } => track_call(session, &file, line),
    }
}

/// Record a line event: the line is marked both hit and executed.
pub fn track_line(session: &mut Session, file: &Path, line: usize) {
    if let Some(data) = ensure_file(session, file) {
        data.record_line(line);
    }
}

/// Record a call event against the function spanning `line`. When the
/// code map is still pending the line is buffered in file state and
/// reconciliation replays it after analysis, so seeding order never
/// loses a call.
pub fn track_call(session: &mut Session, file: &Path, line: usize) {
    if let Some(data) = ensure_file(session, file) {
        data.executed.insert(line, true);
        data.record_call(line);
    }
}

/// Lazily seed file state for an unseen file. Returns `None` when the
/// file is filtered out by configuration or cannot be read; both
/// decisions are remembered so later events stay O(1).
fn ensure_file<'a>(session: &'a mut Session, file: &Path) -> Option<&'a mut FileData> {
    if session.files.contains_key(file) {
        return session.files.get_mut(file);
    }
    if session.is_ignored(file) {
        return None;
    }
    if !session.matches_config(file) {
        session.ignore(file);
        return None;
    }

    let source = match io::read_file(file) {
        Ok(source) => source,
        Err(err) => {
            warn!("skipping {}: {}", file.display(), err);
            session.ignore(file);
            return None;
        }
    };

    let mut data = FileData::from_source(file, &source, fingerprint(&source));
    if session.config.pre_analyze_files {
        data.code_map = session.analyzer.analyze_source(file, &source);
    }
    session.files.insert(file.to_path_buf(), data);
    session.files.get_mut(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoverageConfig;
    use std::fs;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn line_event_seeds_file_and_marks_hit() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "app.py", "x = 1\ny = 2\n");
        let mut session = Session::new(CoverageConfig::default());

        consume(
            &mut session,
            ExecEvent::Line {
                file: path.clone(),
                line: 2,
            },
        );

        let data = session.files.get(&path).unwrap();
        assert!(data.is_hit(2));
        assert!(data.code_map.is_pending());
        assert_eq!(data.line_count, 2);
    }

    #[test]
    fn excluded_files_are_not_seeded() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "vendor.py", "x = 1\n");
        let config = CoverageConfig {
            exclude: vec!["**/vendor.py".to_string()],
            ..Default::default()
        };
        let mut session = Session::new(config);

        track_line(&mut session, &path, 1);
        assert!(session.files.is_empty());
    }

    #[test]
    fn unreadable_file_is_skipped_and_remembered() {
        let mut session = Session::new(CoverageConfig::default());
        let ghost = PathBuf::from("/nonexistent/ghost.py");

        track_line(&mut session, &ghost, 1);
        track_line(&mut session, &ghost, 2);

        assert!(session.files.is_empty());
        assert!(session.is_ignored(&ghost));
    }

    #[test]
    fn pre_analyze_attaches_code_map_at_seed_time() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "app.py", "x = 1\n");
        let config = CoverageConfig {
            pre_analyze_files: true,
            ..Default::default()
        };
        let mut session = Session::new(config);

        track_line(&mut session, &path, 1);
        let data = session.files.get(&path).unwrap();
        assert!(!data.code_map.is_pending());
        assert!(data.code_map.is_executable(1));
    }

    #[test]
    fn call_event_with_pending_map_is_buffered() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "app.py", "def f():\n    return 1\n");
        let mut session = Session::new(CoverageConfig::default());

        track_call(&mut session, &path, 1);
        let data = session.files.get(&path).unwrap();
        assert!(data.code_map.is_pending());
        assert!(data.function_hits.is_empty());
        assert!(data.pending_calls.contains(&1));
    }

    #[test]
    fn call_event_credits_known_function() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "app.py", "def f():\n    return 1\n");
        let config = CoverageConfig {
            pre_analyze_files: true,
            ..Default::default()
        };
        let mut session = Session::new(config);

        track_call(&mut session, &path, 1);
        let data = session.files.get(&path).unwrap();
        let hits = data
            .function_hits
            .get(&(1, "f".to_string()))
            .copied()
            .unwrap_or(0);
        assert_eq!(hits, 1);
    }
}
