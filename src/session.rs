//! Session state.
//!
//! A [`Session`] owns every per-file record for one coverage run. There
//! are no process-wide singletons: collaborators hold the session and
//! pass it into every engine call. The tracking hook fires synchronously
//! on the thread running the code under test, so no locking is needed.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use log::warn;

use crate::analyzer::StaticAnalyzer;
use crate::config::CoverageConfig;
use crate::core::{FileData, Result};
use crate::report::{self, CoverageStatistics};
use crate::tracker::{self, EventSource, ExecEvent};

pub struct Session {
    pub config: CoverageConfig,
    enabled: bool,
    active: bool,
    /// Path -> per-file runtime state; exclusively owned by the session
    pub files: HashMap<PathBuf, FileData>,
    /// Paths rejected by config or unreadable, remembered so repeat
    /// events stay cheap
    ignored: HashSet<PathBuf>,
    pub analyzer: StaticAnalyzer,
}

impl Session {
    pub fn new(config: CoverageConfig) -> Self {
        if let Err(err) = config.validate() {
            warn!("coverage configuration invalid: {}", err);
        }
        let enabled = config.enabled;
        let analyzer = StaticAnalyzer::new(config.clone());
        Self {
            config,
            enabled,
            active: false,
            files: HashMap::new(),
            ignored: HashSet::new(),
            analyzer,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Attach the tracker by installing the host hook. Idempotent: a
    /// second `start` while active is a no-op.
    pub fn start(&mut self, source: &mut dyn EventSource) -> Result<()> {
        if !self.enabled || self.active {
            return Ok(());
        }
        source.install()?;
        self.active = true;
        Ok(())
    }

    /// Detach the tracker, reconcile all file data and return the final
    /// statistics snapshot.
    pub fn stop(&mut self, source: &mut dyn EventSource) -> Result<CoverageStatistics> {
        if self.active {
            source.restore()?;
            self.active = false;
        }
        Ok(report::aggregate(self))
    }

    /// Feed one host event through the tracker. Events arriving while
    /// the session is inactive are dropped.
    pub fn on_event(&mut self, event: ExecEvent) {
        if !self.enabled || !self.active {
            return;
        }
        tracker::consume(self, event);
    }

    /// Clear runtime hit data while keeping file entries, code maps and
    /// the analyzer cache.
    pub fn reset(&mut self) {
        for data in self.files.values_mut() {
            data.clear_runtime_state();
        }
    }

    /// Clear everything: file data, ignore memory and the code-map
    /// cache.
    pub fn full_reset(&mut self) {
        self.files.clear();
        self.ignored.clear();
        self.analyzer.clear_cache();
    }

    pub(crate) fn ignore(&mut self, path: &Path) {
        self.ignored.insert(path.to_path_buf());
    }

    pub(crate) fn is_ignored(&self, path: &Path) -> bool {
        self.ignored.contains(path)
    }

    /// Include/exclude filtering. A file is tracked when it matches any
    /// include pattern and no exclude pattern. Patterns are tried
    /// against the full path and the bare file name.
    pub fn matches_config(&self, path: &Path) -> bool {
        let included = self
            .config
            .include
            .iter()
            .any(|pattern| pattern_matches(pattern, path));
        if !included {
            return false;
        }
        !self
            .config
            .exclude
            .iter()
            .any(|pattern| pattern_matches(pattern, path))
    }
}

fn pattern_matches(pattern: &str, path: &Path) -> bool {
    let compiled = match glob::Pattern::new(pattern) {
        Ok(compiled) => compiled,
        Err(err) => {
            warn!("invalid glob pattern {:?}: {}", pattern, err);
            return false;
        }
    };
    if compiled.matches_path(path) {
        return true;
    }
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| compiled.matches(name))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::NullEventSource;

    #[test]
    fn start_is_idempotent_while_active() {
        let mut session = Session::new(CoverageConfig::default());
        let mut source = NullEventSource;
        session.start(&mut source).unwrap();
        assert!(session.is_active());
        session.start(&mut source).unwrap();
        assert!(session.is_active());
    }

    #[test]
    fn disabled_session_never_activates() {
        let config = CoverageConfig {
            enabled: false,
            ..Default::default()
        };
        let mut session = Session::new(config);
        let mut source = NullEventSource;
        session.start(&mut source).unwrap();
        assert!(!session.is_active());
    }

    #[test]
    fn stop_deactivates_and_returns_statistics() {
        let mut session = Session::new(CoverageConfig::default());
        let mut source = NullEventSource;
        session.start(&mut source).unwrap();
        let stats = session.stop(&mut source).unwrap();
        assert!(!session.is_active());
        assert_eq!(stats.summary.files_total, 0);
    }

    #[test]
    fn include_exclude_filtering() {
        let config = CoverageConfig {
            include: vec!["src/**/*.py".to_string()],
            exclude: vec!["src/generated/*.py".to_string()],
            ..Default::default()
        };
        let session = Session::new(config);
        assert!(session.matches_config(Path::new("src/pkg/app.py")));
        assert!(!session.matches_config(Path::new("lib/app.py")));
        assert!(!session.matches_config(Path::new("src/generated/schema.py")));
    }

    #[test]
    fn full_reset_clears_state() {
        let mut session = Session::new(CoverageConfig::default());
        session.ignore(Path::new("gone.py"));
        session.full_reset();
        assert!(!session.is_ignored(Path::new("gone.py")));
        assert!(session.files.is_empty());
    }
}
