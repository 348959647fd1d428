//! Zero-coverage file discovery.
//!
//! The engine never walks directories itself. A collaborator implements
//! [`FileDiscovery`] and supplies candidate paths; `discover_uncovered`
//! seeds all-zero file data for sources no test ever loaded so they
//! still appear in the final statistics.

use log::warn;
use std::path::{Path, PathBuf};

use crate::analyzer::fingerprint;
use crate::core::FileData;
use crate::io;
use crate::session::Session;

/// File-system search interface supplied by the discovery collaborator.
pub trait FileDiscovery {
    /// All paths under `dir` matching `pattern`.
    fn glob_dir(&self, dir: &Path, pattern: &str) -> Vec<PathBuf>;

    /// Whether a single path matches a pattern.
    fn matches_pattern(&self, path: &Path, pattern: &str) -> bool;
}

/// Seed file data for candidate sources with zero executions. Returns
/// the number of files seeded.
pub fn discover_uncovered(session: &mut Session, discovery: &dyn FileDiscovery) -> usize {
    if !session.config.discover_uncovered {
        return 0;
    }

    let source_dirs = session.config.source_dirs.clone();
    let include = session.config.include.clone();
    let mut seeded = 0;

    for dir in &source_dirs {
        for pattern in &include {
            for path in discovery.glob_dir(Path::new(dir), pattern) {
                if session.files.contains_key(&path) || session.is_ignored(&path) {
                    continue;
                }
                if !session.matches_config(&path) {
                    continue;
                }
                // Glob candidates can include directories and dangling
                // entries; only regular files are seeded.
                if !io::file_exists(&path) {
                    continue;
                }
                match io::read_file(&path) {
                    Ok(source) => {
                        let mut data = FileData::from_source(&path, &source, fingerprint(&source));
                        data.discovered = true;
                        session.files.insert(path, data);
                        seeded += 1;
                    }
                    Err(err) => {
                        warn!("discovery skipping {}: {}", path.display(), err);
                        session.ignore(&path);
                    }
                }
            }
        }
    }

    seeded
}
