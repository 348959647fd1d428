//! Static analysis of Python source files.
//!
//! `analyze` turns a file into a [`CodeMap`]: the set of executable
//! lines, function records and control-flow blocks. Analysis runs in
//! three budgeted phases (parse, extract, mark-lines); a phase that
//! exceeds the wall-clock budget returns partial results and the
//! remaining lines fall back to heuristic classification. Oversized
//! files and test files skip the parser entirely.

pub mod cache;
pub mod classify;
pub mod heuristics;
pub mod literals;
pub mod parser;
pub mod phases;

pub use cache::{fingerprint, CodeMapCache};
pub use literals::{forced_non_executable, scan_literal_spans, LiteralSpan};
pub use phases::PhaseBudget;

use log::debug;
use std::path::Path;
use std::sync::Arc;

use crate::config::CoverageConfig;
use crate::core::{AnalysisOutcome, CodeMap, FunctionRecord, Result};
use crate::io;

pub struct StaticAnalyzer {
    config: CoverageConfig,
    cache: CodeMapCache,
}

impl StaticAnalyzer {
    pub fn new(config: CoverageConfig) -> Self {
        Self {
            config,
            cache: CodeMapCache::new(),
        }
    }

    /// Analyze a file from disk. The only fatal error here is an
    /// unreadable file; parse failures and timeouts degrade to
    /// heuristics internally.
    pub fn analyze(&mut self, path: &Path) -> Result<Arc<CodeMap>> {
        let source = io::read_file(path)?;
        Ok(self.analyze_source(path, &source))
    }

    /// Analyze already-loaded source text. Infallible: every failure
    /// mode falls back to heuristic classification.
    pub fn analyze_source(&mut self, path: &Path, source: &str) -> Arc<CodeMap> {
        let fingerprint = cache::fingerprint(source);
        if self.config.cache_parsed_files {
            if let Some(map) = self.cache.get(path, fingerprint) {
                return map;
            }
        }

        let lines: Vec<String> = source.lines().map(str::to_string).collect();
        let map = Arc::new(self.build_map(path, source, &lines, fingerprint));
        if let Err(err) = map.validate() {
            debug!("code map for {} failed validation: {}", path.display(), err);
        }
        if self.config.cache_parsed_files {
            self.cache.insert(path, Arc::clone(&map));
        }
        map
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    pub fn invalidate(&mut self, path: &Path) {
        self.cache.invalidate(path);
    }

    fn build_map(&self, path: &Path, source: &str, lines: &[String], fingerprint: u64) -> CodeMap {
        let line_count = lines.len();

        if !self.config.use_static_analysis {
            return heuristic_map(lines, fingerprint);
        }
        let size_ceiling = self.config.max_analyzed_file_kb * 1024;
        if source.len() as u64 > size_ceiling {
            debug!(
                "{} exceeds size ceiling ({} bytes), using heuristics",
                path.display(),
                source.len()
            );
            return heuristic_map(lines, fingerprint);
        }
        if is_test_file(path) {
            debug!("{} matches test naming, using heuristics", path.display());
            return heuristic_map(lines, fingerprint);
        }

        let budget = PhaseBudget::from_config(&self.config);

        // Phase 1: parse. A budget exhausted before parsing is a
        // timeout, not a heuristic choice, so the outcome stays Partial
        // with zero analyzed lines.
        if budget.exhausted() {
            let mut map = heuristic_map(lines, fingerprint);
            map.outcome = AnalysisOutcome::Partial { analyzed_through: 0 };
            return map;
        }
        let tree = match parser::parse_source(source, path) {
            Ok(tree) if !parser::has_parse_errors(&tree) => tree,
            Ok(_) => {
                debug!("{}: parse errors, falling back to heuristics", path.display());
                return heuristic_map(lines, fingerprint);
            }
            Err(err) => {
                debug!(
                    "{}: parse failed ({}), falling back to heuristics",
                    path.display(),
                    err
                );
                return heuristic_map(lines, fingerprint);
            }
        };

        // Phase 2: code-map extraction.
        let extraction = classify::extract(&tree, source, &budget, self.config.track_blocks);

        // Phase 3: non-executable-line marking from literal spans.
        let (spans, scanned) = literals::scan_with_budget(lines, Some(&budget));
        let forced = literals::forced_non_executable(&spans);

        let mut executable_lines = extraction.executable_lines;
        executable_lines.retain(|line| !forced.contains(line));
        let mut functions = extraction.functions;

        let mut outcome = AnalysisOutcome::Full;
        if !extraction.complete {
            let analyzed_through = extraction.analyzed_through;
            debug!(
                "{}: extraction budget exhausted at line {}, classifying tail heuristically",
                path.display(),
                analyzed_through
            );
            let tail = heuristics::classify_lines(lines, analyzed_through + 1);
            for line in tail.executable_lines {
                if !forced.contains(&line) {
                    executable_lines.insert(line);
                }
            }
            if functions.is_empty() {
                functions.extend(tail.functions);
            }
            outcome = AnalysisOutcome::Partial { analyzed_through };
        } else if scanned < line_count {
            debug!(
                "{}: literal scan stopped at line {} of {}",
                path.display(),
                scanned,
                line_count
            );
            outcome = AnalysisOutcome::Partial {
                analyzed_through: scanned,
            };
        }

        if functions.is_empty() {
            functions.push(FunctionRecord::main_chunk(line_count));
        }

        CodeMap {
            executable_lines,
            functions,
            blocks: extraction.blocks,
            line_count,
            outcome,
            fingerprint,
        }
    }
}

/// Heuristic-only classification for files the parser never sees.
fn heuristic_map(lines: &[String], fingerprint: u64) -> CodeMap {
    let classification = heuristics::classify_lines(lines, 1);
    let mut functions = classification.functions;
    if functions.is_empty() {
        functions.push(FunctionRecord::main_chunk(lines.len()));
    }
    CodeMap {
        executable_lines: classification.executable_lines,
        functions,
        blocks: Vec::new(),
        line_count: lines.len(),
        outcome: AnalysisOutcome::Heuristic,
        fingerprint,
    }
}

/// Test files are tracked but never statically analyzed.
pub fn is_test_file(path: &Path) -> bool {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    if name.starts_with("test_") || name.ends_with("_test.py") {
        return true;
    }
    path.components()
        .any(|c| matches!(c.as_os_str().to_str(), Some("tests") | Some("test")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::MAIN_CHUNK_NAME;
    use indoc::indoc;
    use std::path::PathBuf;

    fn analyzer() -> StaticAnalyzer {
        StaticAnalyzer::new(CoverageConfig::default())
    }

    #[test]
    fn full_analysis_of_small_module() {
        let source = indoc! {"
            import os

            def greet(name):
                return f'hi {name}'

            greet(os.getenv('USER'))
        "};
        let map = analyzer().analyze_source(&PathBuf::from("app.py"), source);
        assert_eq!(map.outcome, AnalysisOutcome::Full);
        assert!(map.is_executable(1));
        assert!(!map.is_executable(3));
        assert!(map.is_executable(4));
        assert!(map.is_executable(6));
        assert_eq!(map.functions.len(), 1);
        assert_eq!(map.functions[0].name, "greet");
    }

    #[test]
    fn zero_functions_yields_synthetic_main_chunk() {
        let source = "x = 1\ny = x + 1\n";
        let map = analyzer().analyze_source(&PathBuf::from("flat.py"), source);
        assert_eq!(map.functions.len(), 1);
        assert!(map.functions[0].synthetic);
        assert_eq!(map.functions[0].name, MAIN_CHUNK_NAME);
    }

    #[test]
    fn parse_failure_falls_back_to_heuristics() {
        let source = "import os\ndef broken(:\n";
        let map = analyzer().analyze_source(&PathBuf::from("bad.py"), source);
        assert_eq!(map.outcome, AnalysisOutcome::Heuristic);
        assert!(map.is_executable(1));
    }

    #[test]
    fn disabled_static_analysis_uses_heuristics() {
        let config = CoverageConfig {
            use_static_analysis: false,
            ..Default::default()
        };
        let source = "import sys\nx = sys.argv\nprint(x)\n";
        let map =
            StaticAnalyzer::new(config).analyze_source(&PathBuf::from("app.py"), source);
        assert_eq!(map.outcome, AnalysisOutcome::Heuristic);
        assert!(map.is_executable(1));
        assert!(map.is_executable(2));
        // Under-approximation: the call line is not pattern-matched.
        assert!(!map.is_executable(3));
    }

    #[test]
    fn oversized_file_skips_parser() {
        let config = CoverageConfig {
            max_analyzed_file_kb: 0,
            ..Default::default()
        };
        let source = "x = 1\n";
        let map =
            StaticAnalyzer::new(config).analyze_source(&PathBuf::from("big.py"), source);
        assert_eq!(map.outcome, AnalysisOutcome::Heuristic);
    }

    #[test]
    fn test_files_skip_static_analysis() {
        assert!(is_test_file(&PathBuf::from("test_app.py")));
        assert!(is_test_file(&PathBuf::from("app_test.py")));
        assert!(is_test_file(&PathBuf::from("pkg/tests/helpers.py")));
        assert!(!is_test_file(&PathBuf::from("pkg/app.py")));

        let map = analyzer().analyze_source(&PathBuf::from("test_app.py"), "x = 1\n");
        assert_eq!(map.outcome, AnalysisOutcome::Heuristic);
    }

    #[test]
    fn exhausted_budget_yields_partial_map_without_crash() {
        let config = CoverageConfig {
            analysis_budget_ms: 0,
            batch_size: 1,
            ..Default::default()
        };
        let mut source = String::from("import os\n");
        for i in 0..5000 {
            source.push_str(&format!("value_{} = {}\n", i, i));
        }
        let map =
            StaticAnalyzer::new(config).analyze_source(&PathBuf::from("huge.py"), &source);
        assert!(matches!(map.outcome, AnalysisOutcome::Partial { .. }));
        // Heuristic tail still classified the import/setup region.
        assert!(map.is_executable(1));
        assert!(!map.functions.is_empty());
    }

    #[test]
    fn cache_returns_same_map_for_unchanged_content() {
        let mut analyzer = analyzer();
        let path = PathBuf::from("app.py");
        let first = analyzer.analyze_source(&path, "x = 1\n");
        let second = analyzer.analyze_source(&path, "x = 1\n");
        assert!(Arc::ptr_eq(&first, &second));

        let changed = analyzer.analyze_source(&path, "x = 2\n");
        assert!(!Arc::ptr_eq(&first, &changed));
    }

    #[test]
    fn literal_interior_lines_are_forced_non_executable() {
        let source = indoc! {r#"
            x = 1
            doc = """
            y = 99
            """
            z = 2
        "#};
        let map = analyzer().analyze_source(&PathBuf::from("lit.py"), source);
        assert!(map.is_executable(1));
        assert!(map.is_executable(2));
        assert!(!map.is_executable(3));
        assert!(!map.is_executable(4));
        assert!(map.is_executable(5));
    }
}
