//! Core data types shared across the coverage engine.
//!
//! The static analyzer produces a [`CodeMap`] per file; the execution
//! tracker records raw hits into [`FileData`]; reconciliation merges the
//! two. All types here are pure data with no I/O.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use crate::core::errors::{CoverageError, Result};

/// Name used for the synthetic whole-file function when a file defines
/// no functions of its own.
pub const MAIN_CHUNK_NAME: &str = "<main>";

/// How a file's code map was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalysisOutcome {
    /// Placeholder seeded by the tracker; static analysis not yet run
    Pending,
    /// Full static analysis completed within budget
    Full,
    /// Analysis timed out; lines after `analyzed_through` were classified
    /// heuristically
    Partial { analyzed_through: usize },
    /// Heuristic classification only (parse failure, oversized file,
    /// test file, or static analysis disabled)
    Heuristic,
}

/// Control-flow construct kinds tracked for block coverage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockKind {
    /// if / elif / else / match arms
    Branch,
    /// for / while loops
    Loop,
    /// try / except / finally
    Exception,
    /// with statements
    With,
}

/// A function definition found by static analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionRecord {
    /// Declared name, or [`MAIN_CHUNK_NAME`] for the synthetic whole-file
    /// function
    pub name: String,
    pub start_line: usize,
    pub end_line: usize,
    pub params: Vec<String>,
    /// True for the whole-file fallback record
    pub synthetic: bool,
}

impl FunctionRecord {
    /// Synthetic record spanning the whole file, used when no function
    /// definitions were detected.
    pub fn main_chunk(line_count: usize) -> Self {
        Self {
            name: MAIN_CHUNK_NAME.to_string(),
            start_line: 1,
            end_line: line_count.max(1),
            params: Vec::new(),
            synthetic: true,
        }
    }

    /// Key used to correlate runtime call events with this record.
    pub fn key(&self) -> (usize, String) {
        (self.start_line, self.name.clone())
    }
}

/// A control-flow block found by static analysis. Blocks form a tree via
/// `parent_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRecord {
    pub id: u32,
    pub kind: BlockKind,
    pub start_line: usize,
    pub end_line: usize,
    pub parent_id: Option<u32>,
}

/// Static-analysis output for one file.
///
/// Created once per (path, content fingerprint) and read-only afterwards;
/// the cache invalidates entries when the fingerprint changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeMap {
    /// Ordered executable line numbers (1-indexed)
    pub executable_lines: BTreeSet<usize>,
    pub functions: Vec<FunctionRecord>,
    pub blocks: Vec<BlockRecord>,
    pub line_count: usize,
    pub outcome: AnalysisOutcome,
    /// xxh64 of the source text this map was built from
    pub fingerprint: u64,
}

impl CodeMap {
    /// Empty placeholder attached when the tracker sees a file before
    /// the analyzer has run.
    pub fn pending(line_count: usize, fingerprint: u64) -> Self {
        Self {
            executable_lines: BTreeSet::new(),
            functions: Vec::new(),
            blocks: Vec::new(),
            line_count,
            outcome: AnalysisOutcome::Pending,
            fingerprint,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.outcome == AnalysisOutcome::Pending
    }

    pub fn is_executable(&self, line: usize) -> bool {
        self.executable_lines.contains(&line)
    }

    /// Check the line-range invariant: every referenced line must fall
    /// within `[1, line_count]`.
    pub fn validate(&self) -> Result<()> {
        let in_range = |line: usize| line >= 1 && line <= self.line_count.max(1);
        let bad_line = self
            .executable_lines
            .iter()
            .copied()
            .find(|&l| !in_range(l))
            .or_else(|| {
                self.functions
                    .iter()
                    .flat_map(|f| [f.start_line, f.end_line])
                    .find(|&l| !in_range(l))
            })
            .or_else(|| {
                self.blocks
                    .iter()
                    .flat_map(|b| [b.start_line, b.end_line])
                    .find(|&l| !in_range(l))
            });
        match bad_line {
            Some(line) => Err(CoverageError::InvariantViolation {
                file: PathBuf::new(),
                line,
            }),
            None => Ok(()),
        }
    }
}

/// Per-file runtime coverage state.
///
/// `hits` holds "covered" marks, `executed` holds raw "seen running"
/// marks. The two are distinguished because a line can execute and later
/// be found non-executable (e.g. inside a multi-line string literal);
/// reconciliation clears the hit mark but keeps the executed mark.
/// `executable` is authoritative only after reconciliation.
#[derive(Debug, Clone)]
pub struct FileData {
    pub path: PathBuf,
    /// Raw source text as read from disk
    pub source: String,
    /// Source split into lines, kept for literal re-scanning and report
    /// projection
    pub lines: Vec<String>,
    pub line_count: usize,
    /// Line -> covered flag, subject to reconciliation
    pub hits: BTreeMap<usize, bool>,
    /// Line -> raw executed flag, never cleared by reconciliation
    pub executed: BTreeMap<usize, bool>,
    /// Line -> executable flag, authoritative after reconciliation
    pub executable: BTreeMap<usize, bool>,
    /// (start_line, name) -> call count
    pub function_hits: HashMap<(usize, String), u64>,
    /// Call-event lines seen while the code map was still pending,
    /// replayed by reconciliation once functions are known
    pub pending_calls: BTreeSet<usize>,
    /// Block id -> executed flag
    pub block_executed: HashMap<u32, bool>,
    /// True when the file was found by directory scan with zero
    /// executions
    pub discovered: bool,
    /// Shared reference into the analyzer's cache
    pub code_map: Arc<CodeMap>,
}

impl FileData {
    /// Build file state from raw source text with a pending code map.
    pub fn from_source(path: impl Into<PathBuf>, source: &str, fingerprint: u64) -> Self {
        let lines: Vec<String> = source.lines().map(str::to_string).collect();
        let line_count = lines.len();
        Self {
            path: path.into(),
            source: source.to_string(),
            lines,
            line_count,
            hits: BTreeMap::new(),
            executed: BTreeMap::new(),
            executable: BTreeMap::new(),
            function_hits: HashMap::new(),
            pending_calls: BTreeSet::new(),
            block_executed: HashMap::new(),
            discovered: false,
            code_map: Arc::new(CodeMap::pending(line_count, fingerprint)),
        }
    }

    /// Record a raw line event. The line is marked both hit and executed;
    /// executability is decided later by reconciliation.
    pub fn record_line(&mut self, line: usize) {
        self.hits.insert(line, true);
        self.executed.insert(line, true);
    }

    /// Record a raw call event. With a code map attached the matching
    /// function is credited directly; otherwise the line is buffered so
    /// reconciliation can replay it once functions are known.
    pub fn record_call(&mut self, line: usize) {
        if self.code_map.is_pending() {
            self.pending_calls.insert(line);
            return;
        }
        if let Some(func) = self
            .code_map
            .functions
            .iter()
            .find(|f| f.start_line <= line && line <= f.end_line)
        {
            *self.function_hits.entry(func.key()).or_insert(0) += 1;
        }
    }

    pub fn is_hit(&self, line: usize) -> bool {
        self.hits.get(&line).copied().unwrap_or(false)
    }

    pub fn is_executable(&self, line: usize) -> bool {
        self.executable.get(&line).copied().unwrap_or(false)
    }

    /// Clear all runtime marks while keeping source text and code map.
    pub fn clear_runtime_state(&mut self) {
        self.hits.clear();
        self.executed.clear();
        self.function_hits.clear();
        self.pending_calls.clear();
        self.block_executed.clear();
    }

    /// Lines that are both hit and executable. Valid after
    /// reconciliation.
    pub fn covered_line_count(&self) -> usize {
        self.hits
            .iter()
            .filter(|(line, &hit)| hit && self.is_executable(**line))
            .count()
    }
}
