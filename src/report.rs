//! Aggregation of reconciled file data into a statistics snapshot.
//!
//! `aggregate` is the engine's output contract: a frozen
//! [`CoverageStatistics`] record consumed by report renderers. It runs
//! one defensive reconciliation pass first, and re-filters covered lines
//! against executability on its own so stale data can never inflate a
//! percentage.

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::core::{AnalysisOutcome, FileData};
use crate::reconcile;
use crate::session::Session;

/// Covered/total pair with a derived percentage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Tally {
    pub covered: usize,
    pub total: usize,
    pub percent: f64,
}

impl Tally {
    pub fn new(covered: usize, total: usize) -> Self {
        let percent = if total == 0 {
            0.0
        } else {
            covered as f64 / total as f64 * 100.0
        };
        Self {
            covered,
            total,
            percent,
        }
    }
}

/// Per-file breakdown.
#[derive(Debug, Clone, Serialize)]
pub struct FileStatistics {
    pub path: PathBuf,
    pub lines: Tally,
    pub functions: Tally,
    pub blocks: Tally,
    pub passes_threshold: bool,
    pub discovered: bool,
    pub analysis: AnalysisOutcome,
}

/// Line-level markers for one source line, for downstream rendering.
#[derive(Debug, Clone, Serialize)]
pub struct LineMark {
    pub line: usize,
    pub text: String,
    pub executable: bool,
    pub executed: bool,
    pub covered: bool,
}

/// Source text plus line markers for one file.
#[derive(Debug, Clone, Serialize)]
pub struct SourceProjection {
    pub path: PathBuf,
    pub lines: Vec<LineMark>,
}

/// Global summary over all files.
#[derive(Debug, Clone, Serialize)]
pub struct GlobalSummary {
    pub lines: Tally,
    pub functions: Tally,
    pub blocks: Tally,
    pub overall_percent: f64,
    pub files_total: usize,
    pub files_passing: usize,
    pub passes_threshold: bool,
}

/// Immutable snapshot of session coverage, computed on demand.
#[derive(Debug, Clone, Serialize)]
pub struct CoverageStatistics {
    pub files: BTreeMap<PathBuf, FileStatistics>,
    pub summary: GlobalSummary,
    pub original_files: Vec<SourceProjection>,
}

/// Compute statistics for the session. Reconciliation runs first so the
/// executability invariant holds on whatever state the session is in.
pub fn aggregate(session: &mut Session) -> CoverageStatistics {
    reconcile::reconcile(session);

    let threshold = session.config.threshold;
    let track_blocks = session.config.track_blocks;
    let weights = session.config.overall_weights;

    let mut files = BTreeMap::new();
    let mut original_files = Vec::new();
    let mut line_covered = 0;
    let mut line_total = 0;
    let mut func_covered = 0;
    let mut func_total = 0;
    let mut block_covered = 0;
    let mut block_total = 0;

    let mut ordered: Vec<&FileData> = session.files.values().collect();
    ordered.sort_by(|a, b| a.path.cmp(&b.path));

    for data in ordered {
        let stats = file_statistics(data, threshold);
        line_covered += stats.lines.covered;
        line_total += stats.lines.total;
        func_covered += stats.functions.covered;
        func_total += stats.functions.total;
        block_covered += stats.blocks.covered;
        block_total += stats.blocks.total;
        original_files.push(project_source(data));
        files.insert(data.path.clone(), stats);
    }

    let lines = Tally::new(line_covered, line_total);
    let functions = Tally::new(func_covered, func_total);
    let blocks = Tally::new(block_covered, block_total);
    let overall_percent = overall_score(
        lines.percent,
        functions.percent,
        blocks.percent,
        track_blocks && block_total > 0,
        weights,
    );
    let files_passing = files.values().filter(|f| f.passes_threshold).count();

    CoverageStatistics {
        summary: GlobalSummary {
            lines,
            functions,
            blocks,
            overall_percent,
            files_total: files.len(),
            files_passing,
            passes_threshold: overall_percent >= threshold,
        },
        files,
        original_files,
    }
}

/// Weighted overall score. With block tracking active and at least one
/// block anywhere, blocks dominate; otherwise lines carry most of the
/// weight.
pub fn overall_score(
    line_pct: f64,
    func_pct: f64,
    block_pct: f64,
    use_blocks: bool,
    weights: crate::config::OverallWeights,
) -> f64 {
    if use_blocks {
        weights.line * line_pct + weights.function * func_pct + weights.block * block_pct
    } else {
        0.8 * line_pct + 0.2 * func_pct
    }
}

fn file_statistics(data: &FileData, threshold: f64) -> FileStatistics {
    let executable_count = data.executable.values().filter(|&&v| v).count();
    // Defensive re-filter: count only hits that are also executable,
    // even though reconciliation already guarantees it.
    let covered_count = data
        .hits
        .iter()
        .filter(|(line, &hit)| hit && data.executable.get(*line).copied().unwrap_or(false))
        .count();

    let func_total = data.code_map.functions.len();
    let func_covered = data
        .code_map
        .functions
        .iter()
        .filter(|f| data.function_hits.get(&f.key()).copied().unwrap_or(0) > 0)
        .count();

    let block_total = data.code_map.blocks.len();
    let block_covered = data
        .code_map
        .blocks
        .iter()
        .filter(|b| data.block_executed.get(&b.id).copied().unwrap_or(false))
        .count();

    let lines = Tally::new(covered_count, executable_count);
    FileStatistics {
        path: data.path.clone(),
        passes_threshold: lines.percent >= threshold,
        lines,
        functions: Tally::new(func_covered, func_total),
        blocks: Tally::new(block_covered, block_total),
        discovered: data.discovered,
        analysis: data.code_map.outcome,
    }
}

fn project_source(data: &FileData) -> SourceProjection {
    let lines = data
        .lines
        .iter()
        .enumerate()
        .map(|(idx, text)| {
            let line = idx + 1;
            let executable = data.executable.get(&line).copied().unwrap_or(false);
            let executed = data.executed.get(&line).copied().unwrap_or(false);
            let covered = executable && data.hits.get(&line).copied().unwrap_or(false);
            LineMark {
                line,
                text: text.clone(),
                executable,
                executed,
                covered,
            }
        })
        .collect();
    SourceProjection {
        path: data.path.clone(),
        lines,
    }
}
