//! Coverage engine configuration.
//!
//! Supplied by the CLI/config collaborator; the engine only validates
//! and consumes it.

use serde::{Deserialize, Serialize};

/// Weights for the global overall-coverage score.
///
/// The 0.35/0.15/0.5 split weights blocks highest because they best
/// capture branch-level correctness. This is policy, not an invariant,
/// so it is configurable.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OverallWeights {
    #[serde(default = "default_line_weight")]
    pub line: f64,
    #[serde(default = "default_function_weight")]
    pub function: f64,
    #[serde(default = "default_block_weight")]
    pub block: f64,
}

impl Default for OverallWeights {
    fn default() -> Self {
        Self {
            line: default_line_weight(),
            function: default_function_weight(),
            block: default_block_weight(),
        }
    }
}

impl OverallWeights {
    fn is_valid_weight(weight: f64) -> bool {
        (0.0..=1.0).contains(&weight)
    }

    /// Validate that each weight is in range and the three sum to 1.0
    /// (with floating-point tolerance).
    pub fn validate(&self) -> Result<(), String> {
        for (weight, name) in [
            (self.line, "line"),
            (self.function, "function"),
            (self.block, "block"),
        ] {
            if !Self::is_valid_weight(weight) {
                return Err(format!("{} weight must be between 0.0 and 1.0", name));
            }
        }
        let sum = self.line + self.function + self.block;
        if (sum - 1.0).abs() > 0.001 {
            return Err(format!(
                "overall weights must sum to 1.0, but sum to {:.3}",
                sum
            ));
        }
        Ok(())
    }
}

/// Full coverage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageConfig {
    /// Master switch; a disabled session records nothing
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Directories scanned by the discovery collaborator
    #[serde(default = "default_source_dirs")]
    pub source_dirs: Vec<String>,

    /// Glob patterns a file must match to be tracked
    #[serde(default = "default_include")]
    pub include: Vec<String>,

    /// Glob patterns that exclude a file even when included
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Minimum line percentage for a file to pass (0-100)
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    /// Run the AST-based analyzer; heuristics-only when false
    #[serde(default = "default_true")]
    pub use_static_analysis: bool,

    /// Track control-flow blocks in addition to lines and functions
    #[serde(default = "default_true")]
    pub track_blocks: bool,

    /// Cache code maps keyed by path and content fingerprint
    #[serde(default = "default_true")]
    pub cache_parsed_files: bool,

    /// Analyze files as they are first seen rather than at session stop
    #[serde(default)]
    pub pre_analyze_files: bool,

    /// Seed zero-coverage entries for files found only by directory scan
    #[serde(default = "default_true")]
    pub discover_uncovered: bool,

    /// Wall-clock budget for the analysis phases of a single file
    #[serde(default = "default_analysis_budget_ms")]
    pub analysis_budget_ms: u64,

    /// Lines processed between budget checks
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Files larger than this skip static analysis entirely
    #[serde(default = "default_max_analyzed_file_kb")]
    pub max_analyzed_file_kb: u64,

    #[serde(default)]
    pub overall_weights: OverallWeights,
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            source_dirs: default_source_dirs(),
            include: default_include(),
            exclude: Vec::new(),
            threshold: default_threshold(),
            use_static_analysis: true,
            track_blocks: true,
            cache_parsed_files: true,
            pre_analyze_files: false,
            discover_uncovered: true,
            analysis_budget_ms: default_analysis_budget_ms(),
            batch_size: default_batch_size(),
            max_analyzed_file_kb: default_max_analyzed_file_kb(),
            overall_weights: OverallWeights::default(),
        }
    }
}

impl CoverageConfig {
    fn validate_threshold(threshold: f64) -> Result<(), String> {
        if (0.0..=100.0).contains(&threshold) {
            Ok(())
        } else {
            Err(format!(
                "threshold must be between 0 and 100, got {}",
                threshold
            ))
        }
    }

    fn validate_batch_size(batch_size: usize) -> Result<(), String> {
        if batch_size == 0 {
            Err("batch_size must be positive".to_string())
        } else {
            Ok(())
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        Self::validate_threshold(self.threshold)?;
        Self::validate_batch_size(self.batch_size)?;
        self.overall_weights.validate()
    }
}

fn default_true() -> bool {
    true
}

fn default_source_dirs() -> Vec<String> {
    vec![".".to_string()]
}

fn default_include() -> Vec<String> {
    vec!["**/*.py".to_string()]
}

fn default_threshold() -> f64 {
    90.0
}

fn default_analysis_budget_ms() -> u64 {
    3000
}

fn default_batch_size() -> usize {
    100
}

fn default_max_analyzed_file_kb() -> u64 {
    256
}

fn default_line_weight() -> f64 {
    0.35
}

fn default_function_weight() -> f64 {
    0.15
}

fn default_block_weight() -> f64 {
    0.5
}
