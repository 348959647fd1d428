//! covmap: a source-level coverage engine for Python.
//!
//! The engine classifies every line of a source file as executable or
//! not via static analysis, records which lines and functions actually
//! ran from host-runtime events, reconciles the two to strip false
//! coverage, and aggregates trustworthy percentages across a project.
//!
//! It does not execute test code, glob directories, or render reports;
//! those collaborators feed it paths and events and consume the
//! [`report::CoverageStatistics`] snapshot it produces.

pub mod analyzer;
pub mod config;
pub mod core;
pub mod discovery;
pub mod io;
pub mod reconcile;
pub mod report;
pub mod session;
pub mod tracker;

// Re-export commonly used types
pub use crate::config::{CoverageConfig, OverallWeights};
pub use crate::core::{
    AnalysisOutcome, AnalysisPhase, BlockKind, BlockRecord, CodeMap, CoverageError, FileData,
    FunctionRecord, Result,
};
pub use crate::discovery::{discover_uncovered, FileDiscovery};
pub use crate::report::{aggregate, CoverageStatistics, FileStatistics, GlobalSummary, Tally};
pub use crate::session::Session;
pub use crate::tracker::{EventSource, ExecEvent, NullEventSource};

pub use crate::analyzer::StaticAnalyzer;
pub use crate::reconcile::reconcile;
