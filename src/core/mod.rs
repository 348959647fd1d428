pub mod errors;
pub mod types;

pub use errors::{AnalysisPhase, CoverageError, Result};
pub use types::{
    AnalysisOutcome, BlockKind, BlockRecord, CodeMap, FileData, FunctionRecord, MAIN_CHUNK_NAME,
};
