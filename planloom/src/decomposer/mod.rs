//! BFS Plan Decomposer (C4, spec §4.4).

pub mod bfs;
pub mod prompt;
pub mod schema;

pub use bfs::{decompose, DecomposeMode, DecomposeOutcome, DecomposerConfig, DecomposerError, StoppedReason};
