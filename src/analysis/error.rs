//! Error types for alignment and primer design

use thiserror::Error;

/// Errors raised by the alignment engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AlignError {
    /// A sequence byte has no finite self-score in the scoring matrix.
    #[error("illegal character in input: {0}")]
    IllegalCharacter(char),

    /// The final score does not fit the 16-bit signed range.
    #[error("alignment score {0} out of 16-bit range")]
    ScoreOverflow(i32),

    /// The cost of the longest possible gap does not fit in `i32`.
    #[error("gap penalty {gap} + {gap_extend} per extension overflows for gaps up to {length}")]
    GapPenaltyOverflow {
        gap: i32,
        gap_extend: i32,
        /// Longest gap the request allows.
        length: usize,
    },

    /// Path reconstruction was requested for a sequence above the table limit.
    #[error("sequence of length {len} too long for path reconstruction (max {max})")]
    SequenceTooLong {
        /// Length of the offending sequence.
        len: usize,
        /// Largest supported length.
        max: usize,
    },
}

/// Errors surfaced to callers of the design entry points.
#[derive(Debug, Error)]
pub enum DesignError {
    /// Propagated from the alignment engine.
    #[error(transparent)]
    Align(#[from] AlignError),

    /// The configuration violates one of its own constraints.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The template or its annotations are malformed.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A repeat library could not be read.
    #[error("repeat library: {0}")]
    Library(String),

    /// Configuration JSON could not be parsed.
    #[error("configuration parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// The worker pool could not be created.
    #[error("thread pool: {0}")]
    ThreadPool(String),
}
