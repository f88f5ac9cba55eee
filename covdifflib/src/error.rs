//! Error types for covdifflib

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while annotating, merging or summarizing coverage
#[derive(Error, Debug)]
pub enum CovdiffError {
    /// Failed to read a file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Invalid glob pattern
    #[error("invalid glob pattern '{pattern}': {message}")]
    InvalidGlob { pattern: String, message: String },

    /// Path does not exist
    #[error("path does not exist: {0}")]
    PathNotFound(PathBuf),

    /// A derivation ran before the annotations it depends on were computed
    #[error("{operation} requires annotations that are missing: {}", missing.join(", "))]
    MissingAnnotations {
        operation: String,
        missing: Vec<String>,
    },

    /// A file required to be present in the old profile is absent
    #[error("file '{0}' is missing from the old profile")]
    MissingOldFile(String),

    /// An unchanged range has a different length on each side
    #[error(
        "unchanged range length mismatch: old {old_start}..{old_end} vs new {new_start}..{new_end}"
    )]
    RangeMismatch {
        old_start: usize,
        old_end: usize,
        new_start: usize,
        new_end: usize,
    },

    /// Line changes are out of order or overlap
    #[error("line change out of order at old line {old_line}, new line {new_line}")]
    LineChangeOrder { old_line: usize, new_line: usize },

    /// An unchanged file has a different number of counters in each profile
    #[error("counter count mismatch for unchanged file '{file}': old has {old}, new has {new}")]
    CounterCountMismatch {
        file: String,
        old: usize,
        new: usize,
    },

    /// Integer and per-label counters were combined
    #[error("cannot combine integer and labelled counters for '{0}'")]
    CounterKindMismatch(String),

    /// A coverage profile line does not match the expected grammar
    #[error("invalid coverage profile at line {line}: {message}")]
    ProfileParse { line: usize, message: String },

    /// The syntax tree contains a node the extractor does not handle
    #[error("unhandled syntax node '{kind}' at byte offset {offset}")]
    UnhandledNode { kind: String, offset: usize },

    /// The `else` keyword could not be located after an `if` body
    #[error("cannot find 'else' keyword after byte offset {0}")]
    LostElse(usize),

    /// The external diff backend did not answer in time
    #[error("diff request {request_id} timed out after {timeout:?}")]
    DiffTimeout { request_id: u64, timeout: Duration },

    /// The external diff backend failed or exited
    #[error("diff backend error: {0}")]
    DiffBackend(String),

    /// The worker pool could not be started
    #[error("failed to start worker pool: {0}")]
    WorkerPool(String),

    /// JSON encoding or decoding failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Git operation error
    #[error("git error: {0}")]
    GitError(String),
}

impl CovdiffError {
    /// Wrap an IO error with the path that produced it
    pub fn file_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CovdiffError::FileRead {
            path: path.into(),
            source,
        }
    }
}
