//! Error types for corpus and range files

use std::num::ParseFloatError;
use std::path::PathBuf;
use thiserror::Error;

/// Failure while reading or writing a corpus model file.
///
/// Every variant is fatal for the engine: a corpus that cannot be loaded
/// stops the process before real-time processing starts.
#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("failed to open corpus file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to create corpus file {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corpus I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corpus file contains no windows")]
    Empty,

    #[error("line {line}: no feature columns after filename and start time")]
    NoCoefficients { line: usize },

    #[error("line {line}: expected {expected} columns, found {found}")]
    ColumnCount {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("line {line}: invalid number {token:?}: {source}")]
    Parse {
        line: usize,
        token: String,
        #[source]
        source: ParseFloatError,
    },

    #[error("source path {0:?} contains whitespace and cannot be stored in a model file")]
    InvalidPath(String),
}

/// Failure while reading or writing a min/max range file.
#[derive(Debug, Error)]
pub enum RangeError {
    #[error("failed to open range file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to create range file {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("range I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: expected `<min> <max>`, found {found} columns")]
    Malformed { line: usize, found: usize },

    #[error("line {line}: invalid number {token:?}: {source}")]
    Parse {
        line: usize,
        token: String,
        #[source]
        source: ParseFloatError,
    },

    #[error("range file has {found} dimensions, expected {expected}")]
    LineCount { expected: usize, found: usize },
}

/// Failure of the offline normalization tool.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error(transparent)]
    Corpus(#[from] CorpusError),

    #[error(transparent)]
    Range(#[from] RangeError),
}
