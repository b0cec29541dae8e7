//! Error types for the stamping pipeline.

use std::path::PathBuf;
use thiserror::Error;

use crate::model::Position;

/// Main error type for the stamping pipeline.
#[derive(Debug, Error)]
pub enum StampingError {
    #[error("File not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    #[error("No stamp variables configured")]
    NoVariablesConfigured,

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Parse error at line {position}: {message}")]
    Parse { position: Position, message: String },

    #[error("Pipe closed: no more lines can be added")]
    PipeClosed,

    #[error("Pipe already completed")]
    PipeCompleted,

    #[error("Resolve position {requested} does not advance past {resolved}")]
    PositionRegression {
        requested: Position,
        resolved: Position,
    },

    #[error("Resolve position {requested} is beyond the read cursor {cursor}")]
    PositionBeyondCursor {
        requested: Position,
        cursor: Position,
    },

    #[error("Handler '{handler}' failed: {message}")]
    Handler { handler: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for stamping operations.
pub type Result<T> = std::result::Result<T, StampingError>;
