//! Error types for value marshaling and engine calls

use std::ffi::NulError;
use std::path::PathBuf;

use thiserror::Error;

use crate::var::{VResult, VarType};

/// Errors raised by `Var` and `ScopedVar` accessors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VarError {
    /// Accessor does not match the active payload
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: VarType, found: VarType },

    /// String payload could not be allocated
    #[error("out of memory allocating a {len} byte string")]
    OutOfMemory { len: usize },

    /// Raw discriminant outside the known `VAR_TYPE` codes
    #[error("unknown variant type code {code}")]
    BadType { code: i32 },
}

/// Errors raised by the call adapter
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Var(#[from] VarError),

    /// Database failed to load; `text` is the engine's diagnostic output
    #[error("failed to load database '{path}' ({errors} error(s)): {text}")]
    Load {
        path: String,
        errors: usize,
        text: String,
    },

    /// Input failed to parse or run; `text` is the engine's diagnostic output
    #[error("run failed with {errors} error(s): {text}")]
    Run { errors: usize, text: String },

    #[error("engine out of memory")]
    OutOfMemory,

    #[error("bad variant type")]
    BadType,

    #[error("invalid argument: {0}")]
    InvalidArg(String),

    #[error("row {row} out of range for selected output with {rows} row(s)")]
    InvalidRow { row: usize, rows: usize },

    #[error("column {col} out of range for selected output with {cols} column(s)")]
    InvalidCol { col: usize, cols: usize },

    #[error("invalid IPhreeqc instance {0}")]
    BadInstance(i32),

    #[error("unknown engine result code {0}")]
    UnknownCode(i32),

    #[error("failed to load library '{}': {message}", .path.display())]
    Library { path: PathBuf, message: String },

    #[error("symbol '{name}' not found: {message}")]
    Symbol { name: &'static str, message: String },

    #[error("string contains an interior NUL byte: {0}")]
    Nul(#[from] NulError),

    #[error("path is not valid UTF-8: {0:?}")]
    Path(PathBuf),

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl Error {
    /// Status code equivalent used by host-facing surfaces
    pub fn vresult(&self) -> VResult {
        match self {
            Error::Var(VarError::OutOfMemory { .. }) | Error::OutOfMemory => VResult::OutOfMemory,
            Error::Var(_) | Error::BadType => VResult::BadVarType,
            Error::InvalidRow { .. } => VResult::InvalidRow,
            Error::InvalidCol { .. } => VResult::InvalidCol,
            _ => VResult::InvalidArg,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
