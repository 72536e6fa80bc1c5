//! Error taxonomy for the memory engine.

use crate::node::{NodeRef, Relation};
use std::fmt;
use std::path::PathBuf;

/// A grammar violation found while reading mindmap text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// 1-based line number, 0 when the problem is not tied to a line.
    pub line: usize,
    /// The offending text as it appeared in the input.
    pub fragment: String,
    pub message: String,
}

impl ParseError {
    pub fn new(line: usize, fragment: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            line,
            fragment: fragment.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.line == 0 {
            write!(f, "{}", self.message)
        } else {
            write!(f, "line {}: {} (`{}`)", self.line, self.message, self.fragment)
        }
    }
}

impl std::error::Error for ParseError {}

/// Errors raised by the engine.
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("malformed mindmap: {0}")]
    Parse(ParseError),

    #[error("consolidation failed: {0}")]
    ConsolidateFailed(ParseError),

    #[error("corrupt store at {}: {reason}", path.display())]
    CorruptStore { path: PathBuf, reason: String },

    #[error("memory for `{identity}` is busy after {attempts} attempts")]
    ConcurrencyConflict { identity: String, attempts: u32 },

    #[error("invalid {what}: {reason}")]
    Validation { what: &'static str, reason: String },

    #[error("{from} may not hold a {relation:?} link to {to}")]
    LayerViolation {
        from: NodeRef,
        to: NodeRef,
        relation: Relation,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("failed to encode network: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
}

/// Stable, caller-facing classification of a [`MemoryError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Parse,
    ConsolidateFailed,
    CorruptStore,
    ConcurrencyConflict,
    Validation,
    Io,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Parse => "parse",
            ErrorKind::ConsolidateFailed => "consolidate_failed",
            ErrorKind::CorruptStore => "corrupt_store",
            ErrorKind::ConcurrencyConflict => "concurrency_conflict",
            ErrorKind::Validation => "validation",
            ErrorKind::Io => "io",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl MemoryError {
    pub fn validation(what: &'static str, reason: impl Into<String>) -> Self {
        MemoryError::Validation {
            what,
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            MemoryError::NotFound(_) => ErrorKind::NotFound,
            MemoryError::Parse(_) => ErrorKind::Parse,
            MemoryError::ConsolidateFailed(_) => ErrorKind::ConsolidateFailed,
            MemoryError::CorruptStore { .. } => ErrorKind::CorruptStore,
            MemoryError::ConcurrencyConflict { .. } => ErrorKind::ConcurrencyConflict,
            MemoryError::Validation { .. } | MemoryError::LayerViolation { .. } => {
                ErrorKind::Validation
            }
            MemoryError::Io(_) | MemoryError::Encode(_) => ErrorKind::Io,
        }
    }

    /// The offending mindmap fragment, for parse-class failures.
    pub fn fragment(&self) -> Option<&str> {
        match self {
            MemoryError::Parse(e) | MemoryError::ConsolidateFailed(e) => Some(&e.fragment),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, MemoryError>;
