//! Error taxonomy for the inspection engine.
//!
//! Everything except [`InspectError::ExternalTool`] aborts an inspection. Collaborator
//! failures inside the references / implementers / call-hierarchy sections are rendered
//! inline by the formatter instead of being propagated.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, InspectError>;

#[derive(Debug, Error)]
pub enum InspectError {
    /// Malformed target string, bad argument, or missing/relative workspace root.
    #[error("invalid target: {0}")]
    InvalidTarget(String),

    #[error("file not found: {}{}", .path.display(), searched_hint(.searched))]
    FileNotFound {
        path: PathBuf,
        searched: Option<PathBuf>,
    },

    #[error("module not found: {0}")]
    ModuleNotFound(String),

    #[error("module has no eligible source files: {}", .0.display())]
    NoSourceFiles(PathBuf),

    /// The parser produced no tree at all. Trees with syntax errors are not failures.
    #[error("failed to parse file {}: {reason}", .path.display())]
    ParseFailure { path: PathBuf, reason: String },

    #[error("symbol '{symbol}' not found in {scope}")]
    SymbolNotFound { symbol: String, scope: String },

    #[error("no symbol found at line {line} in {}", .path.display())]
    NoDeclarationAtLine { path: PathBuf, line: usize },

    #[error("symbol '{symbol}' not found at a word boundary at line {line} in {}: {detail}", .path.display())]
    PositionNotFound {
        path: PathBuf,
        line: usize,
        symbol: String,
        detail: String,
    },

    #[error("{tool} {command} failed: {message}")]
    ExternalTool {
        tool: String,
        command: String,
        message: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn searched_hint(searched: &Option<PathBuf>) -> String {
    match searched {
        Some(root) => format!(" (searched relative to {})", root.display()),
        None => String::new(),
    }
}

impl InspectError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        InspectError::InvalidTarget(msg.into())
    }

    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        InspectError::FileNotFound {
            path: path.into(),
            searched: None,
        }
    }

    /// Map an I/O error on `path` to `FileNotFound` when the file is missing.
    pub fn from_io(path: &std::path::Path, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            InspectError::file_not_found(path)
        } else {
            InspectError::Io(err)
        }
    }
}
