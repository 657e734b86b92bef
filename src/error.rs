//! Error types for the form export fixer

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the form export fixer library
#[derive(Error, Debug)]
pub enum Error {
    /// PDF processing error
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// IO error tied to a specific path
    #[error("IO error at {}: {source}", .path.display())]
    IoAt {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Xref file could not be read as CSV
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Invalid glob pattern
    #[error("Invalid glob pattern: {0}")]
    InvalidGlob(#[from] glob::PatternError),

    /// File not found
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Directory not found
    #[error("Directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    /// Invalid PDF (no pages)
    #[error("PDF has no pages: {}", .0.display())]
    EmptyPdf(PathBuf),

    /// Xref row that could not be turned into an append task
    #[error("Malformed xref row at line {line}: {detail}")]
    MalformedRow { line: u64, detail: String },

    /// General error
    #[error("{0}")]
    General(String),
}

impl Error {
    /// Build a closure that attaches `path` to an IO error, for use with `map_err`
    pub(crate) fn io_at(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Error {
        let path = path.into();
        move |source| Error::IoAt { path, source }
    }
}
