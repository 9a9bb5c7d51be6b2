//! Error types for the exreport library.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for exreport operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while loading, filling or composing documents.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A referenced template, record or document does not exist.
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    /// One or more inputs of a multi-file operation do not exist.
    #[error("Missing input documents: {}", display_paths(.0))]
    MissingInputs(Vec<PathBuf>),

    /// Record text is not valid JSON.
    #[error("Invalid JSON: {0}")]
    Json(String),

    /// Record content is valid JSON but not a flat object.
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// The package is not a WordprocessingML document.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Error reading or writing the ZIP archive.
    #[error("ZIP archive error: {0}")]
    ZipArchive(String),

    /// Error parsing or writing XML content.
    #[error("XML parse error: {0}")]
    XmlParse(String),

    /// A required package part is missing.
    #[error("Missing component: {0}")]
    MissingComponent(String),

    /// Invalid or inconsistent data.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Shortlist candidates without an assessment record.
    #[error("Missing assessments for: {}", .0.join(", "))]
    MissingAssessment(Vec<String>),
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        Error::ZipArchive(err.to_string())
    }
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::XmlParse(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err.to_string())
    }
}
