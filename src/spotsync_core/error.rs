use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpotsyncError {
    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to move {source_path} -> {destination}: {error}")]
    MoveFailed {
        source_path: PathBuf,
        destination: PathBuf,
        error: std::io::Error,
    },

    #[error("Directory walker error: {0}")]
    Walkdir(#[from] walkdir::Error),

    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid config file {path}: {reason}")]
    Config { path: PathBuf, reason: String },

    // Metadata errors
    #[error("Exiftool error: {0}")]
    Exiftool(String),

    #[error("Failed to extract metadata from {path}: {reason}")]
    MetadataExtraction { path: PathBuf, reason: String },

    // Remote drive errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Drive API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Folder '{segment}' not found in Drive (resolving '{path}')")]
    PathResolution { segment: String, path: String },

    // Authorization errors
    #[error("Client secret file not found: {0}")]
    MissingClientSecret(PathBuf),

    #[error("Authorization error: {0}")]
    Auth(String),

    // Subprocess steps
    #[error("{step} failed: {detail}")]
    Task { step: String, detail: String },

    // Generic errors
    #[error("Argument error: {0}")]
    Argument(String),
}

/// Result type for spotsync operations.
pub type Result<T> = std::result::Result<T, SpotsyncError>;
