//! Error type shared by the library.
//!
//! Only `Config`, `InvalidThresholds`, `ConfigDecode` and a `Database` failure while
//! opening the reference database are fatal to a run. Everything else is scoped to
//! the file or folder it came from.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TaggerError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Invalid thresholds: review ({review}) must not exceed auto-apply ({auto_apply}), both within 0..=100")]
    InvalidThresholds { auto_apply: u8, review: u8 },
    #[error("Could not decode configuration: {0}")]
    ConfigDecode(#[from] toml::de::Error),
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Tag error for {path}: {message}")]
    Tag { path: PathBuf, message: String },
    #[error("Malformed line {line} in {path}: {reason}")]
    MalformedLine {
        path: PathBuf,
        line: usize,
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, TaggerError>;
