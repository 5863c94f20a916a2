use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("OCR failed: {0}")]
    Ocr(String),

    #[error("explanation service returned {status}: {message}")]
    Service { status: u16, message: String },

    #[error("hand tracking failed: {0}")]
    HandTracking(String),

    #[error("failed to encode capture raster: {0}")]
    Raster(String),

    #[error("unsupported {what} schemaVersion: expected {expected}, got {found}")]
    Schema {
        what: &'static str,
        expected: u32,
        found: u32,
    },

    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0} thread panicked")]
    WorkerPanicked(&'static str),

    #[error("{0}")]
    InvalidInput(String),
}

impl ReaderError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ReaderError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        ReaderError::Json {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, ReaderError>;
