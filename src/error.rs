//! Error types shared by the loader, the store and the report pipeline.
//!
//! Bad cells never show up here: the loader turns them into nulls. Only
//! structural problems (unreadable file, bad payload, bad positions, an
//! empty filtered dataset) reach the caller.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Could not decode data file with any supported encoding")]
    Encoding,

    #[error("Data file not found at path: {path}")]
    MissingDataFile { path: PathBuf },

    #[error("Invalid entry: {0}")]
    Validation(String),

    #[error("Invalid row positions: {indices:?}")]
    IndexOutOfRange { indices: Vec<i64> },

    #[error("No data available for the selected filters")]
    EmptyDataset,

    #[error("Rendering failed: {0}")]
    Render(String),
}

pub type Result<T> = std::result::Result<T, ReportError>;
