//! Dataset error types

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("Dataset I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Dataset {path} has an incompatible header (expected {expected} columns starting with '{expected_first}', found '{found}')")]
    HeaderMismatch {
        path: PathBuf,
        expected: usize,
        expected_first: String,
        found: String,
    },
}
