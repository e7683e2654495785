//! Dataset output for scaleprobe
//!
//! Each completed test becomes one flat CSV row. The file is shared across
//! runs: rows are only ever appended and the header is written once.

pub mod dataset;
pub mod errors;
pub mod row;

pub use dataset::{read_dataset, DatasetWriter};
pub use errors::DatasetError;
pub use row::{DatasetRow, HEADER};
