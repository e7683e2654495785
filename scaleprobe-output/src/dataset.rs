//! Append-only dataset file

use crate::errors::DatasetError;
use crate::row::{DatasetRow, HEADER};
use scaleprobe_core::TestResult;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Appends one row per test and flushes it immediately
pub struct DatasetWriter {
    path: PathBuf,
    writer: csv::Writer<File>,
    rows_written: usize,
}

impl DatasetWriter {
    /// Open `path` for appending.
    ///
    /// A new or empty file gets the header; an existing file must already
    /// start with the same header.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DatasetError> {
        let path = path.as_ref().to_path_buf();
        let io_err = |source| DatasetError::Io {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(&path)
            .map_err(io_err)?;
        let is_empty = file.metadata().map_err(io_err)?.len() == 0;

        if !is_empty {
            check_header(&path)?;
        }

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if is_empty {
            writer.write_record(HEADER)?;
            writer.flush().map_err(io_err)?;
            info!("Created dataset {}", path.display());
        } else {
            info!("Appending to existing dataset {}", path.display());
        }

        Ok(Self {
            path,
            writer,
            rows_written: 0,
        })
    }

    /// Append one result and flush it to disk
    pub fn append(&mut self, result: &TestResult) -> Result<(), DatasetError> {
        self.writer.serialize(DatasetRow::from(result))?;
        self.writer.flush().map_err(|source| DatasetError::Io {
            path: self.path.clone(),
            source,
        })?;
        self.rows_written += 1;
        debug!(test_id = result.test_id, "Recorded dataset row");
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rows appended by this writer
    pub fn rows_written(&self) -> usize {
        self.rows_written
    }
}

fn check_header(path: &Path) -> Result<(), DatasetError> {
    let file = File::open(path).map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut first_line = String::new();
    BufReader::new(file)
        .read_line(&mut first_line)
        .map_err(|source| DatasetError::Io {
            path: path.to_path_buf(),
            source,
        })?;

    let expected = HEADER.join(",");
    let found = first_line.trim_end_matches(['\r', '\n']);
    if found != expected {
        return Err(DatasetError::HeaderMismatch {
            path: path.to_path_buf(),
            expected: HEADER.len(),
            expected_first: HEADER[0].to_string(),
            found: found.chars().take(80).collect(),
        });
    }
    Ok(())
}

/// Read every row of a dataset file in file order
pub fn read_dataset(path: impl AsRef<Path>) -> Result<Vec<DatasetRow>, DatasetError> {
    let path = path.as_ref();
    check_header(path)?;
    let mut reader = csv::Reader::from_path(path)?;
    let rows = reader
        .deserialize::<DatasetRow>()
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
