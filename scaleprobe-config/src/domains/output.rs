//! Dataset output configuration

use crate::error::ConfigResult;
use crate::validation::{validate_required_string, Validatable};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Append-only CSV dataset, shared across runs
    #[serde(default = "default_dataset_path")]
    pub dataset_path: PathBuf,

    /// Print the efficiency summary when a run finishes
    #[serde(default = "crate::domains::utils::default_true")]
    pub print_summary: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dataset_path: default_dataset_path(),
            print_summary: true,
        }
    }
}

impl Validatable for OutputConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_required_string(
            &self.dataset_path.to_string_lossy(),
            "dataset_path",
            self.domain_name(),
        )?;
        if self.dataset_path.is_dir() {
            return Err(self.validation_error(format!(
                "dataset_path {} is a directory",
                self.dataset_path.display()
            )));
        }
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "output"
    }
}

fn default_dataset_path() -> PathBuf {
    PathBuf::from("scaling_dataset.csv")
}
