//! Test matrix configuration

use crate::error::ConfigResult;
use crate::validation::{validate_positive, Validatable};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which replica counts to test and how often
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatrixConfig {
    #[serde(default = "default_replica_counts")]
    pub replica_counts: Vec<u32>,

    /// Repetitions of each replica count
    #[serde(default = "default_repetitions")]
    pub repetitions: u32,

    /// Overall deadline; checked between tests only
    #[serde(
        with = "crate::domains::utils::serde_duration_option",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub deadline: Option<Duration>,
}

impl MatrixConfig {
    /// Replica counts in ascending order without duplicates
    pub fn ordered_replica_counts(&self) -> Vec<u32> {
        let mut counts = self.replica_counts.clone();
        counts.sort_unstable();
        counts.dedup();
        counts
    }

    pub fn planned_tests(&self) -> usize {
        self.ordered_replica_counts().len() * self.repetitions as usize
    }
}

impl Default for MatrixConfig {
    fn default() -> Self {
        Self {
            replica_counts: default_replica_counts(),
            repetitions: default_repetitions(),
            deadline: None,
        }
    }
}

impl Validatable for MatrixConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.replica_counts.is_empty() {
            return Err(self.validation_error("replica_counts cannot be empty"));
        }
        if self.replica_counts.contains(&0) {
            return Err(self.validation_error("replica counts must be at least 1"));
        }
        validate_positive(self.repetitions, "repetitions", self.domain_name())?;
        if let Some(deadline) = self.deadline {
            validate_positive(deadline.as_secs(), "deadline", self.domain_name())?;
        }
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "matrix"
    }
}

fn default_replica_counts() -> Vec<u32> {
    vec![1, 2, 3, 4]
}

fn default_repetitions() -> u32 {
    3
}
