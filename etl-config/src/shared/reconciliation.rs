use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

fn default_log_path() -> PathBuf {
    PathBuf::from(ReconciliationConfig::DEFAULT_LOG_PATH)
}

fn default_mismatch_exit_codes() -> Vec<i32> {
    vec![1]
}

/// Settings of the comparison between source and materialized tables.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationConfig {
    /// File the comparator output is appended to.
    #[serde(default = "default_log_path")]
    pub log_path: PathBuf,
    /// Comparator exit codes reporting differing rows rather than a broken comparator.
    #[serde(default = "default_mismatch_exit_codes")]
    pub mismatch_exit_codes: Vec<i32>,
}

impl ReconciliationConfig {
    pub const DEFAULT_LOG_PATH: &'static str = "load.out";

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.mismatch_exit_codes.contains(&0) {
            return Err(ValidationError::invalid(
                "reconciliation.mismatch_exit_codes",
                "must not contain the success exit code 0",
            ));
        }

        Ok(())
    }
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            log_path: default_log_path(),
            mismatch_exit_codes: default_mismatch_exit_codes(),
        }
    }
}
