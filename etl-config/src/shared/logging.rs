use std::path::PathBuf;

use serde::{Deserialize, Serialize};

fn default_level() -> String {
    LoggingConfig::DEFAULT_LEVEL.to_owned()
}

/// Log output settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`.
    #[serde(default = "default_level")]
    pub level: String,
    /// Optional file receiving a copy of every log line.
    #[serde(default)]
    pub file: Option<PathBuf>,
    /// Also logs generated scripts and commands in full.
    #[serde(default)]
    pub verbose: bool,
}

impl LoggingConfig {
    pub const DEFAULT_LEVEL: &'static str = "info";
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            file: None,
            verbose: false,
        }
    }
}
