//! Project configuration (`flowscan.toml`).

use crate::error::EngineError;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Name of the configuration file looked up in the scan root.
pub const CONFIG_FILENAME: &str = "flowscan.toml";

/// Top-level configuration struct.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    /// The main configuration section.
    #[serde(default)]
    pub flowscan: FlowscanConfig,
}

/// Configuration options. Only `max_workers` reaches the core build; the
/// rest parameterize the walk and reporting.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct FlowscanConfig {
    /// Worker-pool override (capped at 32).
    pub max_workers: Option<usize>,
    /// Additional folders to exclude from the walk.
    pub exclude_folders: Option<Vec<String>>,
    /// Pattern file replacing the compiled-in set.
    pub patterns_file: Option<PathBuf>,
    /// Minimum severity to report (`critical`, `high`, `medium`, `low`).
    pub min_severity: Option<String>,
    /// Exit non-zero when findings remain after filtering.
    pub fail_on_findings: Option<bool>,
}

impl Config {
    /// Loads `flowscan.toml` from `root`. A missing file is the default
    /// configuration; a malformed one is an error.
    pub fn load(root: &Path) -> Result<Self, EngineError> {
        let path = root.join(CONFIG_FILENAME);
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(err) => return Err(EngineError::Io(err)),
        };
        toml::from_str(&text).map_err(|err| EngineError::ConfigLoad {
            file: path,
            message: err.to_string(),
        })
    }
}
