//! Analyzer configuration (`pyinfer.toml`)

use crate::fs::FileSystem;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the optional configuration file in the project root
pub const CONFIG_FILE: &str = "pyinfer.toml";

/// Settings that shape one analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Extra directories searched for imports, after the project directory
    pub search_paths: Vec<PathBuf>,

    /// Where parsed trees are persisted; defaults to `<temp>/pyinfer/ast_cache`
    pub cache_dir: Option<PathBuf>,

    /// Persist parsed trees between runs
    pub disk_cache: bool,

    /// Append `PYTHONPATH` entries to the search path
    pub use_pythonpath: bool,

    /// Suppress progress logging
    pub quiet: bool,

    /// Report bindings that are never referenced
    pub report_unused: bool,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            search_paths: Vec::new(),
            cache_dir: None,
            disk_cache: true,
            use_pythonpath: true,
            quiet: false,
            report_unused: true,
        }
    }
}

impl AnalyzerConfig {
    /// Configuration that touches nothing outside the analysed tree
    pub fn hermetic() -> Self {
        Self {
            disk_cache: false,
            use_pythonpath: false,
            ..Self::default()
        }
    }

    /// Read `pyinfer.toml` from `project_root`, or the defaults when absent
    pub fn load(fs: &dyn FileSystem, project_root: &Path) -> Result<Self, ConfigError> {
        let path = project_root.join(CONFIG_FILE);
        if !fs.file_exists(&path) {
            return Ok(Self::default());
        }
        let content = fs.read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        let mut config = Self::parse(&content)?;

        // relative search paths are relative to the config file
        for dir in &mut config.search_paths {
            if dir.is_relative() {
                *dir = project_root.join(&*dir);
            }
        }
        Ok(config)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid {CONFIG_FILE}: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("cannot serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
