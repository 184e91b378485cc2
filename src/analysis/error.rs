//! Fatal analyzer errors
//!
//! Everything that goes wrong inside a file becomes a diagnostic or an
//! `Unknown` type; only problems with the environment stop a run.

use crate::config::ConfigError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("cannot create cache directory {}: {source}", .path.display())]
    CacheDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
