//! Error types for the transformation engine
//!
//! Only conditions that make a whole run meaningless are errors. Everything
//! else (an unbalanced construct, an unsafe rename, a failed enrichment call)
//! degrades to "leave this part unchanged" and is logged instead.

use std::path::PathBuf;

/// Fatal pipeline errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No transformable files found in {0}")]
    EmptyProject(PathBuf),

    #[error("Failed to parse config file {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid anchor pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Invalid stage order: {0}")]
    StageOrder(String),

    #[error("Failed to start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

pub type Result<T> = std::result::Result<T, Error>;
