//! Error types for poolprobe-core

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for poolprobe operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the probe server
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Listener could not be bound
    #[error("Bind error on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Profile output file could not be created or written
    #[error("Profile file {}: {source}", path.display())]
    ProfileFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// CPU sampler failed to start or to produce a report
    #[error("CPU profiler error: {0}")]
    CpuProfiler(String),

    /// Heap snapshot could not be taken or encoded
    #[error("Heap snapshot error: {0}")]
    HeapSnapshot(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wrap an IO error with the profile path it concerns
    pub(crate) fn profile_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::ProfileFile {
            path: path.into(),
            source,
        }
    }
}
