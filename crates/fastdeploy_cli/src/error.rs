use std::path::PathBuf;

use thiserror::Error;

/// Failures while building the update artifact. All of these happen before
/// anything is sent anywhere.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("invalid glob pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },
    #[error("failed to {context} {path}: {source}")]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write archive entry '{entry}': {source}")]
    Entry {
        entry: String,
        #[source]
        source: zip::result::ZipError,
    },
}

#[derive(Debug, Error)]
pub enum FastDeployError {
    #[error(transparent)]
    Config(#[from] fastdeploy_core::config::ConfigError),

    #[error("custom.fastDeploy.include is empty; configure patterns to fast deploy")]
    NothingToDeploy,

    #[error("failed to {context} {path}: {source}")]
    LocalIo {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(
        "update payload is {size} bytes, above the {limit} byte synchronous invoke limit"
    )]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("invoke transport failure: {message}")]
    Transport { message: String },

    #[error("updater function failed: {message}")]
    RemoteExecution { message: String },

    #[error("updater response violates the wire contract: {message}")]
    Protocol { message: String },

    #[error("custom.fastDeploy.cleanFolder is false; pass --force to remove {folder}")]
    CleanDisabled { folder: String },

    #[error("code update failed for {} function(s): {}", .failed.len(), .failed.join(", "))]
    CodeUpdate { failed: Vec<String> },
}
