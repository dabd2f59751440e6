use std::path::PathBuf;
use thiserror::Error;

/// Errors from the surface around the engine (site files, configuration)
///
/// The engine itself never fails: missing or unusable readings are zero.
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("Cannot read site file {path}: {source}")]
    SiteIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid site file {path}: {source}")]
    SiteParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
