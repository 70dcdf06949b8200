use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Found no joysticks to configure!")]
    NoDevices,

    #[error("Failed to initialize gilrs: {0}")]
    Backend(String),

    #[error("Failed to open log file {}: {source}", path.display())]
    LogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write output: {0}")]
    Output(#[from] std::io::Error),
}
