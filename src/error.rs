use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid settings file {path}: {source}")]
    Settings {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Scan of {path} failed: {reason}")]
    Scan { path: PathBuf, reason: String },

    #[error("Scan cancelled")]
    Cancelled,

    #[error("UI failed to start: {0}")]
    Ui(String),
}

pub type Result<T> = std::result::Result<T, Error>;
