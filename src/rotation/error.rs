use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RotateError {
    #[error("Rotator is already open: {0}")]
    AlreadyOpen(PathBuf),

    #[error("Invalid rotation duration: {0:?}")]
    InvalidDuration(String),

    #[error("Control record {path} is unreadable: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl From<RotateError> for io::Error {
    fn from(err: RotateError) -> Self {
        match err {
            RotateError::Io(e) => e,
            other => io::Error::other(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, RotateError>;
