use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum KartotekaError {
    #[error("Not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("File bridge is not available")]
    Unavailable,

    #[error("Permission denied: {}", .0.display())]
    PermissionDenied(PathBuf),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(String),
}

impl KartotekaError {
    /// Map an I/O error for `path`, keeping missing files and permission problems distinct.
    pub fn from_io(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => KartotekaError::NotFound(path.into()),
            std::io::ErrorKind::PermissionDenied => KartotekaError::PermissionDenied(path.into()),
            _ => KartotekaError::Io(err),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, KartotekaError::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, KartotekaError>;
