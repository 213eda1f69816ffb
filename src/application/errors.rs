//! Application error types

use thiserror::Error;

use crate::domain::repositories::StoreError;
use crate::infrastructure::config::ConfigError;

/// Errors that stop a command before or while it runs
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("no adapter registered for channel {0}")]
    UnknownChannel(String),

    #[error("catalog store error: {0}")]
    Store(#[from] StoreError),

    #[error("blob store error: {0}")]
    Blob(#[from] std::io::Error),
}

impl IngestError {
    /// Fatal errors mean no work was started; the process should exit non-zero
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_) | Self::UnknownChannel(_))
    }
}

pub type IngestResult<T> = Result<T, IngestError>;
