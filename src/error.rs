use thiserror::Error;

use crate::serializer::SerializeError;

/// Recorder error types
#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("Session already running")]
    AlreadyRunning,

    #[error("Session not running")]
    NotRunning,

    #[error("Serialization failed: {0}")]
    Serialize(#[from] SerializeError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Identity error: {0}")]
    Identity(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, RecorderError>;
