use thiserror::Error;

#[derive(Debug, Error)]
pub enum SphereBridgeError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("request timed out after {0} ms")]
    Timeout(u64),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("execution error: {0}")]
    Execution(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, SphereBridgeError>;
