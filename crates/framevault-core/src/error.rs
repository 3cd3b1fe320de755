use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no image payload supplied")]
    EmptyPayload,

    #[error("invalid frame name: '{0}'")]
    InvalidName(String),

    #[error("'{0}' is a latest pointer")]
    ProtectedName(String),

    #[error("background task failed: {0}")]
    Task(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
