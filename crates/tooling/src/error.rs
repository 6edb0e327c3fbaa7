use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolingError {
    #[error("tool {0:?} is already registered")]
    DuplicateTool(String),

    #[error("tool {0:?} not found")]
    ToolNotFound(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ToolingError>;
