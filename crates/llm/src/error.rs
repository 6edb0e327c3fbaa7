use thiserror::Error;

pub type Result<T> = std::result::Result<T, LlmError>;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("http error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    SerializationError(String),

    #[error("authentication error: {0}")]
    AuthenticationError(String),

    #[error("rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("context window exceeded: {0}")]
    ContextTooLong(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid response from provider: {0}")]
    InvalidResponse(String),

    #[error("provider error: {0}")]
    ProviderError(String),

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("all {attempts} attempts failed, last error: {last_error}")]
    CallFailed { attempts: u32, last_error: String },

    #[error("{0}")]
    Other(String),
}

impl LlmError {
    /// Classifies this error for the retry policy in §4.2.
    pub fn class(&self) -> ErrorClass {
        match self {
            LlmError::RateLimitExceeded(_) => ErrorClass::RateLimit,
            LlmError::Timeout(_) => ErrorClass::Timeout,
            LlmError::ContextTooLong(_) => ErrorClass::ContextTooLong,
            LlmError::AuthenticationError(_) | LlmError::InvalidRequest(_) => ErrorClass::Permanent,
            LlmError::HttpError(_) | LlmError::ProviderError(_) | LlmError::InvalidResponse(_) => {
                ErrorClass::Transient
            }
            _ => ErrorClass::Transient,
        }
    }

    pub fn is_retryable(&self) -> bool {
        !matches!(self.class(), ErrorClass::Permanent)
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(err: serde_json::Error) -> Self {
        LlmError::SerializationError(err.to_string())
    }
}

/// Error class drives the inter-attempt delay chosen by the retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    RateLimit,
    Timeout,
    ContextTooLong,
    Transient,
    Permanent,
}
