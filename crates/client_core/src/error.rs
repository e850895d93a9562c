use shared::error::{ApiError, ErrorCode};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{0}")]
    Validation(String),
    #[error("sign in required")]
    Unauthorized,
    #[error("{0} not found")]
    NotFound(String),
    #[error("failed to load {what}: {source:#}")]
    StoreRead {
        what: &'static str,
        source: anyhow::Error,
    },
    #[error("failed to save {what}: {source:#}")]
    StoreWrite {
        what: &'static str,
        source: anyhow::Error,
    },
    #[error("auth service error: {0}")]
    Auth(String),
    #[error("payment widget error: {0}")]
    Payment(String),
}

impl ClientError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            ClientError::Validation(_) => ErrorCode::Validation,
            ClientError::Unauthorized => ErrorCode::Unauthorized,
            ClientError::NotFound(_) => ErrorCode::NotFound,
            ClientError::StoreRead { .. } | ClientError::StoreWrite { .. } => {
                ErrorCode::StoreUnavailable
            }
            ClientError::Auth(_) => ErrorCode::Unauthorized,
            ClientError::Payment(_) => ErrorCode::PaymentFailed,
        }
    }

    /// Message safe to show in the UI; store internals stay in the logs.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::StoreRead { what, .. } => format!("Could not load {what}."),
            ClientError::StoreWrite { what, .. } => {
                format!("Could not save {what}. Please try again.")
            }
            other => other.to_string(),
        }
    }
}

impl From<&ClientError> for ApiError {
    fn from(value: &ClientError) -> Self {
        ApiError::new(value.code(), value.user_message())
    }
}
