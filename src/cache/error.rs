//! Cache-specific error types

use std::fmt;

use crate::error::{AppError, AppErrorKind, InfrastructureError};

/// Cache operation errors
#[derive(Debug)]
pub enum CacheError {
    /// Redis unavailable, pool exhausted or network failure
    ConnectionError(String),
    SerializationError(String),
    OperationError(String),
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::ConnectionError(msg) => write!(f, "Cache connection error: {}", msg),
            CacheError::SerializationError(msg) => write!(f, "Cache serialization error: {}", msg),
            CacheError::OperationError(msg) => write!(f, "Cache operation error: {}", msg),
        }
    }
}

impl std::error::Error for CacheError {}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        CacheError::OperationError(err.to_string())
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::SerializationError(err.to_string())
    }
}

impl From<bb8::RunError<redis::RedisError>> for CacheError {
    fn from(err: bb8::RunError<redis::RedisError>) -> Self {
        CacheError::ConnectionError(format!("Pool error: {}", err))
    }
}

impl From<CacheError> for AppError {
    fn from(err: CacheError) -> Self {
        AppError::new(AppErrorKind::Infrastructure(InfrastructureError::Cache {
            message: err.to_string(),
        }))
    }
}

pub type CacheResult<T> = Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_errors_are_infrastructure_errors() {
        let err: AppError = CacheError::ConnectionError("refused".to_string()).into();
        assert_eq!(err.status_code(), 500);

        let json_err = serde_json::from_str::<u32>("nope").unwrap_err();
        assert!(matches!(
            CacheError::from(json_err),
            CacheError::SerializationError(_)
        ));
    }
}
