use std::fmt;

use crate::error::{AppError, AppErrorKind, DomainError, InfrastructureError};

/// Name of the constraint that keeps a single active refund per booking.
/// The Postgres partial unique index carries the same name.
pub const ACTIVE_BOOKING_CONSTRAINT: &str = "refund_requests_active_booking_idx";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseErrorKind {
    NotFound { entity: String, id: String },
    UniqueViolation { constraint: String },
    /// Compare-and-swap on the row version lost against another writer
    VersionConflict {
        entity: String,
        id: String,
        expected: i64,
    },
    ConnectionError { message: String },
    QueryError { message: String },
    /// Stored data that does not decode into a domain value
    CorruptRow { message: String },
    Unknown { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseError {
    pub kind: DatabaseErrorKind,
}

impl DatabaseError {
    pub fn new(kind: DatabaseErrorKind) -> Self {
        Self { kind }
    }

    pub fn not_found(entity: &str, id: impl ToString) -> Self {
        Self::new(DatabaseErrorKind::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        })
    }

    pub fn version_conflict(entity: &str, id: impl ToString, expected: i64) -> Self {
        Self::new(DatabaseErrorKind::VersionConflict {
            entity: entity.to_string(),
            id: id.to_string(),
            expected,
        })
    }

    pub fn is_unique_violation(&self, constraint: &str) -> bool {
        matches!(&self.kind, DatabaseErrorKind::UniqueViolation { constraint: c } if c == constraint)
    }

    pub fn is_version_conflict(&self) -> bool {
        matches!(self.kind, DatabaseErrorKind::VersionConflict { .. })
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self.kind, DatabaseErrorKind::ConnectionError { .. })
    }

    #[cfg(feature = "database")]
    pub fn from_sqlx(err: sqlx::Error) -> Self {
        let kind = match &err {
            sqlx::Error::RowNotFound => DatabaseErrorKind::NotFound {
                entity: "row".to_string(),
                id: String::new(),
            },
            sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
                DatabaseErrorKind::UniqueViolation {
                    constraint: db_err.constraint().unwrap_or_default().to_string(),
                }
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                DatabaseErrorKind::ConnectionError {
                    message: err.to_string(),
                }
            }
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                DatabaseErrorKind::CorruptRow {
                    message: err.to_string(),
                }
            }
            sqlx::Error::Database(_) => DatabaseErrorKind::QueryError {
                message: err.to_string(),
            },
            _ => DatabaseErrorKind::Unknown {
                message: err.to_string(),
            },
        };
        Self { kind }
    }
}

impl fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            DatabaseErrorKind::NotFound { entity, id } => write!(f, "{} '{}' not found", entity, id),
            DatabaseErrorKind::UniqueViolation { constraint } => {
                write!(f, "unique constraint violated: {}", constraint)
            }
            DatabaseErrorKind::VersionConflict {
                entity,
                id,
                expected,
            } => write!(
                f,
                "{} '{}' changed since version {} was read",
                entity, id, expected
            ),
            DatabaseErrorKind::ConnectionError { message } => {
                write!(f, "database connection error: {}", message)
            }
            DatabaseErrorKind::QueryError { message } => write!(f, "query failed: {}", message),
            DatabaseErrorKind::CorruptRow { message } => write!(f, "corrupt row: {}", message),
            DatabaseErrorKind::Unknown { message } => write!(f, "database error: {}", message),
        }
    }
}

impl std::error::Error for DatabaseError {}

impl From<DatabaseError> for AppError {
    fn from(err: DatabaseError) -> Self {
        let kind = match err.kind {
            DatabaseErrorKind::NotFound { entity, id } if entity == "booking" => {
                AppErrorKind::Domain(DomainError::BookingNotFound { booking_id: id })
            }
            DatabaseErrorKind::NotFound { entity, id } if entity == "refund_request" => {
                AppErrorKind::Domain(DomainError::RefundNotFound { refund_id: id })
            }
            DatabaseErrorKind::VersionConflict { id, .. } => {
                AppErrorKind::Domain(DomainError::ConcurrentModification { refund_id: id })
            }
            ref other => {
                let is_retryable = matches!(other, DatabaseErrorKind::ConnectionError { .. });
                AppErrorKind::Infrastructure(InfrastructureError::Database {
                    message: err.to_string(),
                    is_retryable,
                })
            }
        };
        AppError::new(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn version_conflict_maps_to_concurrent_modification() {
        let err = DatabaseError::version_conflict("refund_request", "r-1", 3);
        assert!(err.is_version_conflict());
        let app: AppError = err.into();
        assert_eq!(app.error_code(), ErrorCode::ConcurrentModification);
        assert_eq!(app.status_code(), 409);
    }

    #[test]
    fn not_found_maps_by_entity() {
        let app: AppError = DatabaseError::not_found("booking", "b-1").into();
        assert_eq!(app.status_code(), 404);

        let app: AppError = DatabaseError::not_found("refund_request", "r-1").into();
        assert_eq!(app.status_code(), 404);
    }

    #[test]
    fn connection_errors_are_retryable_infrastructure() {
        let err = DatabaseError::new(DatabaseErrorKind::ConnectionError {
            message: "pool timed out".to_string(),
        });
        assert!(err.is_retryable());
        let app: AppError = err.into();
        assert_eq!(app.status_code(), 500);
        assert!(app.is_retryable());
    }
}
