//! Vendor database error classification

use http::StatusCode;
use problemkit_errors::{ErrorCode, catalog};

/// Application-level reading of a vendor error number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbClassification {
    pub status: StatusCode,
    pub code: ErrorCode,
    /// Retrying the same statement may succeed.
    pub transient: bool,
}

impl DbClassification {
    fn new(status: StatusCode, code: &ErrorCode, transient: bool) -> Self {
        Self {
            status,
            code: code.clone(),
            transient,
        }
    }
}

/// Translates a storage engine's numeric error vocabulary into problem codes.
pub trait DbErrorClassifier: Send + Sync {
    fn classify(&self, number: i32) -> DbClassification;
}

/// Microsoft SQL Server / Azure SQL error numbers.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlServerClassifier;

impl DbErrorClassifier for SqlServerClassifier {
    fn classify(&self, number: i32) -> DbClassification {
        match number {
            1205 => DbClassification::new(StatusCode::CONFLICT, &catalog::SQL_DEADLOCK, true),
            -2 => DbClassification::new(StatusCode::GATEWAY_TIMEOUT, &catalog::SQL_TIMEOUT, true),
            1222 => DbClassification::new(
                StatusCode::GATEWAY_TIMEOUT,
                &catalog::SQL_LOCK_TIMEOUT,
                true,
            ),
            2627 | 2601 => {
                DbClassification::new(StatusCode::CONFLICT, &catalog::SQL_DUPLICATE_KEY, false)
            }
            547 | 515 => DbClassification::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                &catalog::SQL_CONSTRAINT,
                false,
            ),
            8152 | 2628 => DbClassification::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                &catalog::SQL_TRUNCATION,
                false,
            ),
            18456 => DbClassification::new(StatusCode::SERVICE_UNAVAILABLE, &catalog::SQL_AUTH, true),
            4060 | 40613 => DbClassification::new(
                StatusCode::SERVICE_UNAVAILABLE,
                &catalog::SQL_UNAVAILABLE,
                true,
            ),
            40501 | 10928 | 10929 => DbClassification::new(
                StatusCode::SERVICE_UNAVAILABLE,
                &catalog::SQL_THROTTLED,
                true,
            ),
            other => {
                tracing::debug!(sql_error_number = other, "unclassified SQL error number");
                DbClassification::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    &catalog::SQL_UNKNOWN,
                    false,
                )
            }
        }
    }
}
