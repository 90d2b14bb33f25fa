//! Error catalog: every code emitted by the built-in kinds and mappers

use crate::code::ErrorCode;

pub static VALIDATION: ErrorCode =
    ErrorCode::from_static("VALIDATION", "Validation failed", Some("/errors/validation"));
pub static NOT_FOUND: ErrorCode =
    ErrorCode::from_static("NOT_FOUND", "Resource not found", Some("/errors/not-found"));
pub static AUTHORIZATION: ErrorCode =
    ErrorCode::from_static("AUTH", "Unauthorized/Forbidden", Some("/errors/auth"));
pub static RATE_LIMIT: ErrorCode =
    ErrorCode::from_static("RATE_LIMIT", "Too Many Requests", Some("/errors/rate-limit"));

// Storage engine failures
pub static SQL_DEADLOCK: ErrorCode = ErrorCode::from_static(
    "INFRA-SQL-DEADLOCK",
    "SQL Deadlock",
    Some("/errors/infra/sql/deadlock"),
);
pub static SQL_TIMEOUT: ErrorCode = ErrorCode::from_static(
    "INFRA-SQL-TIMEOUT",
    "SQL Timeout",
    Some("/errors/infra/sql/timeout"),
);
pub static SQL_LOCK_TIMEOUT: ErrorCode = ErrorCode::from_static(
    "INFRA-SQL-LOCK-TIMEOUT",
    "SQL lock request timed out",
    Some("/errors/infra/sql/lock-timeout"),
);
pub static SQL_DUPLICATE_KEY: ErrorCode = ErrorCode::from_static(
    "INFRA-SQL-DUPKEY",
    "Duplicate key",
    Some("/errors/infra/sql/duplicate"),
);
pub static SQL_CONSTRAINT: ErrorCode = ErrorCode::from_static(
    "INFRA-SQL-CONSTRAINT",
    "Constraint violation",
    Some("/errors/infra/sql/constraint"),
);
pub static SQL_TRUNCATION: ErrorCode = ErrorCode::from_static(
    "INFRA-SQL-TRUNCATION",
    "Value too long for column",
    Some("/errors/infra/sql/truncation"),
);
pub static SQL_AUTH: ErrorCode = ErrorCode::from_static(
    "INFRA-SQL-AUTH",
    "SQL login failed",
    Some("/errors/infra/sql/auth"),
);
pub static SQL_UNAVAILABLE: ErrorCode = ErrorCode::from_static(
    "INFRA-SQL-DBUNAVAILABLE",
    "Cannot open database",
    Some("/errors/infra/sql/unavailable"),
);
pub static SQL_THROTTLED: ErrorCode = ErrorCode::from_static(
    "INFRA-SQL-THROTTLED",
    "Database is throttling requests",
    Some("/errors/infra/sql/throttled"),
);
pub static SQL_UNKNOWN: ErrorCode = ErrorCode::from_static(
    "INFRA-SQL-UNKNOWN",
    "SQL Error",
    Some("/errors/infra/sql/unknown"),
);

// Upstream calls
pub static HTTP_UPSTREAM: ErrorCode = ErrorCode::from_static(
    "INFRA-HTTP-UPSTREAM",
    "Upstream HTTP error",
    Some("/errors/http/upstream"),
);
pub static HTTP_TIMEOUT: ErrorCode = ErrorCode::from_static(
    "INFRA-HTTP-TIMEOUT",
    "External request timed out",
    Some("/errors/http/timeout"),
);

pub static UNEXPECTED: ErrorCode =
    ErrorCode::from_static("UNEXPECTED_ERROR", "Unexpected error", Some("/errors/unexpected"));

/// Code reported when a finalized problem carries no code at all.
pub const UNKNOWN_ERROR_CODE: &str = "UNKNOWN_ERROR";

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn catalog_codes_are_unique() {
        let all = [
            &VALIDATION,
            &NOT_FOUND,
            &AUTHORIZATION,
            &RATE_LIMIT,
            &SQL_DEADLOCK,
            &SQL_TIMEOUT,
            &SQL_LOCK_TIMEOUT,
            &SQL_DUPLICATE_KEY,
            &SQL_CONSTRAINT,
            &SQL_TRUNCATION,
            &SQL_AUTH,
            &SQL_UNAVAILABLE,
            &SQL_THROTTLED,
            &SQL_UNKNOWN,
            &HTTP_UPSTREAM,
            &HTTP_TIMEOUT,
            &UNEXPECTED,
        ];
        let mut codes: Vec<&str> = all.iter().map(|c| c.code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), all.len());
        assert!(all.iter().all(|c| c.type_uri().is_some()));
    }
}
