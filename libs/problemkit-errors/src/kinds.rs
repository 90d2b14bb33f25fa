//! Built-in application error kinds
//!
//! Each kind implements [`StructuredError`] and carries the caller-facing message as its
//! detail. Hosts return these from handlers; the matching mapper turns them into problems.

use std::collections::BTreeMap;

use http::StatusCode;

use crate::catalog;
use crate::code::{ErrorCode, StructuredError};

/// Input validation failure with per-field messages.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct ValidationError {
    message: String,
    errors: BTreeMap<String, Vec<String>>,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            errors: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_field_error(mut self, field: impl Into<String>, message: impl Into<String>) -> Self {
        self.errors
            .entry(field.into())
            .or_default()
            .push(message.into());
        self
    }

    /// Field name to messages, ordered by field name.
    #[must_use]
    pub fn errors(&self) -> &BTreeMap<String, Vec<String>> {
        &self.errors
    }
}

impl StructuredError for ValidationError {
    fn code(&self) -> &ErrorCode {
        &catalog::VALIDATION
    }

    fn detail(&self) -> Option<&str> {
        Some(&self.message)
    }

    fn preferred_status(&self) -> Option<StatusCode> {
        Some(StatusCode::UNPROCESSABLE_ENTITY)
    }

    fn kind(&self) -> &'static str {
        "validation"
    }
}

/// Missing resource the caller can fix by adjusting the request.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct NotFoundError {
    message: String,
}

impl NotFoundError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl StructuredError for NotFoundError {
    fn code(&self) -> &ErrorCode {
        &catalog::NOT_FOUND
    }

    fn detail(&self) -> Option<&str> {
        Some(&self.message)
    }

    fn preferred_status(&self) -> Option<StatusCode> {
        Some(StatusCode::NOT_FOUND)
    }

    fn kind(&self) -> &'static str {
        "not_found"
    }
}

/// Access violation surfaced as 401 or 403.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct AuthorizationError {
    message: String,
    forbidden: bool,
}

impl AuthorizationError {
    /// Caller is not authenticated (401).
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            forbidden: false,
        }
    }

    /// Caller is authenticated but not allowed (403).
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            forbidden: true,
        }
    }

    #[must_use]
    pub fn is_forbidden(&self) -> bool {
        self.forbidden
    }
}

impl StructuredError for AuthorizationError {
    fn code(&self) -> &ErrorCode {
        &catalog::AUTHORIZATION
    }

    fn detail(&self) -> Option<&str> {
        Some(&self.message)
    }

    fn preferred_status(&self) -> Option<StatusCode> {
        Some(if self.forbidden {
            StatusCode::FORBIDDEN
        } else {
            StatusCode::UNAUTHORIZED
        })
    }

    fn kind(&self) -> &'static str {
        "authorization"
    }
}

/// Throttling or quota breach. Always transient.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct RateLimitError {
    message: String,
}

impl RateLimitError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl StructuredError for RateLimitError {
    fn code(&self) -> &ErrorCode {
        &catalog::RATE_LIMIT
    }

    fn detail(&self) -> Option<&str> {
        Some(&self.message)
    }

    fn is_transient(&self) -> bool {
        true
    }

    fn preferred_status(&self) -> Option<StatusCode> {
        Some(StatusCode::TOO_MANY_REQUESTS)
    }

    fn kind(&self) -> &'static str {
        "rate_limit"
    }
}

/// Domain rule violation with a caller-chosen code.
///
/// Maps to 400 unless a status override is given.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct DomainError {
    code: ErrorCode,
    message: String,
    transient: bool,
    status: Option<StatusCode>,
}

impl DomainError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            transient: false,
            status: None,
        }
    }

    #[must_use]
    pub fn transient(mut self) -> Self {
        self.transient = true;
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }
}

impl StructuredError for DomainError {
    fn code(&self) -> &ErrorCode {
        &self.code
    }

    fn detail(&self) -> Option<&str> {
        Some(&self.message)
    }

    fn is_transient(&self) -> bool {
        self.transient
    }

    fn preferred_status(&self) -> Option<StatusCode> {
        self.status
    }

    fn kind(&self) -> &'static str {
        "domain"
    }
}
