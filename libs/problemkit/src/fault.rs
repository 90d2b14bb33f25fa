//! The closed set of failures the pipeline accepts
//!
//! Application errors stay open through [`Fault::App`]: any [`StructuredError`] converts into a
//! fault and mappers recover the concrete kind with [`Fault::downcast_app`]. Infrastructure
//! failures have dedicated variants; everything else is carried as an [`anyhow::Error`].

use std::backtrace::BacktraceStatus;
use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;

use http::StatusCode;
use problemkit_errors::StructuredError;

/// Vendor database failure identified by its numeric error code.
#[derive(Debug, Clone, thiserror::Error)]
#[error("database error {number}: {message}")]
pub struct DatabaseError {
    pub number: i32,
    pub message: String,
}

impl DatabaseError {
    pub fn new(number: i32, message: impl Into<String>) -> Self {
        Self {
            number,
            message: message.into(),
        }
    }
}

/// Failed call to an upstream HTTP dependency. `status` is absent when no response arrived.
#[derive(Debug, Clone, thiserror::Error)]
#[error("upstream request failed: {message}")]
pub struct UpstreamError {
    pub status: Option<StatusCode>,
    pub message: String,
}

impl UpstreamError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }
}

/// An upstream call exceeded its time budget.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{operation} timed out after {}ms", timeout.as_millis())]
pub struct TimeoutError {
    pub operation: String,
    pub timeout: Duration,
}

impl TimeoutError {
    pub fn new(operation: impl Into<String>, timeout: Duration) -> Self {
        Self {
            operation: operation.into(),
            timeout,
        }
    }
}

/// Any failure handed to the error pipeline.
#[derive(Debug)]
pub enum Fault {
    App(Box<dyn StructuredError>),
    Database(DatabaseError),
    Upstream(UpstreamError),
    Timeout(TimeoutError),
    Unrecognized(anyhow::Error),
}

impl Fault {
    /// Wraps an arbitrary error that no dedicated mapper understands.
    pub fn unrecognized(err: impl Into<anyhow::Error>) -> Self {
        Self::Unrecognized(err.into())
    }

    /// Stable kind name, matched against the sanitizer's safe-kind allow-list.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::App(e) => e.kind(),
            Self::Database(_) => "database",
            Self::Upstream(_) => "upstream_http",
            Self::Timeout(_) => "upstream_timeout",
            Self::Unrecognized(_) => "unrecognized",
        }
    }

    /// Rust type reported as `exception.type` in telemetry.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::App(e) => e.kind(),
            Self::Database(_) => std::any::type_name::<DatabaseError>(),
            Self::Upstream(_) => std::any::type_name::<UpstreamError>(),
            Self::Timeout(_) => std::any::type_name::<TimeoutError>(),
            Self::Unrecognized(_) => std::any::type_name::<anyhow::Error>(),
        }
    }

    #[must_use]
    pub fn as_structured(&self) -> Option<&dyn StructuredError> {
        match self {
            Self::App(e) => Some(e.as_ref()),
            _ => None,
        }
    }

    /// Returns the application error when it is exactly a `T`.
    #[must_use]
    pub fn downcast_app<T: StructuredError>(&self) -> Option<&T> {
        let err: &(dyn StdError + 'static) = self.as_structured()?;
        err.downcast_ref::<T>()
    }

    /// Error chain, plus the captured backtrace for unrecognized faults.
    ///
    /// Returns `None` for structured and infrastructure faults without a source.
    #[must_use]
    pub fn stack_trace(&self) -> Option<String> {
        let mut lines = Vec::new();
        let mut source = self.source();
        if let Self::Unrecognized(e) = self {
            lines.push(e.to_string());
        }
        while let Some(cause) = source {
            lines.push(format!("caused by: {cause}"));
            source = cause.source();
        }
        if let Self::Unrecognized(e) = self
            && e.backtrace().status() == BacktraceStatus::Captured
        {
            lines.push(e.backtrace().to_string());
        }
        (!lines.is_empty()).then(|| lines.join("\n"))
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::App(e) => fmt::Display::fmt(e, f),
            Self::Database(e) => fmt::Display::fmt(e, f),
            Self::Upstream(e) => fmt::Display::fmt(e, f),
            Self::Timeout(e) => fmt::Display::fmt(e, f),
            Self::Unrecognized(e) => fmt::Display::fmt(e, f),
        }
    }
}

impl StdError for Fault {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::App(e) => e.source(),
            Self::Database(e) => e.source(),
            Self::Upstream(e) => e.source(),
            Self::Timeout(e) => e.source(),
            Self::Unrecognized(e) => e.source(),
        }
    }
}

impl<E: StructuredError> From<E> for Fault {
    fn from(err: E) -> Self {
        Self::App(Box::new(err))
    }
}

impl From<DatabaseError> for Fault {
    fn from(err: DatabaseError) -> Self {
        Self::Database(err)
    }
}

impl From<UpstreamError> for Fault {
    fn from(err: UpstreamError) -> Self {
        Self::Upstream(err)
    }
}

impl From<TimeoutError> for Fault {
    fn from(err: TimeoutError) -> Self {
        Self::Timeout(err)
    }
}
