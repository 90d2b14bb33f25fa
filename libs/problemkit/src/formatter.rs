//! Response finalization: identifiers, headers, extension limits and the body write
//!
//! `format` and `write` are split so the span enricher sees the final error id before the
//! body is flushed.

use http::header::CONTENT_TYPE;
use http::{HeaderName, HeaderValue, StatusCode};
use problemkit_errors::catalog::UNKNOWN_ERROR_CODE;
use problemkit_errors::{
    APPLICATION_PROBLEM_JSON, ExtensionValidationOptions, Problem, instance_urn,
    validate_extensions,
};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use uuid::Uuid;

use crate::context::RequestContext;

pub const ERROR_ID_HEADER: HeaderName = HeaderName::from_static("x-error-id");
pub const TRACE_ID_HEADER: HeaderName = HeaderName::from_static("x-trace-id");

/// Identifiers assigned while formatting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattingResult {
    pub error_id: String,
    pub error_code: String,
}

#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("problem write cancelled by the request")]
    Cancelled,
    #[error("failed to serialize problem: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to write problem body: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Default)]
pub struct ProblemFormatter {
    options: ExtensionValidationOptions,
}

impl ProblemFormatter {
    #[must_use]
    pub fn new(options: ExtensionValidationOptions) -> Self {
        Self { options }
    }

    #[must_use]
    pub fn options(&self) -> &ExtensionValidationOptions {
        &self.options
    }

    /// `err-` followed by 32 lowercase hex characters.
    #[must_use]
    pub fn new_error_id() -> String {
        format!("err-{}", Uuid::new_v4().simple())
    }

    /// Finalizes `problem` for the response and records status and headers on `ctx`.
    pub fn format(
        &self,
        ctx: &mut RequestContext,
        problem: &mut Problem,
        status: StatusCode,
    ) -> FormattingResult {
        let error_id = Self::new_error_id();
        problem.error_id = Some(error_id.clone());
        ctx.trace_id().clone_into(&mut problem.trace_id);
        if problem.instance.trim().is_empty() {
            problem.instance = instance_urn(&error_id);
        }

        let trace_id = ctx.trace_id().to_owned();
        let head = ctx.response_mut();
        head.status = status;
        head.headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static(APPLICATION_PROBLEM_JSON),
        );
        // error ids are always valid header values
        if let Ok(value) = HeaderValue::from_str(&error_id) {
            head.headers.insert(ERROR_ID_HEADER, value);
        }
        match HeaderValue::from_str(&trace_id) {
            Ok(value) => {
                head.headers.insert(TRACE_ID_HEADER, value);
            }
            Err(_) => tracing::warn!(%error_id, "trace id is not a valid header value; x-trace-id omitted"),
        }

        validate_extensions(&mut problem.extensions, &self.options);

        let error_code = if problem.code.trim().is_empty() {
            UNKNOWN_ERROR_CODE.to_owned()
        } else {
            problem.code.clone()
        };

        FormattingResult {
            error_id,
            error_code,
        }
    }

    /// Serializes the problem body.
    ///
    /// # Errors
    /// Returns the serializer error; a [`Problem`] only fails to serialize if a custom
    /// extension value does.
    pub fn to_body(problem: &Problem) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(problem)
    }

    /// Writes the JSON body, giving up as soon as the request is cancelled.
    ///
    /// # Errors
    /// [`WriteError::Cancelled`] if the request's cancellation token fires first, otherwise
    /// any serialization or I/O failure.
    pub async fn write<W>(
        &self,
        ctx: &RequestContext,
        problem: &Problem,
        writer: &mut W,
    ) -> Result<(), WriteError>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let body = Self::to_body(problem)?;
        let cancel = ctx.cancellation();

        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::debug!(trace_id = %ctx.trace_id(), "problem write cancelled");
                Err(WriteError::Cancelled)
            }
            res = async {
                writer.write_all(&body).await?;
                writer.flush().await
            } => res.map_err(WriteError::from),
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;

    fn problem() -> Problem {
        Problem::new(StatusCode::NOT_FOUND, "Resource not found", "order 7 not found")
            .with_code("NOT_FOUND")
            .with_trace_id("trace-from-builder")
    }

    #[test]
    fn format_assigns_identifiers_and_headers() {
        let formatter = ProblemFormatter::default();
        let mut ctx = RequestContext::new("trace-abc", "/orders/7");
        let mut p = problem();

        let result = formatter.format(&mut ctx, &mut p, StatusCode::NOT_FOUND);

        assert!(result.error_id.starts_with("err-"));
        assert_eq!(result.error_id.len(), 36);
        assert!(result.error_id[4..].bytes().all(|b| b.is_ascii_hexdigit()));
        assert_eq!(result.error_code, "NOT_FOUND");
        assert_eq!(p.error_id.as_deref(), Some(result.error_id.as_str()));
        assert_eq!(p.trace_id, "trace-abc");
        assert_eq!(p.instance, format!("urn:problem:instance:{}", result.error_id));

        let head = ctx.response();
        assert_eq!(head.status, StatusCode::NOT_FOUND);
        assert_eq!(head.headers[&ERROR_ID_HEADER], result.error_id.as_str());
        assert_eq!(head.headers[&TRACE_ID_HEADER], "trace-abc");
        assert_eq!(head.headers[CONTENT_TYPE], APPLICATION_PROBLEM_JSON);
    }

    #[test]
    fn format_keeps_existing_instance_and_reports_unknown_code() {
        let formatter = ProblemFormatter::default();
        let mut ctx = RequestContext::new("t", "/");
        let mut p = Problem::new(StatusCode::INTERNAL_SERVER_ERROR, "Oops", "")
            .with_instance("urn:problem:instance:fixed");

        let result = formatter.format(&mut ctx, &mut p, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(result.error_code, "UNKNOWN_ERROR");
        assert_eq!(p.instance, "urn:problem:instance:fixed");
    }

    #[test]
    fn format_validates_extensions() {
        let formatter = ProblemFormatter::new(ExtensionValidationOptions {
            max_extensions: 1,
            ..ExtensionValidationOptions::default()
        });
        let mut ctx = RequestContext::new("t", "/");
        let mut p = problem()
            .with_extension("first", 1)
            .with_extension("second", 2);
        let result = formatter.format(&mut ctx, &mut p, StatusCode::NOT_FOUND);

        assert_eq!(p.extensions.len(), 1);
        assert_eq!(p.extension("first"), Some(&json!(1)));
        assert!(p.error_id.is_some());
        assert!(!result.error_id.is_empty());
    }

    #[tokio::test]
    async fn write_serializes_the_problem() {
        let formatter = ProblemFormatter::default();
        let mut ctx = RequestContext::new("t", "/");
        let mut p = problem();
        formatter.format(&mut ctx, &mut p, StatusCode::NOT_FOUND);

        let mut out: Vec<u8> = Vec::new();
        formatter.write(&ctx, &p, &mut out).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(body["status"], json!(404));
        assert_eq!(body["errorId"], json!(p.error_id.clone().unwrap()));
    }

    #[tokio::test]
    async fn write_honours_cancellation() {
        let formatter = ProblemFormatter::default();
        let ctx = RequestContext::new("t", "/");
        ctx.cancellation().cancel();

        let mut out: Vec<u8> = Vec::new();
        let err = formatter.write(&ctx, &problem(), &mut out).await.unwrap_err();
        assert!(matches!(err, WriteError::Cancelled));
        assert!(out.is_empty());
    }
}
