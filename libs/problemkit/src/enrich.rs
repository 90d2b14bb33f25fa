//! Projects a resolved failure onto a tracing span
//!
//! The enricher computes a [`SpanEnrichment`] (tags plus the `exception` and `problem-details`
//! events) and applies it to the span. With the `otel` feature the tags become OpenTelemetry
//! span attributes and the span status is set to error; without it only the events are
//! recorded, as ordinary tracing events parented to the span.

use std::sync::Arc;

use http::StatusCode;
use problemkit_errors::Problem;
use serde::{Deserialize, Serialize};
use tracing::Span;

use crate::context::RequestContext;
use crate::fault::Fault;
use crate::formatter::FormattingResult;
use crate::sanitize::{SanitizationResult, Sanitizer};

/// Name of the span opened when the caller has no enabled span.
pub const SYNTHETIC_SPAN_NAME: &str = "errors.enricher";
pub const EXCEPTION_EVENT: &str = "exception";
pub const PROBLEM_EVENT: &str = "problem-details";

/// How much telemetry may disclose relative to the client response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TelemetryDisclosure {
    /// Reuse the response's sanitization result.
    #[default]
    MatchResponse,
    /// Always record the raw exception type, source and message, even when the client
    /// response is redacted. Stack traces still follow the response's sanitization.
    Operator,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EnricherConfig {
    pub enabled: bool,
    pub disclosure: TelemetryDisclosure,
}

impl Default for EnricherConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            disclosure: TelemetryDisclosure::MatchResponse,
        }
    }
}

/// Everything known about one handled failure once the response is formatted.
#[derive(Debug, Clone, Copy)]
pub struct ErrorReport<'a> {
    pub fault: &'a Fault,
    pub problem: &'a Problem,
    pub status: StatusCode,
    pub sanitization: &'a SanitizationResult,
    pub formatting: &'a FormattingResult,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    Str(String),
    Int(i64),
}

impl AttributeValue {
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            Self::Int(_) => None,
        }
    }
}

/// Ordered key/value pairs with blank values skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes(Vec<(&'static str, AttributeValue)>);

impl Attributes {
    fn push_str(&mut self, key: &'static str, value: impl AsRef<str>) {
        let value = normalize(value.as_ref());
        if !value.is_empty() {
            self.0.push((key, AttributeValue::Str(value)));
        }
    }

    fn push_opt(&mut self, key: &'static str, value: Option<impl AsRef<str>>) {
        if let Some(value) = value {
            self.push_str(key, value);
        }
    }

    fn push_int(&mut self, key: &'static str, value: i64) {
        self.0.push((key, AttributeValue::Int(value)));
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.0.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, (&'static str, AttributeValue)> {
        self.0.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> IntoIterator for &'a Attributes {
    type Item = &'a (&'static str, AttributeValue);
    type IntoIter = std::slice::Iter<'a, (&'static str, AttributeValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// What gets recorded on the span for one failure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpanEnrichment {
    pub tags: Attributes,
    pub exception: Attributes,
    pub problem: Attributes,
    /// Description for the span's error status.
    pub status_description: String,
}

/// Records a handled failure on a span. Implementations must not panic.
pub trait SpanEnricher: Send + Sync {
    fn enrich(&self, ctx: &RequestContext, report: &ErrorReport<'_>, span: &Span);
}

/// Records nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSpanEnricher;

impl SpanEnricher for NoopSpanEnricher {
    fn enrich(&self, _ctx: &RequestContext, _report: &ErrorReport<'_>, _span: &Span) {}
}

#[derive(Debug, Clone)]
pub struct TracingSpanEnricher {
    sanitizer: Arc<Sanitizer>,
    disclosure: TelemetryDisclosure,
}

impl TracingSpanEnricher {
    #[must_use]
    pub fn new(sanitizer: Arc<Sanitizer>, disclosure: TelemetryDisclosure) -> Self {
        Self {
            sanitizer,
            disclosure,
        }
    }

    /// Computes the tags and events without touching any span.
    #[must_use]
    pub fn plan(&self, ctx: &RequestContext, report: &ErrorReport<'_>) -> SpanEnrichment {
        let redacted = match self.disclosure {
            TelemetryDisclosure::MatchResponse => report.sanitization.is_redacted,
            TelemetryDisclosure::Operator => false,
        };

        let exception = exception_attributes(report.fault, report.sanitization, redacted);
        let problem = problem_attributes(report.problem, report.status);

        let mut tags = Attributes::default();
        tags.push_str("problemkit.trace_id", ctx.trace_id());
        tags.push_str("http.request.path", ctx.path());
        tags.push_int("http.response.status_code", i64::from(report.status.as_u16()));
        tags.push_str("problemkit.error.id", &report.formatting.error_id);
        tags.push_str("problemkit.error.code", &report.formatting.error_code);
        tags.push_str("problemkit.problem.type", &report.problem.type_url);
        tags.push_str("problemkit.problem.title", &report.problem.title);
        tags.push_str("deployment.environment", self.sanitizer.environment().name());
        tags.0.extend(exception.iter().cloned());
        tags.0.extend(problem.iter().cloned());

        let status_description = format!(
            "{} {}",
            report.formatting.error_code, report.problem.title
        );

        SpanEnrichment {
            tags,
            exception,
            problem,
            status_description,
        }
    }
}

impl SpanEnricher for TracingSpanEnricher {
    fn enrich(&self, ctx: &RequestContext, report: &ErrorReport<'_>, span: &Span) {
        let enrichment = self.plan(ctx, report);
        if span.is_disabled() {
            let synthetic = tracing::error_span!(
                "errors.enricher",
                trace_id = %ctx.trace_id(),
                error_id = %report.formatting.error_id
            );
            imp::apply(&synthetic, &enrichment);
            // dropped here, which closes it
        } else {
            imp::apply(span, &enrichment);
        }
    }
}

fn exception_attributes(
    fault: &Fault,
    sanitization: &SanitizationResult,
    redacted: bool,
) -> Attributes {
    let mut attrs = Attributes::default();

    if !redacted {
        attrs.push_str("exception.type", fault.type_name());
    }
    if redacted {
        attrs.push_str("exception.message", &sanitization.detail);
    } else {
        attrs.push_str("exception.message", fault.to_string());
    }
    let stack = (sanitization.include_stack_trace && !redacted)
        .then(|| fault.stack_trace())
        .flatten();
    attrs.push_opt("exception.stacktrace", stack.as_deref());
    if !redacted {
        attrs.push_str("exception.source", fault.kind_name());
        let full = match &stack {
            Some(stack) => format!("{}: {fault}\n{stack}", fault.type_name()),
            None => format!("{}: {fault}", fault.type_name()),
        };
        attrs.push_str("exception.full", full);
    }
    attrs
}

fn problem_attributes(problem: &Problem, status: StatusCode) -> Attributes {
    let mut attrs = Attributes::default();
    attrs.push_str("problem.type", &problem.type_url);
    attrs.push_str("problem.code", &problem.code);
    attrs.push_str("problem.title", &problem.title);
    attrs.push_int("problem.status", i64::from(status.as_u16()));
    attrs.push_str("problem.detail", &problem.detail);
    attrs.push_str("problem.instance", &problem.instance);
    attrs.push_str("problem.trace_id", &problem.trace_id);
    attrs.push_opt("problem.error_id", problem.error_id.as_deref());
    if let Some(number) = problem.extension("sqlErrorNumber").and_then(serde_json::Value::as_i64) {
        attrs.push_int("problem.sql_error_number", number);
    }
    attrs.push_opt(
        "problem.category",
        problem.extension("category").and_then(serde_json::Value::as_str),
    );
    if let Some(upstream) = problem.extension("upstreamStatus").and_then(serde_json::Value::as_i64) {
        attrs.push_int("problem.upstream_status", upstream);
    }
    attrs
}

/// CRLF to LF, consecutive duplicate lines collapsed, trailing whitespace trimmed.
fn normalize(value: &str) -> String {
    let unified = value.replace("\r\n", "\n");
    let mut out = String::with_capacity(unified.len());
    let mut prev: Option<&str> = None;
    for line in unified.split('\n') {
        if prev == Some(line) {
            continue;
        }
        if prev.is_some() {
            out.push('\n');
        }
        out.push_str(line);
        prev = Some(line);
    }
    out.truncate(out.trim_end().len());
    out
}

#[cfg(feature = "otel")]
mod imp {
    use opentelemetry::trace::Status;
    use opentelemetry::{KeyValue, Value};
    use tracing::Span;
    use tracing_opentelemetry::OpenTelemetrySpanExt;

    use super::{
        AttributeValue, Attributes, EXCEPTION_EVENT, PROBLEM_EVENT, SpanEnrichment,
    };

    fn to_value(value: &AttributeValue) -> Value {
        match value {
            AttributeValue::Str(s) => Value::from(s.clone()),
            AttributeValue::Int(i) => Value::from(*i),
        }
    }

    fn key_values(attrs: &Attributes) -> Vec<KeyValue> {
        attrs
            .iter()
            .map(|(k, v)| KeyValue::new(*k, to_value(v)))
            .collect()
    }

    pub fn apply(span: &Span, enrichment: &SpanEnrichment) {
        for (key, value) in &enrichment.tags {
            span.set_attribute(*key, to_value(value));
        }
        span.add_event(EXCEPTION_EVENT, key_values(&enrichment.exception));
        span.add_event(PROBLEM_EVENT, key_values(&enrichment.problem));
        span.set_status(Status::error(enrichment.status_description.clone()));
    }
}

#[cfg(not(feature = "otel"))]
mod imp {
    use tracing::Span;

    use super::SpanEnrichment;

    /// Without OpenTelemetry only the two events are recorded.
    pub fn apply(span: &Span, enrichment: &SpanEnrichment) {
        let message = enrichment
            .exception
            .get("exception.message")
            .and_then(super::AttributeValue::as_str)
            .unwrap_or_default();
        let code = enrichment
            .problem
            .get("problem.code")
            .and_then(super::AttributeValue::as_str)
            .unwrap_or_default();
        tracing::error!(parent: span, exception.message = message, "exception");
        tracing::error!(parent: span, problem.code = code, "problem-details");
    }
}
