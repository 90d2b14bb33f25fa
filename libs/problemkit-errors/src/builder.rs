//! Fluent construction of [`Problem`] documents with request-scoped defaults

use http::StatusCode;
use serde_json::Value;
use uuid::Uuid;

use crate::problem::{Problem, instance_urn, is_reserved};

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Accumulates problem members; blank inputs never overwrite an earlier value.
///
/// The builder is created with the request trace id so [`ProblemBuilder::build`] can always
/// populate `traceId`, and generates a fresh `instance` URN when none was given.
#[derive(Debug, Clone)]
#[must_use]
pub struct ProblemBuilder {
    problem: Problem,
    request_trace_id: String,
}

impl ProblemBuilder {
    /// Starts from an empty 500 problem.
    pub fn new(request_trace_id: impl Into<String>) -> Self {
        Self::from_problem(
            Problem::new(StatusCode::INTERNAL_SERVER_ERROR, "", ""),
            request_trace_id,
        )
    }

    /// Wraps a pre-populated problem.
    pub fn from_problem(problem: Problem, request_trace_id: impl Into<String>) -> Self {
        Self {
            problem,
            request_trace_id: request_trace_id.into(),
        }
    }

    pub fn with_type<'a>(mut self, type_url: impl Into<Option<&'a str>>) -> Self {
        if let Some(v) = non_blank(type_url.into()) {
            v.clone_into(&mut self.problem.type_url);
        }
        self
    }

    pub fn with_title<'a>(mut self, title: impl Into<Option<&'a str>>) -> Self {
        if let Some(v) = non_blank(title.into()) {
            v.clone_into(&mut self.problem.title);
        }
        self
    }

    pub fn with_detail<'a>(mut self, detail: impl Into<Option<&'a str>>) -> Self {
        if let Some(v) = non_blank(detail.into()) {
            v.clone_into(&mut self.problem.detail);
        }
        self
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.problem.status = status;
        self
    }

    /// Sets the instance URI, or a fresh `urn:problem:instance:<uuid>` when blank.
    pub fn with_instance<'a>(mut self, instance: impl Into<Option<&'a str>>) -> Self {
        self.problem.instance = match non_blank(instance.into()) {
            Some(v) => v.to_owned(),
            None => instance_urn(Uuid::new_v4()),
        };
        self
    }

    pub fn with_code<'a>(mut self, code: impl Into<Option<&'a str>>) -> Self {
        if let Some(v) = non_blank(code.into()) {
            v.clone_into(&mut self.problem.code);
        }
        self
    }

    /// Sets the trace id, falling back to the request trace id when blank.
    pub fn with_trace_id<'a>(mut self, trace_id: impl Into<Option<&'a str>>) -> Self {
        self.problem.trace_id = match non_blank(trace_id.into()) {
            Some(v) => v.to_owned(),
            None => self.request_trace_id.clone(),
        };
        self
    }

    /// Adds an extension member. Blank and reserved keys are ignored.
    pub fn with_extension(mut self, key: &str, value: impl Into<Value>) -> Self {
        if !key.trim().is_empty() && !is_reserved(key) {
            self.problem.extensions.insert(key.to_owned(), value.into());
        }
        self
    }

    /// Finalizes the problem, guaranteeing `instance` and `traceId` are populated.
    pub fn build(mut self) -> Problem {
        if self.problem.instance.trim().is_empty() {
            self.problem.instance = instance_urn(Uuid::new_v4());
        }
        if self.problem.trace_id.trim().is_empty() {
            self.problem.trace_id = self.request_trace_id;
        }
        self.problem
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn blank_setters_keep_previous_values() {
        let p = ProblemBuilder::new("trace-1")
            .with_type("/errors/validation")
            .with_title("Validation failed")
            .with_detail("amount is invalid")
            .with_code("VALIDATION")
            .with_type(None::<&str>)
            .with_title("   ")
            .with_detail("")
            .with_code(None::<&str>)
            .build();

        assert_eq!(p.type_url, "/errors/validation");
        assert_eq!(p.title, "Validation failed");
        assert_eq!(p.detail, "amount is invalid");
        assert_eq!(p.code, "VALIDATION");
    }

    #[test]
    fn build_fills_instance_and_trace_id() {
        let p = ProblemBuilder::new("trace-42").build();
        assert!(p.instance.starts_with("urn:problem:instance:"));
        assert_eq!(p.trace_id, "trace-42");
        assert_eq!(p.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(p.type_url, "about:blank");
    }

    #[test]
    fn explicit_instance_and_trace_id_win() {
        let p = ProblemBuilder::new("request-trace")
            .with_instance("urn:problem:instance:fixed")
            .with_trace_id("upstream-trace")
            .build();
        assert_eq!(p.instance, "urn:problem:instance:fixed");
        assert_eq!(p.trace_id, "upstream-trace");
    }

    #[test]
    fn blank_instance_generates_fresh_urn() {
        let a = ProblemBuilder::new("t").with_instance(None::<&str>).build();
        let b = ProblemBuilder::new("t").with_instance("").build();
        assert!(a.instance.starts_with("urn:problem:instance:"));
        assert_ne!(a.instance, b.instance);
    }

    #[test]
    fn extensions_skip_blank_and_reserved_keys() {
        let p = ProblemBuilder::new("t")
            .with_extension("sqlErrorNumber", 1205)
            .with_extension(" ", "ignored")
            .with_extension("errorId", "spoofed")
            .build();
        assert_eq!(p.extensions.len(), 1);
        assert_eq!(p.extension("sqlErrorNumber"), Some(&json!(1205)));
    }

    #[test]
    fn from_problem_preserves_existing_members() {
        let base = Problem::new(StatusCode::PAYMENT_REQUIRED, "Payment declined", "card declined")
            .with_code("payment_declined");
        let p = ProblemBuilder::from_problem(base, "t").with_title(None::<&str>).build();
        assert_eq!(p.status, StatusCode::PAYMENT_REQUIRED);
        assert_eq!(p.title, "Payment declined");
        assert_eq!(p.code, "payment_declined");
    }
}
