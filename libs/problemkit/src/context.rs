//! Per-request view the pipeline works against

use http::request::Parts;
use http::{HeaderMap, StatusCode};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// W3C Trace Context header name
pub const TRACEPARENT: &str = "traceparent";
pub const X_TRACE_ID: &str = "x-trace-id";
pub const X_REQUEST_ID: &str = "x-request-id";

/// Status and headers the pipeline sets for the error response.
#[derive(Debug, Clone)]
pub struct ResponseHead {
    pub status: StatusCode,
    pub headers: HeaderMap,
}

impl Default for ResponseHead {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
        }
    }
}

/// Host request data: trace id, path, response head sink and cancellation signal.
#[derive(Debug, Clone)]
pub struct RequestContext {
    trace_id: String,
    path: String,
    response: ResponseHead,
    cancellation: CancellationToken,
}

fn generate_trace_id() -> String {
    Uuid::new_v4().simple().to_string()
}

impl RequestContext {
    /// A blank `trace_id` is replaced by a fresh 32-hex id.
    pub fn new(trace_id: impl Into<String>, path: impl Into<String>) -> Self {
        let mut trace_id = trace_id.into();
        if trace_id.trim().is_empty() {
            trace_id = generate_trace_id();
        }
        Self {
            trace_id,
            path: path.into(),
            response: ResponseHead::default(),
            cancellation: CancellationToken::new(),
        }
    }

    /// Builds a context from request parts.
    ///
    /// The trace id comes from `traceparent`, then `x-trace-id`, then `x-request-id`; a fresh
    /// 32-hex id is generated when none is usable.
    #[must_use]
    pub fn from_parts(parts: &Parts) -> Self {
        let trace_id = trace_id_from_headers(&parts.headers).unwrap_or_else(generate_trace_id);
        Self::new(trace_id, parts.uri.path())
    }

    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    #[must_use]
    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn response(&self) -> &ResponseHead {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut ResponseHead {
        &mut self.response
    }

    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub(crate) fn into_response_head(self) -> ResponseHead {
        self.response
    }
}

/// Parse trace ID from W3C traceparent header (format: "00-{trace_id}-{span_id}-{flags}")
#[must_use]
pub fn parse_trace_id(traceparent: &str) -> Option<String> {
    let parts: Vec<&str> = traceparent.trim().split('-').collect();
    match parts.as_slice() {
        ["00", trace_id, _span_id, _flags, ..]
            if trace_id.len() == 32
                && trace_id.bytes().all(|b| b.is_ascii_hexdigit())
                && trace_id.bytes().any(|b| b != b'0') =>
        {
            Some(trace_id.to_ascii_lowercase())
        }
        _ => None,
    }
}

fn trace_id_from_headers(headers: &HeaderMap) -> Option<String> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    header(TRACEPARENT)
        .and_then(parse_trace_id)
        .or_else(|| header(X_TRACE_ID).map(str::to_owned))
        .or_else(|| header(X_REQUEST_ID).map(str::to_owned))
}
