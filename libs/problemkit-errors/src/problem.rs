//! RFC 7807 Problem Details for HTTP APIs (pure data model, no HTTP framework dependencies)

use std::fmt::Display;

use http::StatusCode;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Content type for Problem Details as per RFC 7807.
pub const APPLICATION_PROBLEM_JSON: &str = "application/problem+json";

/// Top-level members owned by [`Problem`]; extensions may never shadow them.
pub const RESERVED_MEMBERS: [&str; 8] = [
    "type", "title", "status", "detail", "instance", "code", "traceId", "errorId",
];

/// Builds the `instance` URN for a problem occurrence.
pub fn instance_urn(id: impl Display) -> String {
    format!("urn:problem:instance:{id}")
}

/// Custom serializer for `StatusCode` to u16
#[allow(clippy::trivially_copy_pass_by_ref)] // serde requires &T signature
fn serialize_status_code<S>(status: &StatusCode, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_u16(status.as_u16())
}

/// Custom deserializer for `StatusCode` from u16
fn deserialize_status_code<'de, D>(deserializer: D) -> Result<StatusCode, D::Error>
where
    D: Deserializer<'de>,
{
    let code = u16::deserialize(deserializer)?;
    StatusCode::from_u16(code).map_err(serde::de::Error::custom)
}

/// RFC 7807 Problem Details document.
///
/// `code`, `traceId` and `errorId` are always emitted as top-level members. Everything else a
/// mapper attaches lives in `extensions`, which is flattened into the same JSON object and
/// keeps insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[must_use]
pub struct Problem {
    /// A URI reference that identifies the problem type.
    #[serde(rename = "type")]
    pub type_url: String,
    /// A short, human-readable summary of the problem type.
    pub title: String,
    /// The HTTP status code for this occurrence of the problem.
    /// Serializes as u16 for RFC 7807 compatibility.
    #[serde(
        serialize_with = "serialize_status_code",
        deserialize_with = "deserialize_status_code"
    )]
    pub status: StatusCode,
    /// A human-readable explanation specific to this occurrence of the problem.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub detail: String,
    /// URN identifying this occurrence.
    #[serde(default)]
    pub instance: String,
    /// Machine-readable error code defined by the application.
    #[serde(default)]
    pub code: String,
    /// Trace id correlating the response with telemetry.
    #[serde(rename = "traceId", default)]
    pub trace_id: String,
    /// Server-generated id of this error occurrence, assigned when the response is formatted.
    #[serde(rename = "errorId", default, skip_serializing_if = "Option::is_none")]
    pub error_id: Option<String>,
    /// Additional members (`errors`, `sqlErrorNumber`, `upstreamStatus`, `category`, ...).
    #[serde(flatten)]
    pub extensions: Map<String, Value>,
}

impl Problem {
    /// Create a new Problem with the given status, title, and detail.
    pub fn new(status: StatusCode, title: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            type_url: "about:blank".to_owned(),
            title: title.into(),
            status,
            detail: detail.into(),
            instance: String::new(),
            code: String::new(),
            trace_id: String::new(),
            error_id: None,
            extensions: Map::new(),
        }
    }

    pub fn with_type(mut self, type_url: impl Into<String>) -> Self {
        self.type_url = type_url.into();
        self
    }

    pub fn with_instance(mut self, uri: impl Into<String>) -> Self {
        self.instance = uri.into();
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = code.into();
        self
    }

    pub fn with_trace_id(mut self, id: impl Into<String>) -> Self {
        self.trace_id = id.into();
        self
    }

    /// Adds an extension member. Reserved member names are ignored.
    pub fn with_extension(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        if !is_reserved(&key) {
            self.extensions.insert(key, value.into());
        }
        self
    }

    #[must_use]
    pub fn extension(&self, key: &str) -> Option<&Value> {
        self.extensions.get(key)
    }
}

pub(crate) fn is_reserved(key: &str) -> bool {
    RESERVED_MEMBERS.contains(&key)
}

/// Axum integration: make Problem directly usable as a response
#[cfg(feature = "axum")]
impl axum::response::IntoResponse for Problem {
    fn into_response(self) -> axum::response::Response {
        use axum::http::HeaderValue;

        let status = self.status;
        let mut resp = axum::Json(self).into_response();
        *resp.status_mut() = status;
        resp.headers_mut().insert(
            axum::http::header::CONTENT_TYPE,
            HeaderValue::from_static(APPLICATION_PROBLEM_JSON),
        );
        resp
    }
}
