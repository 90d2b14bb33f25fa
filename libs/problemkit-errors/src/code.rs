//! Error identity and the structured error capability

use std::borrow::Cow;
use std::fmt;

use http::StatusCode;

/// Stable identity of a domain or infrastructure error.
///
/// `code` is a short machine identifier (`"VALIDATION"`), `title` a human summary and
/// `type_uri` an optional link to documentation for the problem type. Values are compared by
/// content and never change after construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ErrorCode {
    code: Cow<'static, str>,
    title: Cow<'static, str>,
    type_uri: Option<Cow<'static, str>>,
}

impl ErrorCode {
    /// Const constructor used by catalog entries.
    #[must_use]
    pub const fn from_static(
        code: &'static str,
        title: &'static str,
        type_uri: Option<&'static str>,
    ) -> Self {
        let type_uri = match type_uri {
            Some(uri) => Some(Cow::Borrowed(uri)),
            None => None,
        };
        Self {
            code: Cow::Borrowed(code),
            title: Cow::Borrowed(title),
            type_uri,
        }
    }

    pub fn new(code: impl Into<Cow<'static, str>>, title: impl Into<Cow<'static, str>>) -> Self {
        Self {
            code: code.into(),
            title: title.into(),
            type_uri: None,
        }
    }

    #[must_use]
    pub fn with_type_uri(mut self, type_uri: impl Into<Cow<'static, str>>) -> Self {
        self.type_uri = Some(type_uri.into());
        self
    }

    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn type_uri(&self) -> Option<&str> {
        self.type_uri.as_deref()
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code)
    }
}

/// Capability shared by every recognized application error.
///
/// Implementors are ordinary `std::error::Error` types; the pipeline reaches concrete kinds
/// through downcasting, so the trait stays object safe and open for consumer-defined kinds.
pub trait StructuredError: std::error::Error + Send + Sync + 'static {
    /// Canonical code for the failure.
    fn code(&self) -> &ErrorCode;

    /// Caller-facing detail. Defaults to none so mappers fall back to the error message.
    fn detail(&self) -> Option<&str> {
        None
    }

    /// Whether retrying the same operation may succeed.
    fn is_transient(&self) -> bool {
        false
    }

    /// Status the error would like to surface with; mappers pick a default when absent.
    fn preferred_status(&self) -> Option<StatusCode> {
        None
    }

    /// Stable kind name matched against the sanitizer allow-list.
    fn kind(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
