//! Fault-to-problem mapper contract

use http::StatusCode;
use problemkit_errors::Problem;

use crate::context::RequestContext;
use crate::fault::Fault;
use crate::sanitize::SanitizationResult;

/// A mapper's output: response status, problem document, and the disclosure decision used to
/// build it.
#[derive(Debug, Clone)]
pub struct Mapped {
    pub status: StatusCode,
    pub problem: Problem,
    pub sanitization: SanitizationResult,
}

/// Turns one family of faults into a problem document.
///
/// `map` is only called after `can_handle` returned `true` for the same fault, but
/// implementations must still produce a document for anything they receive.
pub trait ProblemMapper: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    fn can_handle(&self, fault: &Fault) -> bool;

    fn map(&self, ctx: &RequestContext, fault: &Fault) -> Mapped;
}
