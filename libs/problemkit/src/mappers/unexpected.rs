//! Catch-all mapper for faults nothing else recognized

use std::sync::Arc;

use http::StatusCode;
use problemkit_errors::catalog;

use super::problem_from_code;
use crate::context::RequestContext;
use crate::fault::Fault;
use crate::mapper::{Mapped, ProblemMapper};
use crate::sanitize::Sanitizer;

/// Accepts every fault and answers 500 `UNEXPECTED_ERROR`.
pub struct UnexpectedMapper {
    sanitizer: Arc<Sanitizer>,
}

impl UnexpectedMapper {
    #[must_use]
    pub fn new(sanitizer: Arc<Sanitizer>) -> Self {
        Self { sanitizer }
    }
}

impl ProblemMapper for UnexpectedMapper {
    fn name(&self) -> &'static str {
        "unexpected"
    }

    fn can_handle(&self, _fault: &Fault) -> bool {
        true
    }

    fn map(&self, ctx: &RequestContext, fault: &Fault) -> Mapped {
        unexpected_problem(ctx, &self.sanitizer, fault)
    }
}

/// Used by typed mappers handed a fault they do not understand.
pub fn map_unexpected(
    ctx: &RequestContext,
    sanitizer: &Sanitizer,
    fault: &Fault,
    mapper: &str,
) -> Mapped {
    tracing::warn!(
        mapper,
        kind = fault.kind_name(),
        "mapper invoked with a fault it cannot handle; answering with an unexpected-error problem"
    );
    unexpected_problem(ctx, sanitizer, fault)
}

fn unexpected_problem(ctx: &RequestContext, sanitizer: &Sanitizer, fault: &Fault) -> Mapped {
    let status = StatusCode::INTERNAL_SERVER_ERROR;
    let message = fault.to_string();
    let sanitization = sanitizer.sanitize(ctx, fault, Some(&message), true);

    let problem = problem_from_code(ctx, &catalog::UNEXPECTED, status, &sanitization.detail)
        .with_extension("category", "Unhandled")
        .build();

    Mapped {
        status,
        problem,
        sanitization,
    }
}
