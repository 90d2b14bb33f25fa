//! Upstream HTTP call failures and timeouts

use std::sync::Arc;

use http::StatusCode;
use problemkit_errors::catalog;

use super::problem_from_code;
use super::unexpected::map_unexpected;
use crate::context::RequestContext;
use crate::fault::Fault;
use crate::mapper::{Mapped, ProblemMapper};
use crate::sanitize::Sanitizer;

/// 429 stays 429, 408 becomes 504, anything else (or no response) becomes 502.
#[must_use]
pub fn gateway_status(upstream: Option<StatusCode>) -> StatusCode {
    match upstream {
        Some(StatusCode::TOO_MANY_REQUESTS) => StatusCode::TOO_MANY_REQUESTS,
        Some(StatusCode::REQUEST_TIMEOUT) => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::BAD_GATEWAY,
    }
}

pub struct UpstreamHttpMapper {
    sanitizer: Arc<Sanitizer>,
}

impl UpstreamHttpMapper {
    #[must_use]
    pub fn new(sanitizer: Arc<Sanitizer>) -> Self {
        Self { sanitizer }
    }
}

impl ProblemMapper for UpstreamHttpMapper {
    fn name(&self) -> &'static str {
        "upstream_http"
    }

    fn can_handle(&self, fault: &Fault) -> bool {
        matches!(fault, Fault::Upstream(_))
    }

    fn map(&self, ctx: &RequestContext, fault: &Fault) -> Mapped {
        let Fault::Upstream(err) = fault else {
            return map_unexpected(ctx, &self.sanitizer, fault, self.name());
        };
        let status = gateway_status(err.status);
        let sanitization =
            self.sanitizer
                .sanitize(ctx, fault, Some("External dependency call failed."), false);

        let problem = problem_from_code(ctx, &catalog::HTTP_UPSTREAM, status, &sanitization.detail)
            .with_extension("upstreamStatus", err.status.map_or(0, |s| s.as_u16()))
            .build();

        Mapped {
            status,
            problem,
            sanitization,
        }
    }
}

pub struct UpstreamTimeoutMapper {
    sanitizer: Arc<Sanitizer>,
}

impl UpstreamTimeoutMapper {
    #[must_use]
    pub fn new(sanitizer: Arc<Sanitizer>) -> Self {
        Self { sanitizer }
    }
}

impl ProblemMapper for UpstreamTimeoutMapper {
    fn name(&self) -> &'static str {
        "upstream_timeout"
    }

    fn can_handle(&self, fault: &Fault) -> bool {
        matches!(fault, Fault::Timeout(_))
    }

    fn map(&self, ctx: &RequestContext, fault: &Fault) -> Mapped {
        if !self.can_handle(fault) {
            return map_unexpected(ctx, &self.sanitizer, fault, self.name());
        }
        let status = StatusCode::GATEWAY_TIMEOUT;
        let sanitization = self.sanitizer.sanitize(
            ctx,
            fault,
            Some("The upstream service did not respond in time."),
            false,
        );

        let problem =
            problem_from_code(ctx, &catalog::HTTP_TIMEOUT, status, &sanitization.detail).build();

        Mapped {
            status,
            problem,
            sanitization,
        }
    }
}
