//! Built-in mappers and the default registration table
//!
//! | mapper | priority | fallback |
//! |---|---|---|
//! | validation | 900 | no |
//! | not found | 800 | no |
//! | authorization | 700 | no |
//! | rate limit | 600 | no |
//! | domain | 500 | no |
//! | database | 450 | no |
//! | upstream HTTP | 300 | no |
//! | upstream timeout | 200 | no |
//! | application error | 100 | yes |
//! | unexpected | 0 | yes |

pub mod app;
pub mod database;
pub mod upstream;
pub mod unexpected;

use std::sync::Arc;

use http::StatusCode;
use problemkit_errors::{
    AuthorizationError, DomainError, ErrorCode, NotFoundError, ProblemBuilder, RateLimitError,
};

use crate::classify::DbErrorClassifier;
use crate::context::RequestContext;
use crate::registry::MapperRegistration;
use crate::sanitize::Sanitizer;

pub use app::{AppErrorFallbackMapper, StructuredMapper, ValidationMapper};
pub use database::DatabaseMapper;
pub use unexpected::UnexpectedMapper;
pub use upstream::{UpstreamHttpMapper, UpstreamTimeoutMapper};

pub mod priority {
    pub const VALIDATION: i32 = 900;
    pub const NOT_FOUND: i32 = 800;
    pub const AUTHORIZATION: i32 = 700;
    pub const RATE_LIMIT: i32 = 600;
    pub const DOMAIN: i32 = 500;
    pub const DATABASE: i32 = 450;
    pub const UPSTREAM_HTTP: i32 = 300;
    pub const UPSTREAM_TIMEOUT: i32 = 200;
    pub const APP_FALLBACK: i32 = 100;
    pub const UNEXPECTED: i32 = 0;
}

/// The built-in registration set, in declaration order.
#[must_use]
pub fn default_registrations(
    sanitizer: &Arc<Sanitizer>,
    classifier: &Arc<dyn DbErrorClassifier>,
) -> Vec<MapperRegistration> {
    let s = || Arc::clone(sanitizer);
    vec![
        MapperRegistration::primary(ValidationMapper::new(s()), priority::VALIDATION),
        MapperRegistration::primary(
            StructuredMapper::<NotFoundError>::new("not_found", s(), StatusCode::NOT_FOUND),
            priority::NOT_FOUND,
        ),
        MapperRegistration::primary(
            StructuredMapper::<AuthorizationError>::new("authorization", s(), StatusCode::FORBIDDEN),
            priority::AUTHORIZATION,
        ),
        MapperRegistration::primary(
            StructuredMapper::<RateLimitError>::new(
                "rate_limit",
                s(),
                StatusCode::TOO_MANY_REQUESTS,
            ),
            priority::RATE_LIMIT,
        ),
        MapperRegistration::primary(
            StructuredMapper::<DomainError>::new("domain", s(), StatusCode::BAD_REQUEST),
            priority::DOMAIN,
        ),
        MapperRegistration::primary(
            DatabaseMapper::new(s(), Arc::clone(classifier)),
            priority::DATABASE,
        ),
        MapperRegistration::primary(UpstreamHttpMapper::new(s()), priority::UPSTREAM_HTTP),
        MapperRegistration::primary(UpstreamTimeoutMapper::new(s()), priority::UPSTREAM_TIMEOUT),
        MapperRegistration::fallback(AppErrorFallbackMapper::new(s()), priority::APP_FALLBACK),
        MapperRegistration::fallback(UnexpectedMapper::new(s()), priority::UNEXPECTED),
    ]
}

/// Starts a problem from an error code with a fresh instance URN and the request trace id.
pub fn problem_from_code(
    ctx: &RequestContext,
    code: &ErrorCode,
    status: StatusCode,
    detail: &str,
) -> ProblemBuilder {
    ProblemBuilder::new(ctx.trace_id())
        .with_type(code.type_uri())
        .with_title(code.title())
        .with_detail(detail)
        .with_status(status)
        .with_instance(None::<&str>)
        .with_code(code.code())
        .with_trace_id(None::<&str>)
}
