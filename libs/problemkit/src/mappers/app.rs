//! Mappers for application errors implementing [`StructuredError`]

use std::marker::PhantomData;
use std::sync::Arc;

use http::StatusCode;
use problemkit_errors::{ProblemBuilder, StructuredError, ValidationError};
use serde_json::{Map, Value};

use super::problem_from_code;
use super::unexpected::map_unexpected;
use crate::context::RequestContext;
use crate::fault::Fault;
use crate::mapper::{Mapped, ProblemMapper};
use crate::sanitize::{SanitizationResult, Sanitizer};

/// Shared mapping for structured errors: status from `preferred_status` or `default_status`,
/// the error's own detail treated as sensitive, and `transient: true` for retryable errors.
pub fn map_structured(
    ctx: &RequestContext,
    sanitizer: &Sanitizer,
    fault: &Fault,
    err: &dyn StructuredError,
    default_status: StatusCode,
    extend: impl FnOnce(ProblemBuilder, &SanitizationResult) -> ProblemBuilder,
) -> Mapped {
    let status = err.preferred_status().unwrap_or(default_status);
    let sanitization = sanitizer.sanitize(ctx, fault, err.detail(), true);

    let mut builder = problem_from_code(ctx, err.code(), status, &sanitization.detail);
    if err.is_transient() {
        builder = builder.with_extension("transient", true);
    }
    let problem = extend(builder, &sanitization).build();

    Mapped {
        status,
        problem,
        sanitization,
    }
}

/// Maps exactly one structured error kind `K`.
pub struct StructuredMapper<K> {
    name: &'static str,
    sanitizer: Arc<Sanitizer>,
    default_status: StatusCode,
    _kind: PhantomData<fn() -> K>,
}

impl<K: StructuredError> StructuredMapper<K> {
    #[must_use]
    pub fn new(name: &'static str, sanitizer: Arc<Sanitizer>, default_status: StatusCode) -> Self {
        Self {
            name,
            sanitizer,
            default_status,
            _kind: PhantomData,
        }
    }
}

impl<K: StructuredError> ProblemMapper for StructuredMapper<K> {
    fn name(&self) -> &str {
        self.name
    }

    fn can_handle(&self, fault: &Fault) -> bool {
        fault.downcast_app::<K>().is_some()
    }

    fn map(&self, ctx: &RequestContext, fault: &Fault) -> Mapped {
        match fault.downcast_app::<K>() {
            Some(err) => map_structured(
                ctx,
                &self.sanitizer,
                fault,
                err,
                self.default_status,
                |b, _| b,
            ),
            None => map_unexpected(ctx, &self.sanitizer, fault, self.name),
        }
    }
}

/// 422 with per-field messages under the `errors` extension.
pub struct ValidationMapper {
    sanitizer: Arc<Sanitizer>,
}

impl ValidationMapper {
    #[must_use]
    pub fn new(sanitizer: Arc<Sanitizer>) -> Self {
        Self { sanitizer }
    }
}

impl ProblemMapper for ValidationMapper {
    fn name(&self) -> &'static str {
        "validation"
    }

    fn can_handle(&self, fault: &Fault) -> bool {
        fault.downcast_app::<ValidationError>().is_some()
    }

    fn map(&self, ctx: &RequestContext, fault: &Fault) -> Mapped {
        let Some(err) = fault.downcast_app::<ValidationError>() else {
            return map_unexpected(ctx, &self.sanitizer, fault, self.name());
        };
        map_structured(
            ctx,
            &self.sanitizer,
            fault,
            err,
            StatusCode::UNPROCESSABLE_ENTITY,
            |builder, sanitization| {
                if sanitization.is_redacted || err.errors().is_empty() {
                    return builder;
                }
                let errors: Map<String, Value> = err
                    .errors()
                    .iter()
                    .map(|(field, messages)| (field.clone(), Value::from(messages.clone())))
                    .collect();
                builder.with_extension("errors", errors)
            },
        )
    }
}

/// Catches application errors without a dedicated mapper; 500 unless the error prefers
/// another status.
pub struct AppErrorFallbackMapper {
    sanitizer: Arc<Sanitizer>,
}

impl AppErrorFallbackMapper {
    #[must_use]
    pub fn new(sanitizer: Arc<Sanitizer>) -> Self {
        Self { sanitizer }
    }
}

impl ProblemMapper for AppErrorFallbackMapper {
    fn name(&self) -> &'static str {
        "app_fallback"
    }

    fn can_handle(&self, fault: &Fault) -> bool {
        matches!(fault, Fault::App(_))
    }

    fn map(&self, ctx: &RequestContext, fault: &Fault) -> Mapped {
        match fault.as_structured() {
            Some(err) => map_structured(
                ctx,
                &self.sanitizer,
                fault,
                err,
                StatusCode::INTERNAL_SERVER_ERROR,
                |b, _| b,
            ),
            None => map_unexpected(ctx, &self.sanitizer, fault, self.name()),
        }
    }
}
