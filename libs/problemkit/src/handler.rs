//! The error pipeline: resolve, map, format, enrich, log, write
//!
//! An [`ErrorPipeline`] is built once at startup and shared as `Arc<ErrorPipeline>`. All
//! per-request state lives in the [`RequestContext`]; the pipeline itself is immutable.

use std::fmt;
use std::sync::Arc;

use axum::body::Body;
use axum::response::{IntoResponse, Response};
use http::StatusCode;
use problemkit_errors::{ExtensionPredicate, Problem};
use tokio::io::AsyncWrite;
use tracing::Span;

use crate::classify::{DbErrorClassifier, SqlServerClassifier};
use crate::config::ErrorHandlingConfig;
use crate::context::RequestContext;
use crate::enrich::{ErrorReport, NoopSpanEnricher, SpanEnricher, TracingSpanEnricher};
use crate::environment::HostEnvironment;
use crate::fault::Fault;
use crate::formatter::{FormattingResult, ProblemFormatter, WriteError};
use crate::mappers::default_registrations;
use crate::registry::{MapperRegistration, MapperRegistry, RegistryError};
use crate::sanitize::{DisclosurePredicate, SanitizationResult, Sanitizer};

/// Outcome of [`ErrorPipeline::process`].
#[derive(Debug, Clone)]
pub struct ProcessedError {
    pub status: StatusCode,
    pub problem: Problem,
    pub formatting: FormattingResult,
    pub sanitization: SanitizationResult,
}

pub struct ErrorPipeline {
    registry: MapperRegistry,
    formatter: ProblemFormatter,
    enricher: Arc<dyn SpanEnricher>,
    sanitizer: Arc<Sanitizer>,
}

impl fmt::Debug for ErrorPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorPipeline")
            .field("registry", &self.registry)
            .field("formatter", &self.formatter)
            .field("sanitizer", &self.sanitizer)
            .finish_non_exhaustive()
    }
}

impl ErrorPipeline {
    #[must_use]
    pub fn builder(config: ErrorHandlingConfig) -> ErrorPipelineBuilder {
        ErrorPipelineBuilder::new(config)
    }

    #[must_use]
    pub fn registry(&self) -> &MapperRegistry {
        &self.registry
    }

    #[must_use]
    pub fn sanitizer(&self) -> &Arc<Sanitizer> {
        &self.sanitizer
    }

    /// Maps `fault` to a finalized problem, records it on `span` and logs it.
    ///
    /// Sets status and headers on `ctx`; does not write a body.
    pub fn process(&self, ctx: &mut RequestContext, fault: &Fault, span: &Span) -> ProcessedError {
        let mapper = self.registry.resolve(fault);
        let mapped = mapper.map(ctx, fault);
        let status = mapped.status;
        let mut problem = mapped.problem;

        let formatting = self.formatter.format(ctx, &mut problem, status);

        self.enricher.enrich(
            ctx,
            &ErrorReport {
                fault,
                problem: &problem,
                status,
                sanitization: &mapped.sanitization,
                formatting: &formatting,
            },
            span,
        );

        if status.is_server_error() {
            tracing::error!(
                trace_id = %ctx.trace_id(),
                path = %ctx.path(),
                error_id = %formatting.error_id,
                error_code = %formatting.error_code,
                status = status.as_u16(),
                problem_type = %problem.type_url,
                mapper = mapper.name(),
                error = %fault,
                "request failed"
            );
        } else {
            tracing::warn!(
                trace_id = %ctx.trace_id(),
                path = %ctx.path(),
                error_id = %formatting.error_id,
                error_code = %formatting.error_code,
                status = status.as_u16(),
                problem_type = %problem.type_url,
                mapper = mapper.name(),
                "request rejected"
            );
        }

        ProcessedError {
            status,
            problem,
            formatting,
            sanitization: mapped.sanitization,
        }
    }

    /// [`Self::process`] followed by writing the body to `writer`.
    ///
    /// # Errors
    /// Returns [`WriteError`] when the request is cancelled or the body cannot be written;
    /// status and headers on `ctx` are already set at that point.
    pub async fn handle<W>(
        &self,
        ctx: &mut RequestContext,
        fault: &Fault,
        span: &Span,
        writer: &mut W,
    ) -> Result<ProcessedError, WriteError>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let processed = self.process(ctx, fault, span);
        self.formatter.write(ctx, &processed.problem, writer).await?;
        Ok(processed)
    }

    /// Builds a complete axum response for `fault`.
    #[must_use]
    pub fn respond(&self, mut ctx: RequestContext, fault: &Fault, span: &Span) -> Response {
        let processed = self.process(&mut ctx, fault, span);
        let body = match ProblemFormatter::to_body(&processed.problem) {
            Ok(body) => body,
            Err(err) => {
                tracing::error!(
                    error_id = %processed.formatting.error_id,
                    error = %err,
                    "failed to serialize problem body"
                );
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        };

        let head = ctx.into_response_head();
        let mut response = Response::new(Body::from(body));
        *response.status_mut() = head.status;
        response.headers_mut().extend(head.headers);
        response
    }
}

type MapperFactory = Box<dyn FnOnce(&Arc<Sanitizer>) -> MapperRegistration + Send>;

/// Assembles an [`ErrorPipeline`] from configuration plus host customizations.
pub struct ErrorPipelineBuilder {
    config: ErrorHandlingConfig,
    include_defaults: bool,
    classifier: Arc<dyn DbErrorClassifier>,
    disclosure_predicate: Option<DisclosurePredicate>,
    extension_validator: Option<ExtensionPredicate>,
    enricher: Option<Arc<dyn SpanEnricher>>,
    mappers: Vec<MapperFactory>,
}

impl fmt::Debug for ErrorPipelineBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorPipelineBuilder")
            .field("config", &self.config)
            .field("include_defaults", &self.include_defaults)
            .field("custom_mappers", &self.mappers.len())
            .finish_non_exhaustive()
    }
}

impl ErrorPipelineBuilder {
    #[must_use]
    pub fn new(config: ErrorHandlingConfig) -> Self {
        Self {
            config,
            include_defaults: true,
            classifier: Arc::new(SqlServerClassifier),
            disclosure_predicate: None,
            extension_validator: None,
            enricher: None,
            mappers: Vec::new(),
        }
    }

    /// Starts from an empty registration table. At least one fallback must then be added.
    #[must_use]
    pub fn without_default_mappers(mut self) -> Self {
        self.include_defaults = false;
        self
    }

    #[must_use]
    pub fn with_classifier(mut self, classifier: impl DbErrorClassifier + 'static) -> Self {
        self.classifier = Arc::new(classifier);
        self
    }

    #[must_use]
    pub fn with_disclosure_predicate(
        mut self,
        predicate: impl Fn(&Fault) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.disclosure_predicate = Some(Arc::new(predicate));
        self
    }

    #[must_use]
    pub fn with_extension_validator(
        mut self,
        validator: impl Fn(&str, &serde_json::Value) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.extension_validator = Some(Arc::new(validator));
        self
    }

    /// Replaces the enricher chosen from `telemetry.enabled`.
    #[must_use]
    pub fn with_enricher(mut self, enricher: impl SpanEnricher + 'static) -> Self {
        self.enricher = Some(Arc::new(enricher));
        self
    }

    /// Adds a primary mapper. The factory receives the pipeline's shared sanitizer.
    #[must_use]
    pub fn with_mapper<M, F>(mut self, priority: i32, factory: F) -> Self
    where
        M: crate::mapper::ProblemMapper + 'static,
        F: FnOnce(Arc<Sanitizer>) -> M + Send + 'static,
    {
        self.mappers.push(Box::new(move |sanitizer: &Arc<Sanitizer>| {
            MapperRegistration::primary(factory(Arc::clone(sanitizer)), priority)
        }));
        self
    }

    /// Adds a fallback mapper, consulted only after every primary mapper declined.
    #[must_use]
    pub fn with_fallback_mapper<M, F>(mut self, priority: i32, factory: F) -> Self
    where
        M: crate::mapper::ProblemMapper + 'static,
        F: FnOnce(Arc<Sanitizer>) -> M + Send + 'static,
    {
        self.mappers.push(Box::new(move |sanitizer: &Arc<Sanitizer>| {
            MapperRegistration::fallback(factory(Arc::clone(sanitizer)), priority)
        }));
        self
    }

    /// Adds a ready-made registration.
    #[must_use]
    pub fn with_registration(mut self, registration: MapperRegistration) -> Self {
        self.mappers.push(Box::new(move |_: &Arc<Sanitizer>| registration));
        self
    }

    /// # Errors
    /// Returns [`RegistryError::NoFallback`] when the final table has no fallback mapper.
    pub fn build(self) -> Result<ErrorPipeline, RegistryError> {
        let environment = HostEnvironment::from_config(&self.config.environment);
        let mut sanitizer = Sanitizer::new(self.config.sanitizer, environment);
        if let Some(predicate) = self.disclosure_predicate {
            sanitizer = sanitizer.with_predicate(predicate);
        }
        let sanitizer = Arc::new(sanitizer);

        let mut registrations = if self.include_defaults {
            default_registrations(&sanitizer, &self.classifier)
        } else {
            Vec::new()
        };
        registrations.extend(self.mappers.into_iter().map(|factory| factory(&sanitizer)));
        let registry = MapperRegistry::new(registrations)?;

        let mut extensions = self.config.extensions;
        if let Some(validator) = self.extension_validator {
            extensions = extensions.with_custom_validator(validator);
        }

        let enricher: Arc<dyn SpanEnricher> = match self.enricher {
            Some(enricher) => enricher,
            None if self.config.telemetry.enabled => Arc::new(TracingSpanEnricher::new(
                Arc::clone(&sanitizer),
                self.config.telemetry.disclosure,
            )),
            None => Arc::new(NoopSpanEnricher),
        };

        tracing::info!(
            environment = sanitizer.environment().name(),
            developer = sanitizer.environment().is_developer(),
            mappers = registry.primary().len() + registry.fallback().len(),
            "error pipeline ready"
        );

        Ok(ErrorPipeline {
            registry,
            formatter: ProblemFormatter::new(extensions),
            enricher,
            sanitizer,
        })
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::mappers::UnexpectedMapper;
    use problemkit_errors::NotFoundError;
    use tracing_test::traced_test;

    #[test]
    fn default_pipeline_builds() {
        let pipeline = ErrorPipeline::builder(ErrorHandlingConfig::default())
            .build()
            .unwrap();
        assert_eq!(pipeline.registry().fallback().len(), 2);
        assert!(!pipeline.sanitizer().environment().is_developer());
    }

    #[test]
    fn empty_table_without_fallback_is_rejected() {
        let err = ErrorPipeline::builder(ErrorHandlingConfig::default())
            .without_default_mappers()
            .build()
            .unwrap_err();
        assert!(matches!(err, RegistryError::NoFallback));
    }

    #[test]
    fn custom_fallback_is_enough() {
        let pipeline = ErrorPipeline::builder(ErrorHandlingConfig::default())
            .without_default_mappers()
            .with_fallback_mapper(0, UnexpectedMapper::new)
            .build()
            .unwrap();

        let mut ctx = RequestContext::new("trace-1", "/orders/1");
        let processed = pipeline.process(
            &mut ctx,
            &Fault::from(NotFoundError::new("order 1")),
            &Span::none(),
        );
        assert_eq!(processed.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(processed.problem.code, "UNEXPECTED_ERROR");
    }

    #[test]
    fn process_sets_identifiers_and_head() {
        let pipeline = ErrorPipeline::builder(ErrorHandlingConfig::default())
            .build()
            .unwrap();
        let mut ctx = RequestContext::new("trace-9", "/orders/9");
        let processed = pipeline.process(
            &mut ctx,
            &Fault::from(NotFoundError::new("order 9")),
            &Span::none(),
        );

        assert_eq!(processed.status, StatusCode::NOT_FOUND);
        assert_eq!(processed.problem.trace_id, "trace-9");
        assert_eq!(
            processed.problem.error_id.as_deref(),
            Some(processed.formatting.error_id.as_str())
        );
        assert_eq!(ctx.response().status, StatusCode::NOT_FOUND);
    }

    #[test]
    #[traced_test]
    fn client_errors_log_a_warning_and_server_errors_an_error() {
        let pipeline = ErrorPipeline::builder(ErrorHandlingConfig::default())
            .build()
            .unwrap();

        let mut ctx = RequestContext::new("trace-log", "/orders/4");
        pipeline.process(&mut ctx, &Fault::from(NotFoundError::new("order 4")), &Span::none());
        assert!(logs_contain("request rejected"));
        assert!(logs_contain("NOT_FOUND"));

        let mut ctx = RequestContext::new("trace-log", "/orders/4");
        pipeline.process(
            &mut ctx,
            &Fault::unrecognized(anyhow::anyhow!("ledger offline")),
            &Span::none(),
        );
        assert!(logs_contain("request failed"));
        assert!(logs_contain("UNEXPECTED_ERROR"));
    }
}
