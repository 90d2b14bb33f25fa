//! Error-resolution pipeline producing RFC 7807 problem responses
//!
//! A failure enters as a [`Fault`], is matched to a mapper by priority, sanitized according to
//! the host environment, finalized with error and trace identifiers, recorded on the current
//! tracing span and written as `application/problem+json`.
//!
//! - [`ErrorPipeline`] ties the stages together; build it once with [`ErrorPipeline::builder`]
//! - [`problem_middleware`] plugs the pipeline into an axum router
//! - [`ErrorHandlingConfig`] loads settings through figment (defaults, YAML, `PROBLEMKIT__*`)
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod classify;
pub mod config;
pub mod context;
pub mod enrich;
pub mod environment;
pub mod fault;
pub mod formatter;
pub mod handler;
pub mod mapper;
pub mod mappers;
pub mod middleware;
pub mod registry;
pub mod sanitize;
pub mod telemetry;

pub use classify::{DbClassification, DbErrorClassifier, SqlServerClassifier};
pub use config::{ConfigError, ErrorHandlingConfig};
pub use context::{RequestContext, ResponseHead};
pub use enrich::{
    EnricherConfig, ErrorReport, NoopSpanEnricher, SpanEnricher, TelemetryDisclosure,
    TracingSpanEnricher,
};
pub use environment::{EnvironmentConfig, HostEnvironment};
pub use fault::{DatabaseError, Fault, TimeoutError, UpstreamError};
pub use formatter::{FormattingResult, ProblemFormatter, WriteError};
pub use handler::{ErrorPipeline, ErrorPipelineBuilder, ProcessedError};
pub use mapper::{Mapped, ProblemMapper};
pub use middleware::{FaultExtension, problem_middleware};
pub use registry::{MapperRegistration, MapperRegistry, RegistryError};
pub use sanitize::{DisclosurePredicate, SanitizationResult, Sanitizer, SanitizerConfig};

pub use problemkit_errors as errors;
