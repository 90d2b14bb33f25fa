//! Core error types for problemkit
//!
//! This crate provides pure data types for error handling, with no resolution
//! logic. It includes:
//! - Stable error identities (`ErrorCode`) and the built-in catalog
//! - The `StructuredError` capability and the built-in application error kinds
//! - RFC 7807 Problem documents (`Problem`, `ProblemBuilder`)
//! - Extension validation applied before a problem leaves the process
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod builder;
pub mod catalog;
pub mod code;
pub mod extensions;
pub mod kinds;
pub mod problem;

// Re-export commonly used types
pub use builder::ProblemBuilder;
pub use code::{ErrorCode, StructuredError};
pub use extensions::{ExtensionPredicate, ExtensionValidationOptions, validate_extensions};
pub use kinds::{AuthorizationError, DomainError, NotFoundError, RateLimitError, ValidationError};
pub use problem::{APPLICATION_PROBLEM_JSON, Problem, RESERVED_MEMBERS, instance_urn};
