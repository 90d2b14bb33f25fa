#![allow(clippy::unwrap_used, clippy::expect_used)]

use http::StatusCode;
use problemkit::errors::{ErrorCode, NotFoundError, StructuredError, ValidationError};
use problemkit::mappers::StructuredMapper;
use problemkit::mappers::app::map_structured;
use problemkit::{
    DatabaseError, ErrorHandlingConfig, ErrorPipeline, Fault, Mapped, ProblemMapper,
    RequestContext, Sanitizer, WriteError,
};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::Span;

fn production() -> ErrorPipeline {
    ErrorPipeline::builder(ErrorHandlingConfig::default())
        .build()
        .unwrap()
}

fn development() -> ErrorPipeline {
    let mut config = ErrorHandlingConfig::default();
    config.environment.name = "Development".to_owned();
    ErrorPipeline::builder(config).build().unwrap()
}

fn ctx() -> RequestContext {
    RequestContext::new("4bf92f3577b34da6a3ce929d0e0e4736", "/payments")
}

#[test]
fn validation_failure_is_422_with_field_errors() {
    let mut ctx = ctx();
    let fault = Fault::from(
        ValidationError::new("Payment request is invalid").with_field_error("amount", "must be > 0"),
    );
    let processed = production().process(&mut ctx, &fault, &Span::none());

    assert_eq!(processed.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(processed.problem.code, "VALIDATION");
    assert_eq!(
        processed.problem.extension("errors"),
        Some(&json!({ "amount": ["must be > 0"] }))
    );
}

#[test]
fn not_found_is_404() {
    let mut ctx = ctx();
    let processed = production().process(
        &mut ctx,
        &Fault::from(NotFoundError::new("payment 42 not found")),
        &Span::none(),
    );
    assert_eq!(processed.status, StatusCode::NOT_FOUND);
    assert_eq!(processed.problem.code, "NOT_FOUND");
    assert_eq!(processed.problem.detail, "payment 42 not found");
}

#[test]
fn sql_deadlock_is_transient_409() {
    let mut ctx = ctx();
    let processed = production().process(
        &mut ctx,
        &Fault::from(DatabaseError::new(1205, "Transaction (Process ID 52) was deadlocked")),
        &Span::none(),
    );
    assert_eq!(processed.status, StatusCode::CONFLICT);
    assert_eq!(processed.problem.code, "INFRA-SQL-DEADLOCK");
    assert_eq!(processed.problem.extension("transient"), Some(&json!(true)));
    assert_eq!(processed.problem.extension("sqlErrorNumber"), Some(&json!(1205)));
    assert!(!processed.problem.detail.contains("Process ID"));
}

#[test]
fn unrecognized_fault_is_redacted_500_in_production() {
    let mut ctx = ctx();
    let fault = Fault::unrecognized(anyhow::anyhow!("connection string Password=s3cret refused"));
    let processed = production().process(&mut ctx, &fault, &Span::none());

    assert_eq!(processed.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(processed.problem.code, "UNEXPECTED_ERROR");
    assert_eq!(processed.problem.detail, "An unexpected error occurred.");
    assert!(processed.sanitization.is_redacted);
    assert!(!processed.sanitization.include_stack_trace);
}

#[test]
fn unrecognized_fault_is_disclosed_in_development() {
    let mut ctx = ctx();
    let fault = Fault::unrecognized(anyhow::anyhow!("index out of range in ledger"));
    let processed = development().process(&mut ctx, &fault, &Span::none());

    assert_eq!(processed.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(processed.problem.detail.contains("index out of range in ledger"));
    assert!(!processed.sanitization.is_redacted);
    assert!(processed.sanitization.include_stack_trace);
}

#[test]
fn every_response_carries_matching_identifiers() {
    let pipeline = production();
    let faults = [
        Fault::from(NotFoundError::new("x")),
        Fault::from(DatabaseError::new(-2, "timeout")),
        Fault::unrecognized(anyhow::anyhow!("boom")),
    ];
    let mut instances = std::collections::HashSet::new();
    for fault in &faults {
        let mut ctx = ctx();
        let processed = pipeline.process(&mut ctx, fault, &Span::none());
        let body = serde_json::to_value(&processed.problem).unwrap();

        let error_id = body["errorId"].as_str().unwrap();
        let trace_id = body["traceId"].as_str().unwrap();
        assert!(!error_id.is_empty());
        assert!(!trace_id.is_empty());

        let headers = &ctx.response().headers;
        assert_eq!(headers["x-error-id"], error_id);
        assert_eq!(headers["x-trace-id"], trace_id);

        let instance = body["instance"].as_str().unwrap();
        assert!(instance.starts_with("urn:problem:instance:"));
        assert!(instances.insert(instance.to_owned()), "instance reused: {instance}");
    }
}

#[test]
fn blank_trace_id_still_yields_a_trace_id() {
    let pipeline = production();
    let mut ctx = RequestContext::new("", "/orders");
    let processed = pipeline.process(&mut ctx, &Fault::from(NotFoundError::new("x")), &Span::none());

    assert!(!processed.problem.trace_id.is_empty());
    assert_eq!(processed.problem.trace_id, ctx.trace_id());
    assert_eq!(ctx.response().headers["x-trace-id"], ctx.trace_id());
}

#[derive(Debug, thiserror::Error)]
#[error("card ending 4242 was declined by the issuer")]
struct PaymentDeclined;

static PAYMENT_DECLINED: ErrorCode = ErrorCode::from_static(
    "PAYMENT_DECLINED",
    "Payment declined",
    Some("/errors/payment-declined"),
);

impl StructuredError for PaymentDeclined {
    fn code(&self) -> &ErrorCode {
        &PAYMENT_DECLINED
    }

    fn detail(&self) -> Option<&str> {
        Some("The payment was declined.")
    }

    fn kind(&self) -> &'static str {
        "payment_declined"
    }
}

/// Consumer mapper that also tags the problem with a retry hint.
struct PaymentDeclinedMapper {
    sanitizer: Arc<Sanitizer>,
}

impl ProblemMapper for PaymentDeclinedMapper {
    fn name(&self) -> &'static str {
        "payment_declined"
    }

    fn can_handle(&self, fault: &Fault) -> bool {
        fault.downcast_app::<PaymentDeclined>().is_some()
    }

    fn map(&self, ctx: &RequestContext, fault: &Fault) -> Mapped {
        let err = fault.downcast_app::<PaymentDeclined>().unwrap();
        map_structured(
            ctx,
            &self.sanitizer,
            fault,
            err,
            StatusCode::PAYMENT_REQUIRED,
            |b, _| b.with_extension("retryable", false),
        )
    }
}

#[test]
fn consumer_mapper_beats_the_application_fallback() {
    let pipeline = ErrorPipeline::builder(ErrorHandlingConfig::default())
        .with_mapper(200, |sanitizer| PaymentDeclinedMapper { sanitizer })
        .build()
        .unwrap();
    let mut ctx = ctx();
    let processed = pipeline.process(&mut ctx, &Fault::from(PaymentDeclined), &Span::none());

    assert_eq!(processed.status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(processed.problem.code, "PAYMENT_DECLINED");
    assert_eq!(processed.problem.extension("retryable"), Some(&json!(false)));

    // without the consumer mapper the application fallback answers 500
    let mut ctx = self::ctx();
    let fallback = production().process(&mut ctx, &Fault::from(PaymentDeclined), &Span::none());
    assert_eq!(fallback.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(fallback.problem.code, "PAYMENT_DECLINED");
}

#[test]
fn generic_structured_mapper_can_be_registered_for_consumer_kinds() {
    let pipeline = ErrorPipeline::builder(ErrorHandlingConfig::default())
        .with_mapper(200, |sanitizer| {
            StructuredMapper::<PaymentDeclined>::new("payment", sanitizer, StatusCode::PAYMENT_REQUIRED)
        })
        .build()
        .unwrap();
    let mut ctx = ctx();
    let processed = pipeline.process(&mut ctx, &Fault::from(PaymentDeclined), &Span::none());
    assert_eq!(processed.status, StatusCode::PAYMENT_REQUIRED);
}

#[test]
fn extension_validator_from_the_builder_vetoes_keys() {
    let pipeline = ErrorPipeline::builder(ErrorHandlingConfig::default())
        .with_extension_validator(|key, _| key != "sqlErrorNumber")
        .build()
        .unwrap();
    let mut ctx = ctx();
    let processed = pipeline.process(
        &mut ctx,
        &Fault::from(DatabaseError::new(2627, "duplicate")),
        &Span::none(),
    );
    assert!(processed.problem.extension("sqlErrorNumber").is_none());
    assert_eq!(processed.problem.code, "INFRA-SQL-DUPKEY");
}

#[test]
fn disclosure_predicate_reveals_selected_faults_in_production() {
    let pipeline = ErrorPipeline::builder(ErrorHandlingConfig::default())
        .with_disclosure_predicate(|fault| matches!(fault, Fault::Unrecognized(_)))
        .build()
        .unwrap();
    let mut ctx = ctx();
    let processed = pipeline.process(
        &mut ctx,
        &Fault::unrecognized(anyhow::anyhow!("feature flag service offline")),
        &Span::none(),
    );
    assert_eq!(processed.problem.detail, "feature flag service offline");
}

#[tokio::test]
async fn handle_writes_the_finalized_body() {
    let pipeline = production();
    let mut ctx = ctx();
    let mut body: Vec<u8> = Vec::new();
    let processed = pipeline
        .handle(&mut ctx, &Fault::from(NotFoundError::new("gone")), &Span::none(), &mut body)
        .await
        .unwrap();

    let written: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(written["status"], json!(404));
    assert_eq!(written["errorId"], json!(processed.formatting.error_id));
}

#[tokio::test]
async fn handle_stops_when_the_request_is_cancelled() {
    let pipeline = production();
    let mut ctx = ctx();
    ctx.cancellation().cancel();
    let mut body: Vec<u8> = Vec::new();

    let err = pipeline
        .handle(&mut ctx, &Fault::from(NotFoundError::new("gone")), &Span::none(), &mut body)
        .await
        .unwrap_err();
    assert!(matches!(err, WriteError::Cancelled));
    assert!(body.is_empty());
    // status and headers are set before the write starts
    assert_eq!(ctx.response().status, StatusCode::NOT_FOUND);
}
