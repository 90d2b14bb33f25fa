//! Axum integration
//!
//! Handlers return `Result<_, Fault>`. [`Fault`]'s `IntoResponse` parks the fault in the
//! response extensions; [`problem_middleware`] picks it up and replaces the response with the
//! pipeline's problem document.
//!
//! ```ignore
//! let pipeline = Arc::new(ErrorPipeline::builder(config).build()?);
//! let app = Router::new()
//!     .route("/orders/{id}", get(get_order))
//!     .layer(axum::middleware::from_fn_with_state(pipeline, problem_middleware));
//! ```

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use http::StatusCode;
use tracing::Span;

use crate::context::RequestContext;
use crate::fault::Fault;
use crate::handler::ErrorPipeline;

/// Response extension carrying a fault to [`problem_middleware`].
#[derive(Clone)]
pub struct FaultExtension(pub Arc<Fault>);

impl IntoResponse for Fault {
    fn into_response(self) -> Response {
        let mut response = StatusCode::INTERNAL_SERVER_ERROR.into_response();
        response
            .extensions_mut()
            .insert(FaultExtension(Arc::new(self)));
        response
    }
}

/// Replaces responses carrying a [`FaultExtension`] with a problem response.
///
/// The request context is taken from the incoming headers before the request is handed on.
pub async fn problem_middleware(
    State(pipeline): State<Arc<ErrorPipeline>>,
    req: Request,
    next: Next,
) -> Response {
    let (parts, body) = req.into_parts();
    let ctx = RequestContext::from_parts(&parts);
    let response = next.run(Request::from_parts(parts, body)).await;

    match response.extensions().get::<FaultExtension>() {
        Some(FaultExtension(fault)) => pipeline.respond(ctx, fault, &Span::current()),
        None => response,
    }
}
