//! The single path every failed request takes on its way out.
//!
//! Handlers return `Result<_, RequestError>`, which already renders the
//! production envelope. This middleware logs each error response once and,
//! when running in development, re-renders it with the diagnostic detail in
//! `stack`. Panics are caught below it by [`catch_panic`], so a request always
//! receives exactly one envelope.

use std::{any::Any, sync::Arc};

use axum::{
    http::{header, Request, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
    Extension, Json,
};

use crate::{
    errors::{ErrorTrace, RequestError},
    AppContext,
};

pub async fn translate_errors<B>(
    Extension(ctx): Extension<Arc<AppContext>>,
    request: Request<B>,
    next: Next<B>,
) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let response = next.run(request).await;

    let Some(trace) = response.extensions().get::<ErrorTrace>().cloned() else {
        return response;
    };
    let status = response.status();
    if trace.internal {
        tracing::error!(%method, %uri, %status, detail = %trace.detail, "request failed");
    } else {
        tracing::debug!(%method, %uri, %status, detail = %trace.detail, "request rejected");
    }

    if !ctx.config.is_development() {
        return response;
    }
    rerender_with_stack(response, trace)
}

fn rerender_with_stack(response: Response, trace: ErrorTrace) -> Response {
    let (parts, _) = response.into_parts();
    let mut envelope = trace.envelope;
    envelope.stack = Some(trace.detail);
    let mut rebuilt = (parts.status, Json(envelope)).into_response();
    for (name, value) in parts.headers.iter() {
        if name != header::CONTENT_LENGTH && name != header::CONTENT_TYPE {
            rebuilt.headers_mut().append(name.clone(), value.clone());
        }
    }
    rebuilt
}

/// Converts a handler panic into an internal-error envelope.
pub fn catch_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_owned()
    } else {
        "handler panicked".to_owned()
    };
    RequestError::Unexpected(anyhow::anyhow!("panic: {detail}")).into_response()
}

pub async fn not_found(uri: Uri) -> RequestError {
    RequestError::NotFound(format!("URL {} was not found", uri))
}
