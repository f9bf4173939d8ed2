//! Per-request logging for the gateway router.
//!
//! Built on `tower_http::trace`: every request gets a span carrying its
//! method and path, and one line is logged when the response is ready.
//! Server errors are logged at WARN so failed generations stand out.

use std::time::Duration;

use axum::http::{Request, Response};
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::trace::{MakeSpan, OnResponse, TraceLayer};
use tracing::Span;

/// Trace layer applied to the whole router.
pub type RequestTraceLayer =
    TraceLayer<SharedClassifier<ServerErrorsAsFailures>, RequestSpan, (), ResponseLogger, (), (), ()>;

/// Build the request trace layer.
pub fn request_trace_layer() -> RequestTraceLayer {
    TraceLayer::new_for_http()
        .make_span_with(RequestSpan)
        .on_request(())
        .on_response(ResponseLogger)
        .on_body_chunk(())
        .on_eos(())
        // Handler errors are already logged by `Error::into_response`.
        .on_failure(())
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RequestSpan;

impl<B> MakeSpan<B> for RequestSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        tracing::info_span!(
            "request",
            method = %request.method(),
            path = %request.uri().path(),
        )
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseLogger;

impl<B> OnResponse<B> for ResponseLogger {
    fn on_response(self, response: &Response<B>, latency: Duration, _span: &Span) {
        let status = response.status().as_u16();
        let duration_ms = latency.as_millis() as u64;

        if response.status().is_server_error() {
            tracing::warn!(status, duration_ms, "HTTP request failed");
        } else {
            tracing::info!(status, duration_ms, "HTTP request");
        }
    }
}
