use std::time::Duration;

use axum::http::{Request, Response};
use tower_http::trace::{DefaultOnRequest, HttpMakeClassifier, MakeSpan, OnResponse, TraceLayer};
use tracing::Span;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::config::{LogFormat, LoggingConfig};

/// Install the global subscriber. `RUST_LOG` overrides the default level.
/// `LogFormat::Disabled` installs nothing.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let filter = |default: &str| {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
    };

    let result = match config.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter("info"))
            .with_current_span(true)
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter("debug"))
            .try_init(),
        LogFormat::Disabled => return Ok(()),
    };

    result.map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {}", e))
}

/// One span per request, tagged with a fresh request id
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestSpan;

impl<B> MakeSpan<B> for RequestSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        tracing::info_span!(
            "http.request",
            request_id = %Uuid::new_v4(),
            method = %request.method(),
            path = %request.uri().path(),
        )
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RequestCompleted;

impl<B> OnResponse<B> for RequestCompleted {
    fn on_response(self, response: &Response<B>, latency: Duration, _span: &Span) {
        tracing::info!(
            status = response.status().as_u16(),
            latency_ms = latency.as_millis() as u64,
            "request completed"
        );
    }
}

pub fn request_trace_layer(
) -> TraceLayer<HttpMakeClassifier, RequestSpan, DefaultOnRequest, RequestCompleted> {
    TraceLayer::new_for_http()
        .make_span_with(RequestSpan)
        .on_response(RequestCompleted)
}
