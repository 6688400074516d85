// src/server.rs
//
// HTTP surface: ping, the IIIF image route, loop detection, conditional GETs
// and error-to-status mapping. Image work runs on tokio's blocking pool.

use crate::engine::Processor;
use crate::error::IiifError;
use crate::request::{parse, Request};
use crate::resolver::{ResourceResolver, LOOP_DETECTION_HEADER};
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info, instrument, warn};

pub const PING_PATH: &str = "/api/iiif-pipe/ping";
pub const IMAGE_PATH_PREFIX: &str = "/api/iiif-pipe/v1/iiif/";

/// Bump to invalidate every ETag handed out so far.
pub const CACHE_VERSION: &str = "1";

pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(365 * 24 * 60 * 60);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const INITIAL_OUTPUT_CAPACITY: usize = 50 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerOptions {
    pub max_age: Duration,
    pub request_timeout: Duration,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            max_age: DEFAULT_MAX_AGE,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Shared, read-only state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    resolver: Arc<dyn ResourceResolver>,
    processor: Arc<Processor>,
    cache_control: Arc<str>,
    request_timeout: Duration,
}

impl AppState {
    pub fn new(
        resolver: Arc<dyn ResourceResolver>,
        processor: Processor,
        options: ServerOptions,
    ) -> Self {
        Self {
            resolver,
            processor: Arc::new(processor),
            cache_control: cache_control_value(options.max_age).into(),
            request_timeout: options.request_timeout,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(PING_PATH, get(handle_ping))
        .route("/api/iiif-pipe/v1/iiif/*spec", get(handle_image))
        .with_state(state)
}

/// Serves `app` until ctrl-c (or SIGTERM on unix).
pub async fn serve(listener: TcpListener, app: Router) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(address = %addr, "listening");
    }
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to install ctrl-c handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}

/// Hex SHA-256 over the canonical request plus [`CACHE_VERSION`].
pub fn build_etag(request: &Request) -> String {
    etag_for(request, CACHE_VERSION)
}

fn etag_for(request: &Request, version: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(request.to_string().as_bytes());
    hasher.update(version.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn cache_control_value(max_age: Duration) -> String {
    format!("public,s-maxage={}", max_age.as_secs())
}

/// Raw path tail after the image prefix, with the raw query appended.
fn spec_from_uri(uri: &Uri) -> String {
    let tail = uri.path().strip_prefix(IMAGE_PATH_PREFIX).unwrap_or_default();
    match uri.query() {
        Some(query) if !query.is_empty() => format!("{tail}?{query}"),
        _ => tail.to_string(),
    }
}

fn text_response(status: StatusCode, body: impl Into<String>) -> Response {
    (status, [(header::CONTENT_TYPE, "text/plain")], body.into()).into_response()
}

fn error_response(err: &IiifError) -> Response {
    match err {
        IiifError::InvalidSpec { .. } | IiifError::DimensionExceeded { .. } => {
            text_response(StatusCode::BAD_REQUEST, format!("invalid request: {err}"))
        }
        IiifError::InvalidIdentifier { identifier, .. } => text_response(
            StatusCode::BAD_REQUEST,
            format!("invalid identifier {identifier:?}"),
        ),
        IiifError::Timeout { .. } => {
            warn!(error = %err, "upstream timed out");
            text_response(StatusCode::SERVICE_UNAVAILABLE, "timed out")
        }
        _ => {
            if err.is_recoverable() {
                warn!(error = %err, category = ?err.category(), "request failed");
            } else {
                error!(error = %err, category = ?err.category(), "request failed");
            }
            text_response(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
        }
    }
}

async fn handle_ping() -> &'static str {
    "iiif-pipe"
}

#[instrument(skip_all, fields(path = %uri.path()))]
async fn handle_image(State(state): State<AppState>, headers: HeaderMap, uri: Uri) -> Response {
    if headers.contains_key(LOOP_DETECTION_HEADER) {
        warn!(
            header = LOOP_DETECTION_HEADER,
            "request carries loop-detection header, refusing"
        );
        return text_response(StatusCode::FORBIDDEN, "loop detected");
    }

    let request = match parse(&spec_from_uri(&uri)) {
        Ok(request) => request,
        Err(e) => return error_response(&e),
    };

    let etag = build_etag(&request);
    let matched = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.contains(etag.as_str()));
    if matched {
        return StatusCode::NOT_MODIFIED.into_response();
    }

    let worker = {
        let state = state.clone();
        tokio::task::spawn_blocking(move || {
            let mut buf = Vec::with_capacity(INITIAL_OUTPUT_CAPACITY);
            state
                .processor
                .process(&request, state.resolver.as_ref(), &mut buf)
                .map(|result| (result, buf))
        })
    };

    let (result, body) = match tokio::time::timeout(state.request_timeout, worker).await {
        Err(_) => {
            warn!(timeout = ?state.request_timeout, "request deadline exceeded");
            return text_response(StatusCode::SERVICE_UNAVAILABLE, "timed out");
        }
        Ok(Err(join_error)) => {
            error!(error = %join_error, "processing worker failed");
            return text_response(StatusCode::INTERNAL_SERVER_ERROR, "internal error");
        }
        Ok(Ok(Err(e))) => return error_response(&e),
        Ok(Ok(Ok(done))) => done,
    };

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, result.content_type.to_string()),
            (header::ETAG, format!("\"{etag}\"")),
            (header::CACHE_CONTROL, state.cache_control.to_string()),
        ],
        body,
    )
        .into_response()
}
