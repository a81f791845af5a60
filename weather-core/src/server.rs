//! HTTP surface of the gateway.
//!
//! ## Endpoints
//!
//! - `GET /api/weatherwrapper/status` - liveness, plain text `It Works`
//! - `GET /api/weatherwrapper/{location}` - current conditions and forecast
//! - `GET /api/weatherwrapper/{location}/{startDate}` - a single date, or `last{N}days`
//! - `GET /api/weatherwrapper/{location}/{startDate}/{endDate}` - a date range
//!
//! Weather routes pass through [`sanitize_query`] first; handlers only ever
//! see [`SanitizedParameters`].

use std::sync::Arc;

use anyhow::Context;
use axum::{
    Extension, Router,
    body::Body,
    extract::{Path, Request, State, rejection::PathRejection},
    http::{Method, StatusCode, Uri},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::Utc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, info_span, warn};

use crate::{
    RuleCatalog, Validator,
    config::GatewayConfig,
    envelope::{MSG_NOT_FOUND, ResultEnvelope},
    provider::{WeatherProvider, provider_from_config},
    target::UpstreamTarget,
    validator::{RawParameters, SanitizedParameters},
};

pub const ERR_INVALID_PATH: &str = "Invalid Request Path";
pub const STATUS_BODY: &str = "It Works";

/// Shared, read-only request dependencies.
#[derive(Debug, Clone)]
pub struct AppState {
    validator: Arc<Validator>,
    provider: Arc<dyn WeatherProvider>,
}

impl AppState {
    pub fn new(validator: Arc<Validator>, provider: Arc<dyn WeatherProvider>) -> Self {
        Self { validator, provider }
    }

    /// Build the catalog, validator and upstream client once for the process.
    pub fn from_config(config: &GatewayConfig) -> anyhow::Result<Self> {
        let catalog = RuleCatalog::standard().context("Failed to build parameter catalog")?;
        let validator = Arc::new(Validator::new(Arc::new(catalog)));
        let provider = provider_from_config(&config.upstream)?;
        Ok(Self::new(validator, provider))
    }
}

/// Build the full router with all routes and middleware.
pub fn router(state: AppState) -> Router {
    let weather = Router::new()
        .route(
            "/api/weatherwrapper/:location",
            get(location).fallback(method_not_allowed),
        )
        .route(
            "/api/weatherwrapper/:location/:start",
            get(location_on).fallback(method_not_allowed),
        )
        .route(
            "/api/weatherwrapper/:location/:start/:end",
            get(location_between).fallback(method_not_allowed),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), sanitize_query));

    Router::new()
        .route("/api/weatherwrapper/status", get(status))
        .merge(weather)
        .fallback(not_found)
        // Span carries the path only; the query holds the API key.
        .layer(TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
            info_span!("request", method = %req.method(), path = %req.uri().path())
        }))
        .with_state(state)
}

/// Bind and serve until Ctrl-C.
pub async fn serve(config: &GatewayConfig) -> anyhow::Result<()> {
    let state = AppState::from_config(config)?;
    let addr = config.bind_addr()?;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!(%addr, upstream = %config.upstream.base_url, "weather gateway listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server terminated unexpectedly")
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown requested"),
        Err(e) => {
            warn!(error = %e, "failed to listen for Ctrl-C; running until killed");
            std::future::pending::<()>().await;
        }
    }
}

/// Validate the raw query and attach the sanitized result to the request.
///
/// Rejections short-circuit with a 400 envelope; the handler (and therefore
/// the upstream) is never reached.
pub async fn sanitize_query(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let raw = RawParameters::from_query(request.uri().query().unwrap_or_default());

    match state.validator.validate(&raw) {
        Ok(sanitized) => {
            debug!(params = %sanitized.redacted_query(), "query accepted");
            request.extensions_mut().insert(sanitized);
            next.run(request).await
        }
        Err(err) => {
            info!(error = %err, "query rejected");
            ResultEnvelope::<()>::bad_request(err.to_string(), request.uri().path())
                .into_response()
        }
    }
}

async fn status() -> &'static str {
    STATUS_BODY
}

async fn location(
    State(state): State<AppState>,
    Extension(params): Extension<SanitizedParameters>,
    path: Result<Path<String>, PathRejection>,
    uri: Uri,
) -> Response {
    match path {
        Ok(Path(location)) => relay(&state, &params, &uri, &location, None, None).await,
        Err(rejection) => invalid_path(&uri, rejection),
    }
}

async fn location_on(
    State(state): State<AppState>,
    Extension(params): Extension<SanitizedParameters>,
    path: Result<Path<(String, String)>, PathRejection>,
    uri: Uri,
) -> Response {
    match path {
        Ok(Path((location, start))) => {
            relay(&state, &params, &uri, &location, Some(&start), None).await
        }
        Err(rejection) => invalid_path(&uri, rejection),
    }
}

async fn location_between(
    State(state): State<AppState>,
    Extension(params): Extension<SanitizedParameters>,
    path: Result<Path<(String, String, String)>, PathRejection>,
    uri: Uri,
) -> Response {
    match path {
        Ok(Path((location, start, end))) => {
            relay(&state, &params, &uri, &location, Some(&start), Some(&end)).await
        }
        Err(rejection) => invalid_path(&uri, rejection),
    }
}

/// Path segments that fail to decode (e.g. invalid UTF-8) still get an envelope.
fn invalid_path(uri: &Uri, rejection: PathRejection) -> Response {
    info!(error = %rejection.body_text(), "request path rejected");
    let status = rejection.status();
    let path = uri.path();
    if status.is_client_error() {
        ResultEnvelope::<()>::client_error(
            rejection.body_text(),
            path,
            status,
            Some(ERR_INVALID_PATH),
        )
        .into_response()
    } else {
        ResultEnvelope::<()>::server_error(rejection.body_text(), path, status, None)
            .into_response()
    }
}

async fn relay(
    state: &AppState,
    params: &SanitizedParameters,
    uri: &Uri,
    location: &str,
    start: Option<&str>,
    end: Option<&str>,
) -> Response {
    let path = uri.path();

    let target = match UpstreamTarget::parse(location, start, end, Utc::now().date_naive()) {
        Ok(target) => target,
        Err(err) => {
            info!(error = %err, "request path rejected");
            return ResultEnvelope::<()>::client_error(
                err.to_string(),
                path,
                StatusCode::BAD_REQUEST,
                Some(ERR_INVALID_PATH),
            )
            .into_response();
        }
    };

    state.provider.forward(params, &target, path).await.into_response()
}

async fn method_not_allowed(method: Method, uri: Uri) -> Response {
    ResultEnvelope::<()>::client_error(
        format!("Method {method} is not allowed on {}", uri.path()),
        uri.path(),
        StatusCode::METHOD_NOT_ALLOWED,
        None,
    )
    .into_response()
}

async fn not_found(uri: Uri) -> Response {
    ResultEnvelope::<()>::not_found(MSG_NOT_FOUND, uri.path()).into_response()
}
