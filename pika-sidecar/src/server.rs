//! HTTP endpoint around the analysis engine

use std::future::Future;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::{Query, State};
use axum::http::header::{HeaderValue, ACCESS_CONTROL_ALLOW_ORIGIN};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use pika_engine::{AnalysisEngine, AnalysisRecord};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

/// Printed on stdout once the listener is bound
pub const READY_PREFIX: &str = "SIDECAR_READY";
/// Printed on stdout after a graceful shutdown
pub const SHUTDOWN_LINE: &str = "SIDECAR_SHUTDOWN";

const SERVICE_NAME: &str = "Pika Analysis Sidecar";
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Clone)]
pub struct AppState {
    engine: Arc<AnalysisEngine>,
}

impl AppState {
    pub fn new(engine: Arc<AnalysisEngine>) -> Self {
        Self { engine }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AnalyzeQuery {
    pub path: Option<String>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Debug, Serialize)]
struct IndexResponse {
    name: &'static str,
    version: &'static str,
    endpoints: [&'static str; 2],
}

/// HTTP error variants mapped to JSON responses
#[derive(Debug)]
pub enum ApiError {
    BadRequest(&'static str),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.to_string()),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/analyze", get(analyze))
        .layer(axum::middleware::map_response(allow_any_origin))
        .with_state(state)
}

/// Bind, announce readiness on stdout, and serve until Ctrl-C
pub async fn run(engine: Arc<AnalysisEngine>, host: &str, port: u16) -> anyhow::Result<()> {
    let listener = TcpListener::bind((host, port))
        .await
        .with_context(|| format!("failed to bind {}:{}", host, port))?;

    serve(listener, engine, &mut std::io::stdout(), shutdown_signal()).await
}

/// Serve on a bound listener, writing the readiness and shutdown lines to `out`
///
/// The readiness line carries the port the listener actually holds, so a
/// listener bound to port 0 reports the port the OS picked.
pub async fn serve<W, F>(
    listener: TcpListener,
    engine: Arc<AnalysisEngine>,
    out: &mut W,
    shutdown: F,
) -> anyhow::Result<()>
where
    W: Write,
    F: Future<Output = ()> + Send + 'static,
{
    let local_addr = listener
        .local_addr()
        .context("failed to read bound address")?;

    tracing::info!(%local_addr, "sidecar listening");
    announce(out, &format!("{} port={}", READY_PREFIX, local_addr.port()))?;

    let router = build_router(AppState::new(engine));
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .context("http server terminated")?;

    tracing::info!("sidecar stopped");
    announce(out, SHUTDOWN_LINE)?;
    Ok(())
}

/// Write one line and flush it so a parent process sees it immediately
fn announce<W: Write>(out: &mut W, line: &str) -> anyhow::Result<()> {
    writeln!(out, "{}", line).context("failed to write announcement")?;
    out.flush().context("failed to flush announcement")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}

async fn allow_any_origin(mut response: Response) -> Response {
    response
        .headers_mut()
        .insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    response
}

async fn index() -> Json<IndexResponse> {
    Json(IndexResponse {
        name: SERVICE_NAME,
        version: VERSION,
        endpoints: ["/health", "/analyze"],
    })
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "running",
        version: VERSION,
    })
}

async fn analyze(
    State(state): State<AppState>,
    Query(query): Query<AnalyzeQuery>,
) -> Result<Json<AnalysisRecord>, ApiError> {
    let path = query
        .path
        .filter(|p| !p.is_empty())
        .ok_or(ApiError::BadRequest("missing 'path' query parameter"))?;

    tracing::debug!(%path, "analyze request");
    let engine = Arc::clone(&state.engine);
    let outcome = tokio::task::spawn_blocking(move || engine.analyze_file(Path::new(&path)))
        .await
        .map_err(|err| ApiError::Internal(format!("analysis task failed: {}", err)))?;

    Ok(Json(outcome.to_record()))
}
