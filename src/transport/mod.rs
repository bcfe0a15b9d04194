//! Transport adapters.
//!
//! Every adapter decodes one JSON-RPC message at a time, hands it to the
//! shared [`McpDispatcher`] and frames the reply its own way:
//!
//! - [`StdioTransport`]: one message per line on stdin/stdout
//! - [`SseTransport`]: replies pushed as `data:` frames on a long-lived
//!   event stream, requests posted to a companion URL
//! - [`StreamableHttpTransport`]: one POST in, one JSON body out
//!
//! The two HTTP adapters share a listener setup and a few service routes
//! (`/`, `/health`, `/fetch`), see [`serve_http`] and [`service_routes`].

mod http;
mod sse;
mod stdio;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::mcp::{McpDispatcher, SessionManager, ToolError, TransportKind};

pub use http::{StreamableHttpTransport, SESSION_HEADER};
pub use sse::SseTransport;
pub use stdio::StdioTransport;

/// Receiver side of the process-wide shutdown signal
pub type Shutdown = watch::Receiver<bool>;

/// Errors that end a transport
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A way of exposing the dispatcher to clients
#[async_trait]
pub trait Transport: Send + Sync {
    /// The session kind this transport creates
    fn kind(&self) -> TransportKind;

    /// Serve until the input ends or `shutdown` flips to `true`
    async fn serve(&self, shutdown: Shutdown) -> Result<(), TransportError>;
}

/// Timing knobs for the HTTP transports
#[derive(Debug, Clone)]
pub struct HttpSettings {
    /// Interval between SSE heartbeat comments
    pub heartbeat: Duration,
    /// Hard cap on the age of an SSE connection
    pub sse_max_age: Duration,
    /// Interval of the background expiry sweep
    pub sweep_interval: Duration,
    /// Transports reported by `/` and `/health`
    pub transports: Vec<TransportKind>,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            heartbeat: Duration::from_secs(30),
            sse_max_age: Duration::from_secs(300),
            sweep_interval: Duration::from_secs(60),
            transports: vec![TransportKind::Sse, TransportKind::Http],
        }
    }
}

/// State shared by every HTTP handler
#[derive(Debug, Clone)]
pub struct AppState {
    pub dispatcher: Arc<McpDispatcher>,
    pub sessions: Arc<SessionManager>,
    pub settings: Arc<HttpSettings>,
    pub shutdown: Shutdown,
}

impl AppState {
    pub fn new(
        dispatcher: Arc<McpDispatcher>,
        sessions: Arc<SessionManager>,
        settings: HttpSettings,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            dispatcher,
            sessions,
            settings: Arc::new(settings),
            shutdown,
        }
    }
}

/// JSON error body for failures that happen before JSON-RPC parsing
pub(crate) fn transport_error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

/// Routes served by every HTTP listener
pub fn service_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(service_info))
        .route("/health", get(health))
        .route("/fetch", get(fetch))
}

/// Attach state and the common layers to a set of transport routes
pub fn build_router(state: AppState, routes: Router<AppState>) -> Router {
    service_routes()
        .merge(routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `addr` and serve `routes` until shutdown
///
/// Also runs the periodic session sweep for as long as the listener is up.
pub async fn serve_http(
    addr: &str,
    state: AppState,
    routes: Router<AppState>,
) -> Result<(), TransportError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| TransportError::Bind {
            addr: addr.to_string(),
            source,
        })?;
    let local: SocketAddr = listener.local_addr()?;
    tracing::info!(address = %local, transports = ?state.settings.transports, "HTTP transport listening");

    let sweeper = tokio::spawn(sweep_sessions(
        state.sessions.clone(),
        state.settings.sweep_interval,
        state.shutdown.clone(),
    ));

    let mut shutdown = state.shutdown.clone();
    let app = build_router(state, routes);
    let result = axum::serve(listener, app)
        .with_graceful_shutdown(async move { wait_for_shutdown(&mut shutdown).await })
        .await;

    sweeper.abort();
    tracing::info!("HTTP transport stopped");
    result.map_err(TransportError::Io)
}

/// Resolve once the shutdown flag is set or its sender is gone
pub async fn wait_for_shutdown(shutdown: &mut Shutdown) {
    while !*shutdown.borrow() {
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

async fn sweep_sessions(sessions: Arc<SessionManager>, every: Duration, mut shutdown: Shutdown) {
    let mut ticker = tokio::time::interval(every);
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let expired = sessions.sweep();
                if !expired.is_empty() {
                    tracing::info!(count = expired.len(), "expired idle sessions");
                }
            }
            _ = wait_for_shutdown(&mut shutdown) => break,
        }
    }
}

async fn service_info(State(state): State<AppState>) -> Json<serde_json::Value> {
    let transports = &state.settings.transports;
    let mut endpoints = serde_json::Map::new();
    endpoints.insert("health".into(), json!("GET /health"));
    endpoints.insert("fetch".into(), json!("GET /fetch?url=<documentation url>"));
    if transports.contains(&TransportKind::Sse) {
        endpoints.insert("sse".into(), json!("GET /sse"));
        endpoints.insert("messages".into(), json!("POST /messages?session_id=<id>"));
    }
    if transports.contains(&TransportKind::Http) {
        endpoints.insert("mcp".into(), json!("POST /mcp"));
    }

    let tools: Vec<&str> = state
        .dispatcher
        .tools()
        .all()
        .iter()
        .map(|tool| tool.name.as_str())
        .collect();

    Json(json!({
        "name": crate::mcp::SERVER_NAME,
        "version": crate::VERSION,
        "description": "MCP server for searching, reading and exploring AWS documentation",
        "transports": transports,
        "endpoints": endpoints,
        "tools": tools,
    }))
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "transports": state.settings.transports,
        "sessions": state.sessions.len(),
    }))
}

#[derive(Debug, Deserialize)]
struct FetchQuery {
    url: Option<String>,
}

/// Direct documentation read without the MCP envelope
async fn fetch(State(state): State<AppState>, Query(query): Query<FetchQuery>) -> Response {
    let Some(url) = query.url.filter(|u| !u.trim().is_empty()) else {
        return transport_error(
            StatusCode::BAD_REQUEST,
            "Missing url parameter. Usage: /fetch?url=https://docs.aws.amazon.com/...",
        );
    };

    let result = state
        .dispatcher
        .tools()
        .invoke("read_documentation", json!({ "url": url }))
        .await;

    match result {
        Ok(result) => Json(json!({
            "url": url,
            "content": result.first_text().unwrap_or_default(),
        }))
        .into_response(),
        Err(err @ (ToolError::InvalidUrl(_) | ToolError::Validation(_))) => {
            transport_error(StatusCode::BAD_REQUEST, err.to_string())
        }
        Err(err @ ToolError::Timeout(_)) => {
            transport_error(StatusCode::GATEWAY_TIMEOUT, err.to_string())
        }
        Err(err) => transport_error(StatusCode::BAD_GATEWAY, err.to_string()),
    }
}
