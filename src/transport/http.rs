//! Streamable-HTTP transport: one POST in, one JSON-RPC body out.
//!
//! Sessions are optional here. A client that sends `initialize` without an
//! `mcp-session-id` header gets a fresh session id back in that header and
//! may echo it on later requests; a header naming an unknown or expired
//! session is rejected before the body is looked at.

use async_trait::async_trait;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::mcp::protocol::DEFAULT_PROTOCOL_VERSION;
use crate::mcp::TransportKind;
use crate::transport::{serve_http, transport_error, AppState, Shutdown, Transport, TransportError};

/// Header carrying the session id in both directions
pub const SESSION_HEADER: &str = "mcp-session-id";

#[derive(Debug, Clone)]
pub struct StreamableHttpTransport {
    addr: String,
    state: AppState,
}

impl StreamableHttpTransport {
    pub fn new(addr: impl Into<String>, state: AppState) -> Self {
        Self {
            addr: addr.into(),
            state,
        }
    }

    pub fn routes() -> Router<AppState> {
        Router::new().route("/mcp", post(handle_post).get(describe).delete(close_session))
    }
}

#[async_trait]
impl Transport for StreamableHttpTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Http
    }

    async fn serve(&self, shutdown: Shutdown) -> Result<(), TransportError> {
        let state = AppState {
            shutdown,
            ..self.state.clone()
        };
        serve_http(&self.addr, state, Self::routes()).await
    }
}

fn session_header(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn is_initialize(message: &Value) -> bool {
    message.get("method").and_then(Value::as_str) == Some("initialize")
        && message.get("id").is_some()
}

/// POST /mcp
async fn handle_post(State(state): State<AppState>, headers: HeaderMap, body: String) -> Response {
    let mut session_id = None;
    if let Some(id) = session_header(&headers) {
        if let Err(err) = state.sessions.touch(id) {
            tracing::debug!(session = %id, error = %err, "rejected HTTP message");
            return transport_error(StatusCode::BAD_REQUEST, err.to_string());
        }
        session_id = Some(id.to_string());
    }

    let reply = match serde_json::from_str::<Value>(&body) {
        Ok(message) => {
            if session_id.is_none() && is_initialize(&message) {
                let session = state.sessions.create(TransportKind::Http);
                tracing::info!(session = %session.id, "HTTP session created");
                session_id = Some(session.id);
            }
            state.dispatcher.handle_value(message).await.map(|r| r.to_json())
        }
        Err(_) => state.dispatcher.handle_raw(&body).await,
    };

    let Some(reply) = reply else {
        return StatusCode::ACCEPTED.into_response();
    };

    let mut response = (
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        reply,
    )
        .into_response();
    if let Some(id) = session_id.and_then(|id| HeaderValue::from_str(&id).ok()) {
        response.headers_mut().insert(SESSION_HEADER, id);
    }
    response
}

/// GET /mcp - describe the transport
async fn describe() -> Json<Value> {
    Json(json!({
        "transport": "streamable-http",
        "protocol": "MCP",
        "version": DEFAULT_PROTOCOL_VERSION,
        "usage": "POST JSON-RPC requests to this endpoint",
        "session_header": SESSION_HEADER,
    }))
}

/// DELETE /mcp - close a session explicitly
async fn close_session(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(id) = session_header(&headers) else {
        return transport_error(StatusCode::BAD_REQUEST, format!("Missing {SESSION_HEADER} header"));
    };
    match state.sessions.remove(id) {
        Some(_) => {
            tracing::info!(session = %id, "HTTP session closed");
            StatusCode::NO_CONTENT.into_response()
        }
        None => transport_error(StatusCode::NOT_FOUND, format!("Unknown session: {id}")),
    }
}
