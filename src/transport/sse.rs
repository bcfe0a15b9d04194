//! Server-Sent Events transport.
//!
//! ## Endpoints
//!
//! - `GET /sse` - open the event stream; the first frame is an `endpoint`
//!   event naming the POST URL for this session
//! - `POST /messages?session_id=<id>` - submit one JSON-RPC message; the
//!   reply arrives on the event stream, the POST itself answers `202`
//!
//! A stream ends when the client goes away, when it reaches the configured
//! maximum age, when its session is expired or removed, or on shutdown.
//! Ending the stream drops its heartbeat and age timers with it and removes
//! the session.

use std::convert::Infallible;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use futures_util::Stream;
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::mcp::{SessionManager, TransportKind};
use crate::transport::{
    serve_http, transport_error, wait_for_shutdown, AppState, Shutdown, Transport, TransportError,
};

/// Replies buffered per connection before POSTs start waiting
const OUTBOUND_BUFFER: usize = 32;

/// SSE adapter bound to one listener address
#[derive(Debug, Clone)]
pub struct SseTransport {
    addr: String,
    state: AppState,
}

impl SseTransport {
    pub fn new(addr: impl Into<String>, state: AppState) -> Self {
        Self {
            addr: addr.into(),
            state,
        }
    }

    pub fn routes() -> Router<AppState> {
        Router::new()
            .route("/sse", get(connect))
            .route("/messages", post(post_message))
            .route("/messages/", post(post_message))
    }
}

#[async_trait]
impl Transport for SseTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Sse
    }

    async fn serve(&self, shutdown: Shutdown) -> Result<(), TransportError> {
        let state = AppState {
            shutdown,
            ..self.state.clone()
        };
        serve_http(&self.addr, state, Self::routes()).await
    }
}

/// Removes the session when the stream is dropped
struct SessionGuard {
    id: String,
    sessions: Arc<SessionManager>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.sessions.remove(&self.id);
        tracing::info!(session = %self.id, "SSE stream closed");
    }
}

/// GET /sse - open an event stream with a fresh session
async fn connect(State(state): State<AppState>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, mut rx) = mpsc::channel::<String>(OUTBOUND_BUFFER);
    let session = state.sessions.create_with_outbound(TransportKind::Sse, tx);
    let endpoint = format!("/messages?session_id={}", urlencoding::encode(&session.id));
    let guard = SessionGuard {
        id: session.id.clone(),
        sessions: state.sessions.clone(),
    };
    let max_age = state.settings.sse_max_age;
    let mut shutdown = state.shutdown.clone();

    let stream = async_stream::stream! {
        let guard = guard;
        yield Ok(Event::default().event("endpoint").data(endpoint));

        let deadline = tokio::time::sleep(max_age);
        tokio::pin!(deadline);

        loop {
            let next = tokio::select! {
                message = rx.recv() => message,
                _ = &mut deadline => {
                    tracing::info!(session = %guard.id, "SSE stream reached its maximum age");
                    None
                }
                _ = wait_for_shutdown(&mut shutdown) => None,
            };
            match next {
                Some(json) => yield Ok(Event::default().event("message").data(json)),
                None => break,
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(state.settings.heartbeat)
            .text("heartbeat"),
    )
}

#[derive(Debug, Deserialize)]
struct MessageQuery {
    #[serde(alias = "sessionId")]
    session_id: Option<String>,
}

/// POST /messages - queue one JSON-RPC message for a session
async fn post_message(
    State(state): State<AppState>,
    Query(query): Query<MessageQuery>,
    body: String,
) -> Response {
    let Some(session_id) = query.session_id else {
        return transport_error(StatusCode::BAD_REQUEST, "Missing session_id query parameter");
    };

    let session = match state.sessions.touch(&session_id) {
        Ok(session) => session,
        Err(err) => {
            tracing::debug!(session = %session_id, error = %err, "rejected SSE message");
            return transport_error(StatusCode::BAD_REQUEST, err.to_string());
        }
    };
    let Some(outbound) = session.outbound().cloned() else {
        return transport_error(StatusCode::BAD_REQUEST, "Session has no event stream");
    };

    let dispatcher = state.dispatcher.clone();
    tokio::spawn(async move {
        if let Some(reply) = dispatcher.handle_raw(&body).await {
            if outbound.send(reply).await.is_err() {
                tracing::debug!(session = %session.id, "stream closed before the reply was sent");
            }
        }
    });

    (StatusCode::ACCEPTED, "Accepted").into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::build_router;
    use crate::transport::test_support::*;
    use crate::transport::HttpSettings;
    use axum::body::{Body, Bytes};
    use axum::http::Request;
    use http_body_util::BodyExt;
    use std::time::Duration;
    use tower::ServiceExt;

    fn app(state: AppState) -> Router {
        build_router(state, SseTransport::routes())
    }

    async fn next_frame(body: &mut Body) -> String {
        loop {
            let frame = tokio::time::timeout(Duration::from_secs(5), body.frame())
                .await
                .expect("timed out waiting for an SSE frame")
                .expect("stream ended")
                .unwrap();
            if let Ok(data) = frame.into_data() {
                let data: Bytes = data;
                return String::from_utf8(data.to_vec()).unwrap();
            }
        }
    }

    fn session_from_endpoint(frame: &str) -> String {
        let data = frame
            .lines()
            .find_map(|line| line.strip_prefix("data: "))
            .unwrap();
        data.split("session_id=").nth(1).unwrap().to_string()
    }

    #[tokio::test]
    async fn test_stream_announces_endpoint_and_relays_replies() {
        let (state, _tx) = state();
        let app = app(state.clone());

        let response = app
            .clone()
            .oneshot(Request::get("/sse").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "text/event-stream");
        let mut body = response.into_body();

        let endpoint = next_frame(&mut body).await;
        assert!(endpoint.starts_with("event: endpoint\ndata: /messages?session_id="));
        let session_id = session_from_endpoint(&endpoint);
        assert_eq!(state.sessions.len(), 1);

        let post = app
            .clone()
            .oneshot(
                Request::post(format!("/messages?session_id={session_id}"))
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(post.status(), StatusCode::ACCEPTED);
        let ack = post.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&ack[..], b"Accepted");

        let message = next_frame(&mut body).await;
        assert!(message.starts_with("event: message\ndata: "));
        let json = message
            .lines()
            .find_map(|line| line.strip_prefix("data: "))
            .unwrap();
        let reply: serde_json::Value = serde_json::from_str(json).unwrap();
        assert_eq!(reply["id"], 1);
        assert_eq!(reply["result"]["tools"].as_array().unwrap().len(), 3);

        drop(body);
        assert!(state.sessions.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_session_rejected_before_parsing() {
        let (state, _tx) = state();
        let response = app(state)
            .oneshot(
                Request::post("/messages?session_id=does-not-exist")
                    .body(Body::from("not even json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Unknown session: does-not-exist");
    }

    #[tokio::test]
    async fn test_missing_session_id() {
        let (state, _tx) = state();
        let response = app(state)
            .oneshot(Request::post("/messages/").body(Body::from("{}")).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_stream_closes_at_max_age() {
        let (state, _tx) = state_with(HttpSettings {
            sse_max_age: Duration::from_millis(50),
            ..HttpSettings::default()
        });
        let response = app(state.clone())
            .oneshot(Request::get("/sse").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let mut body = response.into_body();
        next_frame(&mut body).await;

        let end = tokio::time::timeout(Duration::from_secs(5), async {
            while let Some(frame) = body.frame().await {
                frame.unwrap();
            }
        })
        .await;
        assert!(end.is_ok(), "stream did not close");
        assert!(state.sessions.is_empty());
    }

    #[tokio::test]
    async fn test_stream_emits_heartbeat() {
        let (state, _tx) = state_with(HttpSettings {
            heartbeat: Duration::from_millis(50),
            ..HttpSettings::default()
        });
        let response = app(state)
            .oneshot(Request::get("/sse").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let mut body = response.into_body();

        let endpoint = next_frame(&mut body).await;
        assert!(endpoint.starts_with("event: endpoint"));
        let heartbeat = next_frame(&mut body).await;
        assert!(heartbeat.starts_with(": heartbeat"), "{heartbeat:?}");
    }

    #[tokio::test]
    async fn test_stream_closes_on_shutdown() {
        let (state, tx) = state();
        let response = app(state.clone())
            .oneshot(Request::get("/sse").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let mut body = response.into_body();
        next_frame(&mut body).await;

        tx.send(true).unwrap();
        let end = tokio::time::timeout(Duration::from_secs(5), async {
            while let Some(frame) = body.frame().await {
                frame.unwrap();
            }
        })
        .await;
        assert!(end.is_ok(), "stream did not close on shutdown");
    }

    #[tokio::test]
    async fn test_removed_session_ends_stream() {
        let (state, _tx) = state();
        let response = app(state.clone())
            .oneshot(Request::get("/sse").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let mut body = response.into_body();
        let session_id = session_from_endpoint(&next_frame(&mut body).await);

        state.sessions.remove(&session_id);
        let end = tokio::time::timeout(Duration::from_secs(5), async {
            while let Some(frame) = body.frame().await {
                frame.unwrap();
            }
        })
        .await;
        assert!(end.is_ok(), "stream outlived its session");
    }
}
