//! stdio transport.
//!
//! - one UTF-8 JSON-RPC message per line on stdin
//! - one reply per line on stdout, never with embedded newlines
//! - stdout carries nothing else; logs go to stderr
//!
//! Requests are dispatched concurrently, so a slow tool call does not hold
//! up a `ping` sent after it. Replies are written in completion order.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::{FuturesUnordered, StreamExt};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::mcp::{McpDispatcher, SessionManager, TransportKind};
use crate::transport::{wait_for_shutdown, Shutdown, Transport, TransportError};

#[derive(Debug, Clone)]
pub struct StdioTransport {
    dispatcher: Arc<McpDispatcher>,
    sessions: Arc<SessionManager>,
}

impl StdioTransport {
    pub fn new(dispatcher: Arc<McpDispatcher>, sessions: Arc<SessionManager>) -> Self {
        Self { dispatcher, sessions }
    }

    /// Serve messages from `reader` until EOF or shutdown
    ///
    /// On EOF the replies still in flight are written before returning; on
    /// shutdown they are dropped.
    pub async fn run<R, W>(&self, reader: R, writer: &mut W, mut shutdown: Shutdown) -> Result<(), TransportError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let session = self.sessions.create(self.kind());
        let dispatcher = &self.dispatcher;
        let mut lines = reader.lines();
        let mut in_flight = FuturesUnordered::new();
        let mut input_open = true;

        let result = loop {
            if !input_open && in_flight.is_empty() {
                tracing::info!("stdin closed");
                break Ok(());
            }

            tokio::select! {
                line = lines.next_line(), if input_open => match line {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        if let Err(err) = self.sessions.touch(&session.id) {
                            tracing::warn!(error = %err, "stdio session missing");
                        }
                        in_flight.push(async move { dispatcher.handle_raw(&line).await });
                    }
                    Ok(None) => input_open = false,
                    Err(err) => break Err(TransportError::Io(err)),
                },
                Some(reply) = in_flight.next(), if !in_flight.is_empty() => {
                    if let Some(reply) = reply {
                        if let Err(err) = write_line(writer, &reply).await {
                            break Err(TransportError::Io(err));
                        }
                    }
                }
                _ = wait_for_shutdown(&mut shutdown) => {
                    tracing::info!(pending = in_flight.len(), "stdio transport shutting down");
                    break Ok(());
                }
            }
        };

        self.sessions.remove(&session.id);
        result
    }
}

async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, message: &str) -> std::io::Result<()> {
    debug_assert!(!message.contains('\n'), "JSON-RPC message must not contain newlines");
    writer.write_all(message.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}

#[async_trait]
impl Transport for StdioTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Stdio
    }

    async fn serve(&self, shutdown: Shutdown) -> Result<(), TransportError> {
        tracing::info!("serving MCP over stdio");
        let reader = BufReader::new(tokio::io::stdin());
        let mut writer = tokio::io::stdout();
        self.run(reader, &mut writer, shutdown).await
    }
}
