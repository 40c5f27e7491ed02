//! WebSocket listener and auxiliary HTTP endpoints.
//!
//! One TCP listener serves both surfaces: upgrade requests on the
//! configured path become subscribers; plain HTTP requests get the
//! small `/health` and `/clients` status objects. Static file serving
//! is an external collaborator and is not handled here.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::hub::Hub;

pub struct ServerState {
    pub hub: Arc<Hub>,
    pub ws_path: String,
    pub started_at: Instant,
}

/// Accept loop. Ends when `shutdown` flips.
pub async fn run(
    listener: TcpListener,
    state: Arc<ServerState>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    info!(
        "listening on {} (subscribers at {})",
        listener.local_addr()?,
        state.ws_path
    );

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        warn!("accept failed: {e}");
                        continue;
                    }
                };
                debug!("connection from {peer}");
                let state = state.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, state).await {
                        debug!("connection from {peer} ended: {e:#}");
                    }
                });
            }
            _ = shutdown.changed() => {
                info!("listener shutting down");
                break;
            }
        }
    }

    Ok(())
}

/// Route one connection by peeking at the request head: WebSocket
/// upgrades on the configured path join the registry, anything else
/// is answered as plain HTTP and closed.
async fn handle_connection(stream: TcpStream, state: Arc<ServerState>) -> Result<()> {
    let mut head_buf = [0u8; 2048];
    let n = stream.peek(&mut head_buf).await?;
    let head = String::from_utf8_lossy(&head_buf[..n]);

    let path = request_path(&head).unwrap_or("/").to_string();
    let is_upgrade = head
        .to_ascii_lowercase()
        .contains("upgrade: websocket");

    if is_upgrade && path == state.ws_path {
        return handle_subscriber(stream, state).await;
    }

    handle_http(stream, &path, &state).await
}

fn request_path(head: &str) -> Option<&str> {
    head.lines().next()?.split_whitespace().nth(1)
}

/// Serve one WebSocket subscriber for its whole life.
///
/// The writer task drains the hub's per-subscriber queue; the read
/// loop answers pings and watches for the close frame. Either side
/// failing deregisters the subscriber exactly once.
async fn handle_subscriber(stream: TcpStream, state: Arc<ServerState>) -> Result<()> {
    let ws_stream = accept_async(stream).await?;
    let (id, mut rx) = state.hub.register().await;

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    // Pongs go through the same queue as broadcasts so the sink has a
    // single writer.
    let (pong_tx, mut pong_rx) = mpsc::channel::<Message>(8);

    let writer = tokio::spawn(async move {
        loop {
            let msg = tokio::select! {
                broadcast = rx.recv() => broadcast,
                pong = pong_rx.recv() => pong,
            };
            let Some(msg) = msg else { break };
            let closing = matches!(msg, Message::Close(_));
            if ws_sender.send(msg).await.is_err() {
                break;
            }
            if closing {
                break;
            }
        }
    });

    while let Some(frame) = ws_receiver.next().await {
        match frame {
            Ok(Message::Ping(data)) => {
                let _ = pong_tx.send(Message::Pong(data)).await;
            }
            Ok(Message::Close(_)) => {
                debug!("subscriber {id} sent close");
                break;
            }
            // Text/binary frames from subscribers are ignored.
            Ok(_) => {}
            Err(e) => {
                debug!("subscriber {id} read error: {e}");
                break;
            }
        }
    }

    state.hub.deregister(id).await;
    writer.abort();
    Ok(())
}

/// Plain-HTTP side: status objects only.
async fn handle_http(mut stream: TcpStream, path: &str, state: &ServerState) -> Result<()> {
    let (status, body) = match path {
        "/health" => (
            "200 OK",
            json!({
                "status": "ok",
                "subscribers": state.hub.len().await,
                "uptime-secs": state.started_at.elapsed().as_secs(),
            })
            .to_string(),
        ),
        "/clients" => (
            "200 OK",
            serde_json::to_string(&state.hub.summaries().await)?,
        ),
        _ => ("404 Not Found", json!({"error": "not found"}).to_string()),
    };

    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await?;
    Ok(())
}
