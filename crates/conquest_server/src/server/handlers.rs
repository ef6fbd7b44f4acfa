//! Connection handling logic for WebSocket clients.
//!
//! This module contains the core connection handling logic that manages
//! the lifecycle of individual client connections, including WebSocket
//! handshaking, message processing, and cleanup.

use crate::{
    config::ServerConfig,
    connection::{ConnectionManager, Session},
    error::ServerError,
    messaging::route_client_message,
    room::RoomHandle,
};
use conquest_core::ServerMessage;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{sleep_until, Instant};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::{accept_async, tungstenite::Message, WebSocketStream};
use tracing::{debug, error, info, warn};

type WsSender = SplitSink<WebSocketStream<TcpStream>, Message>;

/// Handles a single client connection from establishment to cleanup.
///
/// # Connection Flow
///
/// 1. Perform WebSocket handshake
/// 2. Register the connection, or close it when the server is full
/// 3. Subscribe to the room's frame broadcast
/// 4. Serve client messages and forward room frames until the client
///    closes, errors or stays silent past the heartbeat timeout
/// 5. Release the controlled agent and unregister the connection
///
/// # Arguments
///
/// * `stream` - The TCP stream for the client connection
/// * `addr` - The remote address of the client
/// * `connection_manager` - Registry of live connections
/// * `room` - The room this connection plays in
/// * `config` - Server configuration (timeouts and input limits)
///
/// # Returns
///
/// `Ok(())` if the connection ended normally, or a `ServerError` if it ended
/// because of a network failure or the room going away.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    connection_manager: Arc<ConnectionManager>,
    room: RoomHandle,
    config: Arc<ServerConfig>,
) -> Result<(), ServerError> {
    // Perform WebSocket handshake
    let ws_stream = accept_async(stream)
        .await
        .map_err(|e| ServerError::Network(format!("WebSocket handshake failed: {e}")))?;

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let Some(connection_id) = connection_manager.add_connection(addr).await else {
        warn!("🚫 Rejecting {}: connection limit of {} reached", addr, config.max_connections);
        close(&mut ws_sender, CloseCode::Again, "server full").await;
        return Ok(());
    };

    let mut frames = room.subscribe();
    let mut session = Session::new(connection_id);
    let heartbeat = config.connection_timeout();
    let mut last_seen = Instant::now();

    let outcome = loop {
        let deadline = heartbeat.map(|limit| last_seen + limit);

        tokio::select! {
            incoming = ws_receiver.next() => {
                last_seen = Instant::now();
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        let reply = match route_client_message(
                            text.as_str(),
                            &mut session,
                            &room,
                            &connection_manager,
                            &config.security,
                        )
                        .await
                        {
                            Ok(reply) => reply,
                            Err(e) if e.is_fatal() => break Err(e),
                            Err(e) => {
                                debug!("❌ Rejected message from connection {}: {}", connection_id, e);
                                Some(ServerMessage::error(e.to_string()))
                            }
                        };
                        if let Some(reply) = reply {
                            if let Err(e) = send_message(&mut ws_sender, &reply).await {
                                break Err(e);
                            }
                        }
                    }
                    Some(Ok(Message::Binary(_))) => {
                        let reply = ServerMessage::error("binary frames are not supported");
                        if let Err(e) = send_message(&mut ws_sender, &reply).await {
                            break Err(e);
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = ws_sender.send(Message::Pong(data)).await {
                            break Err(ServerError::Network(format!("Failed to send pong: {e}")));
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("🔌 Client {} closed the connection", connection_id);
                        break Ok(());
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        break Err(ServerError::Network(format!("WebSocket error on connection {connection_id}: {e}")));
                    }
                }
            }
            frame = frames.recv() => match frame {
                Ok(frame) => {
                    if let Err(e) = ws_sender.send(Message::Text(frame.to_string().into())).await {
                        break Err(ServerError::Network(format!("Failed to send frame: {e}")));
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!("🐢 Connection {} lagged behind, {} frames dropped", connection_id, skipped);
                }
                Err(RecvError::Closed) => break Err(ServerError::RoomClosed),
            },
            _ = sleep_until(deadline.unwrap_or(last_seen)), if deadline.is_some() => {
                info!("⏱️ Connection {} timed out after {}s of silence", connection_id, config.connection_timeout);
                close(&mut ws_sender, CloseCode::Away, "heartbeat timeout").await;
                break Ok(());
            }
        }
    };

    // A dropped connection is treated exactly like an explicit leave
    if let Some(agent) = session.detach() {
        if let Err(e) = room.leave(agent).await {
            error!("Failed to release {} for connection {}: {}", agent, connection_id, e);
        }
    }
    connection_manager.remove_connection(connection_id).await;

    outcome
}

async fn send_message(ws_sender: &mut WsSender, message: &ServerMessage) -> Result<(), ServerError> {
    let text = message
        .to_json()
        .map_err(|e| ServerError::Internal(format!("Failed to serialize reply: {e}")))?;
    ws_sender
        .send(Message::Text(text.into()))
        .await
        .map_err(|e| ServerError::Network(format!("Failed to send message: {e}")))
}

async fn close(ws_sender: &mut WsSender, code: CloseCode, reason: &str) {
    let frame = CloseFrame { code, reason: reason.to_string().into() };
    let _ = ws_sender.send(Message::Close(Some(frame))).await;
}
