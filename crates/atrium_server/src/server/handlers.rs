//! Connection handling logic for WebSocket clients.
//!
//! This module contains the core connection handling logic that manages
//! the lifecycle of individual client connections, including WebSocket
//! handshaking, message processing, and cleanup.

use crate::{connection::ConnectionManager, error::ServerError, messaging::MessageRouter};
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, trace};

/// Handles a single client connection from establishment to cleanup.
///
/// # Connection Flow
///
/// 1. Perform WebSocket handshake
/// 2. Register connection with the connection manager
/// 3. Run the incoming and outgoing tasks until either finishes
/// 4. Tear down room membership and quality tracking
///
/// # Message Handling
///
/// Two concurrent tasks run per connection:
///
/// * **Incoming**: parses text frames into typed messages and routes them
/// * **Outgoing**: forwards frames queued for this connection by the
///   scheduler, heartbeat service, and router
///
/// A frame that fails to route is logged at trace level and otherwise
/// ignored - the client's next sample supersedes whatever was lost.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    connection_manager: Arc<ConnectionManager>,
    router: Arc<MessageRouter>,
) -> Result<(), ServerError> {
    // Perform WebSocket handshake
    let ws_stream = accept_async(stream)
        .await
        .map_err(|e| ServerError::Network(format!("WebSocket handshake failed: {e}")))?;

    let (ws_sender, mut ws_receiver) = ws_stream.split();
    let ws_sender = Arc::new(tokio::sync::Mutex::new(ws_sender));
    let connection_id = connection_manager.add_connection(addr).await;
    connection_manager
        .register_ws_sender(connection_id, ws_sender.clone())
        .await;

    let mut message_receiver = connection_manager.subscribe();
    let ws_sender_incoming = ws_sender.clone();
    let ws_sender_outgoing = ws_sender.clone();

    // Incoming message task - parses and routes typed messages
    let incoming_task = {
        let router = router.clone();

        async move {
            while let Some(msg) = ws_receiver.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        if let Err(e) = router.route(&text, connection_id).await {
                            trace!("❌ Message routing error: {}", e);
                        }
                    }
                    Ok(Message::Close(_)) => {
                        debug!("🔌 Client {} requested close", connection_id);
                        break;
                    }
                    Ok(Message::Ping(data)) => {
                        let mut ws_sender = ws_sender_incoming.lock().await;
                        let _ = ws_sender.send(Message::Pong(data)).await;
                    }
                    Err(e) => {
                        error!("WebSocket error for connection {}: {}", connection_id, e);
                        break;
                    }
                    _ => {}
                }
            }
        }
    };

    // Outgoing message task
    let outgoing_task = {
        let ws_sender = ws_sender_outgoing;
        async move {
            while let Ok((target_connection_id, frame)) = message_receiver.recv().await {
                if target_connection_id == connection_id {
                    let mut ws_sender = ws_sender.lock().await;
                    if let Err(e) = ws_sender.send(Message::Text(frame.into())).await {
                        error!("Failed to send message: {}", e);
                        break;
                    }
                }
            }
        }
    };

    // Run both tasks concurrently until one completes
    tokio::select! {
        _ = incoming_task => {},
        _ = outgoing_task => {},
    }

    // Tear down membership (announcing entity-left to the room), quality
    // tracking, and the connection itself. An outstanding heartbeat probe
    // for this connection is abandoned with its history.
    router.handle_disconnect(connection_id).await;
    connection_manager.remove_connection(connection_id).await;
    connection_manager.remove_ws_sender(connection_id).await;
    Ok(())
}
