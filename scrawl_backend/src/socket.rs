//! Per-connection websocket plumbing.
//!
//! Each connection gets a reader loop and a writer task. The writer drains
//! the connection's outbound queue into the socket; the reader decodes frames
//! and forwards them to the registry. Decode and membership failures answer
//! with `error` replies on the same connection and never close it.

use std::sync::Arc;

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures_util::{sink::SinkExt, stream::StreamExt};
use scrawl_common::proto::{self, ClientMessage, ServerMessage};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};

use crate::registry::{Outbound, RegistryHandle};

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(registry): State<RegistryHandle>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, registry))
}

async fn handle_socket(socket: WebSocket, registry: RegistryHandle) {
    info!("new websocket connection");

    let (mut sender, mut receiver) = socket.split();
    let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<ServerMessage>();

    // Which participant this connection authenticated as. Shared with the
    // reader task so leave-cleanup still runs when the writer side dies
    // first and the reader gets aborted.
    let identity: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));

    // Writer: drain the outbound queue into the socket.
    let mut send_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            let text = match serde_json::to_string(&message) {
                Ok(text) => text,
                Err(e) => {
                    warn!("failed to encode outbound message: {e}");
                    continue;
                }
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    // Reader: decode inbound frames and forward them to the registry.
    let registry_for_reader = registry.clone();
    let outbound_for_reader = outbound.clone();
    let identity_for_reader = identity.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(frame)) = receiver.next().await {
            let text = match frame {
                Message::Text(text) => text,
                Message::Close(_) => break,
                // Pings and pongs are handled by axum; binary frames are not
                // part of the protocol.
                _ => continue,
            };

            match proto::decode(&text) {
                Ok(message) => {
                    handle_message(
                        &registry_for_reader,
                        &outbound_for_reader,
                        &identity_for_reader,
                        message,
                    )
                    .await;
                }
                Err(e) => {
                    debug!("rejected frame: {e}");
                    let _ = outbound_for_reader.send(ServerMessage::error(e.to_string()));
                }
            }
        }
    });

    // If either side finishes, tear down the other.
    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    };

    if let Some(user_id) = identity.lock().await.take() {
        registry.disconnect(user_id);
    }
    info!("websocket connection closed");
}

async fn handle_message(
    registry: &RegistryHandle,
    outbound: &Outbound,
    identity: &Arc<Mutex<Option<String>>>,
    message: ClientMessage,
) {
    match message {
        ClientMessage::CreateSession { participant_name } => {
            if let Some(id) = registry.create_session(participant_name, outbound.clone()).await {
                *identity.lock().await = Some(id);
            }
        }
        ClientMessage::JoinSession {
            session_id,
            participant_name,
        } => {
            if let Some(id) = registry
                .join_session(session_id, participant_name, outbound.clone())
                .await
            {
                *identity.lock().await = Some(id);
            }
        }
        ClientMessage::Ping => {
            let _ = outbound.send(ServerMessage::Pong);
        }
        message => {
            // Drawing and color messages require prior session membership;
            // the registry trusts the connection's identity, not the payload.
            let sender_id = identity.lock().await.clone();
            match sender_id {
                Some(id) => registry.frame(id, message),
                None => {
                    let _ = outbound.send(ServerMessage::error("Not authenticated"));
                }
            }
        }
    }
}
