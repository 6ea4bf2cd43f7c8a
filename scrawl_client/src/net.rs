//! Websocket client for the relay.
//!
//! Outbound messages funnel through an unbounded queue drained by a writer
//! task, so the pointer capture loop and the 50 ms send tick can both send
//! without contending for the socket. Reading stays with the caller: either
//! one-shot request/response during session setup, or the `listen` loop once
//! a session is established.

use std::fmt;

use futures_util::{SinkExt, StreamExt, stream::SplitStream};
use scrawl_common::proto::{ClientMessage, ServerMessage};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, warn};

use crate::handler::MessageHandler;

#[derive(Debug)]
pub enum ClientError {
    Transport(tokio_tungstenite::tungstenite::Error),
    ConnectionClosed,
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::Transport(e) => write!(f, "websocket transport error: {e}"),
            ClientError::ConnectionClosed => write!(f, "connection closed by the relay"),
        }
    }
}

impl std::error::Error for ClientError {}

impl From<tokio_tungstenite::tungstenite::Error> for ClientError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        ClientError::Transport(e)
    }
}

pub struct WsClient {
    outgoing: mpsc::UnboundedSender<ClientMessage>,
    reader: SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>,
}

impl WsClient {
    pub async fn connect(url: &str) -> Result<Self, ClientError> {
        let (stream, _) = connect_async(url).await?;
        let (mut sink, reader) = stream.split();
        let (outgoing, mut outgoing_rx) = mpsc::unbounded_channel::<ClientMessage>();

        // Writer task: serialize and push queued messages into the socket.
        tokio::spawn(async move {
            while let Some(message) = outgoing_rx.recv().await {
                let text = match serde_json::to_string(&message) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("failed to encode message: {e}");
                        continue;
                    }
                };
                if sink.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
        });

        Ok(Self { outgoing, reader })
    }

    /// A clonable handle for tasks that only send (the pen's send loop).
    pub fn sender(&self) -> mpsc::UnboundedSender<ClientMessage> {
        self.outgoing.clone()
    }

    pub fn send(&self, message: ClientMessage) -> Result<(), ClientError> {
        self.outgoing
            .send(message)
            .map_err(|_| ClientError::ConnectionClosed)
    }

    /// The next decoded message, or `None` once the connection is gone.
    /// Frames that fail to decode are logged and skipped.
    pub async fn next_message(&mut self) -> Option<ServerMessage> {
        loop {
            match self.reader.next().await? {
                Ok(Message::Text(text)) => match serde_json::from_str(&text) {
                    Ok(message) => return Some(message),
                    Err(e) => {
                        warn!("undecodable frame from relay: {e}");
                    }
                },
                Ok(Message::Close(_)) => {
                    debug!("relay closed the connection");
                    return None;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("websocket read error: {e}");
                    return None;
                }
            }
        }
    }

    async fn request(&mut self, message: ClientMessage) -> Result<ServerMessage, ClientError> {
        self.send(message)?;
        self.next_message().await.ok_or(ClientError::ConnectionClosed)
    }

    /// Creates a session; the reply is either `session_created` or `error`.
    pub async fn create_session(&mut self, participant_name: &str) -> Result<ServerMessage, ClientError> {
        self.request(ClientMessage::CreateSession {
            participant_name: participant_name.to_string(),
        })
        .await
    }

    /// Joins a session by code; the reply is either `session_joined` or
    /// `error`.
    pub async fn join_session(
        &mut self,
        session_id: &str,
        participant_name: &str,
    ) -> Result<ServerMessage, ClientError> {
        self.request(ClientMessage::JoinSession {
            session_id: session_id.to_string(),
            participant_name: participant_name.to_string(),
        })
        .await
    }

    pub async fn ping(&mut self) -> Result<ServerMessage, ClientError> {
        self.request(ClientMessage::Ping).await
    }

    /// Dispatches incoming messages until the connection closes. A dropped
    /// connection is a clean exit here; cleanup happens server-side.
    pub async fn listen(&mut self, handler: &MessageHandler) {
        while let Some(message) = self.next_message().await {
            handler.handle(message).await;
        }
    }
}
