//! Dispatch for messages arriving from the relay.

use std::sync::Arc;

use scrawl_common::proto::ServerMessage;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::state::PartyState;
use crate::strokes::StrokeStore;

/// Applies relay traffic to the shared roster and stroke store.
///
/// Drawing messages carrying the local user's id are skipped; `color_change`
/// self-echoes are applied like any other, so every client updates its pen
/// through this one path.
pub struct MessageHandler {
    state: Arc<Mutex<PartyState>>,
    strokes: Arc<Mutex<StrokeStore>>,
}

impl MessageHandler {
    pub fn new(state: Arc<Mutex<PartyState>>, strokes: Arc<Mutex<StrokeStore>>) -> Self {
        Self { state, strokes }
    }

    pub async fn handle(&self, message: ServerMessage) {
        match message {
            ServerMessage::SessionCreated {
                session_id,
                creator_id,
                participants,
            } => {
                let mut state = self.state.lock().await;
                state.session_id = Some(session_id);
                state.user_id = Some(creator_id);
                state.apply_roster(&participants);
                state.connected = true;
            }
            ServerMessage::SessionJoined {
                session_id,
                user_id,
                participants,
            } => {
                let mut state = self.state.lock().await;
                state.session_id = Some(session_id);
                state.user_id = Some(user_id);
                state.apply_roster(&participants);
                state.connected = true;
            }
            ServerMessage::ParticipantJoined {
                user_id,
                participant_name,
                color,
            } => {
                info!("{participant_name} joined the session");
                self.state
                    .lock()
                    .await
                    .add_participant(user_id, participant_name, color);
            }
            ServerMessage::ParticipantLeft {
                user_id,
                participant_name,
            } => {
                info!("{participant_name} left the session");
                self.state.lock().await.remove_participant(&user_id);
            }
            ServerMessage::SessionExpired { message } => {
                info!("session expired: {message}");
                let mut state = self.state.lock().await;
                state.connected = false;
                state.session_id = None;
            }
            ServerMessage::DrawingStart {
                line_id,
                user_id,
                color,
                start_point,
            } => {
                if self.state.lock().await.is_self(&user_id) {
                    return;
                }
                self.strokes
                    .lock()
                    .await
                    .apply_start(line_id, user_id, color, start_point, Instant::now());
            }
            ServerMessage::DrawingUpdate {
                line_id,
                user_id,
                new_finalized_segments,
                current_raw_points,
            } => {
                if self.state.lock().await.is_self(&user_id) {
                    return;
                }
                self.strokes.lock().await.apply_update(
                    &line_id,
                    new_finalized_segments,
                    current_raw_points,
                    Instant::now(),
                );
            }
            ServerMessage::DrawingEnd { line_id, user_id } => {
                if self.state.lock().await.is_self(&user_id) {
                    return;
                }
                self.strokes.lock().await.apply_end(&line_id, Instant::now());
            }
            ServerMessage::ColorChange {
                user_id,
                color,
                alpha,
            } => {
                // Applied even when it is our own echo.
                self.state.lock().await.update_style(&user_id, color, alpha);
            }
            ServerMessage::Pong => {
                debug!("pong");
            }
            ServerMessage::Error { message } => {
                warn!("relay error: {message}");
            }
        }
    }
}
