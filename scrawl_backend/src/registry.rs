//! The session registry actor.
//!
//! All session and participant state lives inside one task; socket tasks talk
//! to it through an mpsc command channel and receive fan-out through their own
//! per-connection outbound queues. Nothing here is behind a lock, and nothing
//! outside this module mutates a session.

use std::collections::HashMap;

use chrono::{Duration, Utc};
use scrawl_common::proto::{ClientMessage, ServerMessage};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::session::{Participant, Session, generate_session_code};

/// Outbound queue of one websocket connection; the writer task on the other
/// end drains it into the socket, so per-recipient delivery stays ordered.
pub type Outbound = mpsc::UnboundedSender<ServerMessage>;

pub enum Command {
    Create {
        participant_name: String,
        outbound: Outbound,
        reply: oneshot::Sender<Option<String>>,
    },
    Join {
        session_id: String,
        participant_name: String,
        outbound: Outbound,
        reply: oneshot::Sender<Option<String>>,
    },
    /// An authenticated drawing or color message from `sender_id`.
    Frame {
        sender_id: String,
        message: ClientMessage,
    },
    Disconnect {
        user_id: String,
    },
    Reap,
}

/// Cloneable front door to the registry task. Dropping every handle stops the
/// task once its queue drains, so already-issued cleanup still runs.
#[derive(Clone)]
pub struct RegistryHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl RegistryHandle {
    pub fn spawn(session_timeout: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(Registry::new(session_timeout).run(rx));
        Self { tx }
    }

    /// Creates a session; the `session_created` reply goes out through
    /// `outbound`. Returns the creator's participant id, or `None` when no
    /// code could be allocated.
    pub async fn create_session(&self, participant_name: String, outbound: Outbound) -> Option<String> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Create {
                participant_name,
                outbound,
                reply,
            })
            .ok()?;
        rx.await.ok().flatten()
    }

    /// Joins a session; `session_joined` or an `error` reply goes out through
    /// `outbound`. Returns the new participant id on success.
    pub async fn join_session(
        &self,
        session_id: String,
        participant_name: String,
        outbound: Outbound,
    ) -> Option<String> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Join {
                session_id,
                participant_name,
                outbound,
                reply,
            })
            .ok()?;
        rx.await.ok().flatten()
    }

    pub fn frame(&self, sender_id: String, message: ClientMessage) {
        let _ = self.tx.send(Command::Frame { sender_id, message });
    }

    pub fn disconnect(&self, user_id: String) {
        let _ = self.tx.send(Command::Disconnect { user_id });
    }

    pub fn reap(&self) {
        let _ = self.tx.send(Command::Reap);
    }
}

pub struct Registry {
    sessions: HashMap<String, Session>,
    clients: HashMap<String, Outbound>,
    session_timeout: Duration,
}

impl Registry {
    pub fn new(session_timeout: Duration) -> Self {
        Self {
            sessions: HashMap::new(),
            clients: HashMap::new(),
            session_timeout,
        }
    }

    pub async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = rx.recv().await {
            self.handle(command);
        }
        debug!("registry task stopped");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Create {
                participant_name,
                outbound,
                reply,
            } => {
                let _ = reply.send(self.create(participant_name, outbound));
            }
            Command::Join {
                session_id,
                participant_name,
                outbound,
                reply,
            } => {
                let _ = reply.send(self.join(session_id, participant_name, outbound));
            }
            Command::Frame { sender_id, message } => self.frame(sender_id, message),
            Command::Disconnect { user_id } => self.disconnect(user_id),
            Command::Reap => self.reap(),
        }
    }

    fn create(&mut self, participant_name: String, outbound: Outbound) -> Option<String> {
        let Some(session_id) = generate_session_code(&self.sessions) else {
            send(&outbound, ServerMessage::error("Failed to allocate a session code"));
            return None;
        };

        let creator = Participant::new(participant_name);
        let creator_id = creator.user_id.clone();
        let creator_name = creator.name.clone();
        let session = Session::new(session_id.clone(), creator);

        info!("session {} created by {} ({})", session_id, creator_name, creator_id);

        send(
            &outbound,
            ServerMessage::SessionCreated {
                session_id: session_id.clone(),
                creator_id: creator_id.clone(),
                participants: session.roster(),
            },
        );

        self.sessions.insert(session_id, session);
        self.clients.insert(creator_id.clone(), outbound);
        Some(creator_id)
    }

    fn join(
        &mut self,
        session_id: String,
        participant_name: String,
        outbound: Outbound,
    ) -> Option<String> {
        let Some(session) = self.sessions.get_mut(&session_id) else {
            send(
                &outbound,
                ServerMessage::error(format!("Session not found: {session_id}")),
            );
            return None;
        };
        if !session.is_active {
            send(
                &outbound,
                ServerMessage::error(format!("Session is not active: {session_id}")),
            );
            return None;
        }

        let participant = Participant::new(participant_name);
        let user_id = participant.user_id.clone();
        let name = participant.name.clone();
        let color = participant.color.clone();
        session.add_participant(participant);

        info!("{} ({}) joined session {}", name, user_id, session_id);

        send(
            &outbound,
            ServerMessage::SessionJoined {
                session_id: session_id.clone(),
                user_id: user_id.clone(),
                participants: session.roster(),
            },
        );
        self.clients.insert(user_id.clone(), outbound);

        self.broadcast(
            &session_id,
            &ServerMessage::ParticipantJoined {
                user_id: user_id.clone(),
                participant_name: name,
                color,
            },
            Some(user_id.as_str()),
        );

        Some(user_id)
    }

    fn frame(&mut self, sender_id: String, message: ClientMessage) {
        let Some(session_id) = self.find_user_session(&sender_id) else {
            if let Some(outbound) = self.clients.get(&sender_id) {
                send(outbound, ServerMessage::error("Not in any session"));
            }
            return;
        };

        if let Some(session) = self.sessions.get_mut(&session_id) {
            session.touch();

            // Color changes update the roster entry in place so late joiners
            // see the current pen, not the one from join time.
            if let ClientMessage::ColorChange { color, alpha, .. } = &message {
                if let Some(participant) = session.participants.get_mut(&sender_id) {
                    participant.color = color.clone();
                    participant.alpha = *alpha;
                }
            }
        }

        let Some(relayed) = ServerMessage::relayed(&message) else {
            return;
        };

        // Color changes echo back to the sender so every client updates
        // through the same path; drawing messages never do.
        let exclude = match message {
            ClientMessage::ColorChange { .. } => None,
            _ => Some(sender_id.as_str()),
        };
        self.broadcast(&session_id, &relayed, exclude);
    }

    fn disconnect(&mut self, user_id: String) {
        debug!("cleaning up client {}", user_id);

        if let Some(session_id) = self.find_user_session(&user_id)
            && let Some(session) = self.sessions.get_mut(&session_id)
        {
            if session.creator_id == user_id {
                // Creator departure terminates the whole session; ownership
                // is never transferred.
                info!("creator left, expiring session {}", session_id);
                session.is_active = false;
                self.broadcast(
                    &session_id,
                    &ServerMessage::SessionExpired {
                        message: "Session creator disconnected".to_string(),
                    },
                    Some(user_id.as_str()),
                );
            } else if let Some(removed) = session.remove_participant(&user_id) {
                info!("{} left session {}", removed.name, session_id);
                self.broadcast(
                    &session_id,
                    &ServerMessage::ParticipantLeft {
                        user_id: user_id.clone(),
                        participant_name: removed.name,
                    },
                    None,
                );
            }
        }

        self.clients.remove(&user_id);
    }

    /// Deletes inactive sessions and sessions idle past the timeout. Members
    /// of a timed-out session get one expiry notice so their clients do not
    /// keep a dead code around.
    fn reap(&mut self) {
        let now = Utc::now();
        let expired: Vec<String> = self
            .sessions
            .iter()
            .filter(|(_, s)| !s.is_active || now - s.last_activity > self.session_timeout)
            .map(|(id, _)| id.clone())
            .collect();

        for session_id in &expired {
            let was_active = self.sessions.get(session_id).is_some_and(|s| s.is_active);
            if was_active {
                self.broadcast(
                    session_id,
                    &ServerMessage::SessionExpired {
                        message: "Session timed out".to_string(),
                    },
                    None,
                );
            }
            if let Some(session) = self.sessions.remove(session_id) {
                for user_id in session.participants.keys() {
                    self.clients.remove(user_id);
                }
            }
        }

        if !expired.is_empty() {
            info!("reaped {} expired session(s)", expired.len());
        }
    }

    fn find_user_session(&self, user_id: &str) -> Option<String> {
        self.sessions
            .values()
            .find(|s| s.contains(user_id))
            .map(|s| s.session_id.clone())
    }

    /// Fan-out to every member of a session, minus `exclude`.
    fn broadcast(&self, session_id: &str, message: &ServerMessage, exclude: Option<&str>) {
        let Some(session) = self.sessions.get(session_id) else {
            return;
        };

        for user_id in session.participants.keys() {
            if exclude == Some(user_id.as_str()) {
                continue;
            }
            if let Some(outbound) = self.clients.get(user_id) {
                send(outbound, message.clone());
            }
        }
    }
}

fn send(outbound: &Outbound, message: ServerMessage) {
    if outbound.send(message).is_err() {
        warn!("dropping message for a closed connection");
    }
}
