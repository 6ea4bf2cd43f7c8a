//! Websocket wire protocol.
//!
//! Every message is a JSON object with a `type` discriminator, modeled as a
//! closed tagged enum per direction and matched exhaustively at the relay
//! boundary. Coordinates on the wire are always unit-square normalized.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::fit::BezierSegment;
use crate::geom::{NormPoint, SurfaceSize};

/// Pen color assigned to new participants until they pick their own.
pub const DEFAULT_COLOR: &str = "#FFB6C1";

/// A cubic Bézier segment in normalized coordinates, as transmitted in
/// `drawing_update` messages.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormSegment {
    pub p0: NormPoint,
    pub p1: NormPoint,
    pub p2: NormPoint,
    pub p3: NormPoint,
}

impl NormSegment {
    pub fn from_pixel(seg: &BezierSegment, surface: SurfaceSize) -> Self {
        Self {
            p0: seg.p0.to_norm(surface),
            p1: seg.p1.to_norm(surface),
            p2: seg.p2.to_norm(surface),
            p3: seg.p3.to_norm(surface),
        }
    }

    pub fn to_pixel(self, surface: SurfaceSize) -> BezierSegment {
        BezierSegment {
            p0: self.p0.to_pixel(surface),
            p1: self.p1.to_pixel(surface),
            p2: self.p2.to_pixel(surface),
            p3: self.p3.to_pixel(surface),
        }
    }
}

/// One roster entry, as carried by `session_created` / `session_joined`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantInfo {
    pub user_id: String,
    pub name: String,
    pub color: String,
    pub alpha: f64,
}

fn default_alpha() -> f64 {
    1.0
}

/// Messages a client sends to the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    CreateSession {
        participant_name: String,
    },
    JoinSession {
        session_id: String,
        participant_name: String,
    },
    DrawingStart {
        line_id: String,
        user_id: String,
        color: String,
        start_point: NormPoint,
    },
    DrawingUpdate {
        line_id: String,
        user_id: String,
        new_finalized_segments: Vec<NormSegment>,
        current_raw_points: Vec<NormPoint>,
    },
    DrawingEnd {
        line_id: String,
        user_id: String,
    },
    ColorChange {
        user_id: String,
        color: String,
        #[serde(default = "default_alpha")]
        alpha: f64,
    },
    Ping,
}

/// Messages the relay sends to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    SessionCreated {
        session_id: String,
        creator_id: String,
        participants: Vec<ParticipantInfo>,
    },
    SessionJoined {
        session_id: String,
        user_id: String,
        participants: Vec<ParticipantInfo>,
    },
    ParticipantJoined {
        user_id: String,
        participant_name: String,
        color: String,
    },
    ParticipantLeft {
        user_id: String,
        participant_name: String,
    },
    SessionExpired {
        message: String,
    },
    DrawingStart {
        line_id: String,
        user_id: String,
        color: String,
        start_point: NormPoint,
    },
    DrawingUpdate {
        line_id: String,
        user_id: String,
        new_finalized_segments: Vec<NormSegment>,
        current_raw_points: Vec<NormPoint>,
    },
    DrawingEnd {
        line_id: String,
        user_id: String,
    },
    ColorChange {
        user_id: String,
        color: String,
        alpha: f64,
    },
    Pong,
    Error {
        message: String,
    },
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }

    /// The relayed form of a drawing or color message; `None` for message
    /// types the relay never forwards verbatim.
    pub fn relayed(msg: &ClientMessage) -> Option<ServerMessage> {
        match msg {
            ClientMessage::DrawingStart {
                line_id,
                user_id,
                color,
                start_point,
            } => Some(ServerMessage::DrawingStart {
                line_id: line_id.clone(),
                user_id: user_id.clone(),
                color: color.clone(),
                start_point: *start_point,
            }),
            ClientMessage::DrawingUpdate {
                line_id,
                user_id,
                new_finalized_segments,
                current_raw_points,
            } => Some(ServerMessage::DrawingUpdate {
                line_id: line_id.clone(),
                user_id: user_id.clone(),
                new_finalized_segments: new_finalized_segments.clone(),
                current_raw_points: current_raw_points.clone(),
            }),
            ClientMessage::DrawingEnd { line_id, user_id } => Some(ServerMessage::DrawingEnd {
                line_id: line_id.clone(),
                user_id: user_id.clone(),
            }),
            ClientMessage::ColorChange {
                user_id,
                color,
                alpha,
            } => Some(ServerMessage::ColorChange {
                user_id: user_id.clone(),
                color: color.clone(),
                alpha: *alpha,
            }),
            _ => None,
        }
    }
}

const CLIENT_MESSAGE_TYPES: [&str; 7] = [
    "create_session",
    "join_session",
    "drawing_start",
    "drawing_update",
    "drawing_end",
    "color_change",
    "ping",
];

/// Why an inbound frame was rejected. Every variant maps to an `error` reply;
/// none of them close the connection.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeError {
    MalformedJson,
    MissingType,
    UnknownType(String),
    BadFields { msg_type: String, detail: String },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::MalformedJson => write!(f, "Invalid JSON format"),
            DecodeError::MissingType => write!(f, "Missing 'type' field"),
            DecodeError::UnknownType(t) => write!(f, "Unknown message type: {t}"),
            DecodeError::BadFields { msg_type, detail } => {
                write!(f, "Malformed '{msg_type}' message: {detail}")
            }
        }
    }
}

/// Parses one inbound text frame into a [`ClientMessage`], distinguishing
/// malformed JSON, a missing discriminator, an unknown type, and a known type
/// with bad fields.
pub fn decode(text: &str) -> Result<ClientMessage, DecodeError> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|_| DecodeError::MalformedJson)?;

    let msg_type = match value.get("type").and_then(|t| t.as_str()) {
        Some(t) => t.to_string(),
        None => return Err(DecodeError::MissingType),
    };

    if !CLIENT_MESSAGE_TYPES.contains(&msg_type.as_str()) {
        return Err(DecodeError::UnknownType(msg_type));
    }

    serde_json::from_value(value).map_err(|e| DecodeError::BadFields {
        msg_type,
        detail: e.to_string(),
    })
}
