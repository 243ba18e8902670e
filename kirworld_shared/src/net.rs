//! Networking primitives.
//!
//! Goals:
//! - Typed message schemas for both directions of the connection, one
//!   variant per event name.
//! - Explicit validation at the boundary: a frame that parses but carries
//!   out-of-contract values is rejected, never trusted by shape.
//! - Keep serialization explicit: JSON text frames of the form
//!   `{"event": "<name>", "data": <payload>}`.

use std::{collections::HashSet, fmt};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

use crate::math::Vec2;

/// Longest display name a client may join with, in characters.
pub const MAX_NAME_LEN: usize = 20;

/// Longest chat message a client may send, in characters.
pub const MAX_CHAT_LEN: usize = 200;

/// Opaque identifier the authority assigns to a connected player.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        EntityId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        EntityId(id.to_string())
    }
}

/// Per-tick movement intent. Each axis is one of -1, 0 or 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MoveIntent {
    pub dx: i8,
    pub dy: i8,
}

impl MoveIntent {
    pub const IDLE: Self = Self { dx: 0, dy: 0 };

    /// Builds an intent, collapsing each axis to its sign.
    pub fn new(dx: i8, dy: i8) -> Self {
        Self {
            dx: dx.signum(),
            dy: dy.signum(),
        }
    }

    pub fn is_idle(self) -> bool {
        self.dx == 0 && self.dy == 0
    }
}

/// One player's authoritative state inside a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    pub id: EntityId,
    pub name: String,
    pub x: f64,
    pub y: f64,
}

impl PlayerState {
    pub fn new(id: impl Into<String>, name: impl Into<String>, x: f64, y: f64) -> Self {
        Self {
            id: EntityId::new(id),
            name: name.into(),
            x,
            y,
        }
    }

    pub fn position(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

/// Identity assignment payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: EntityId,
}

/// Chat message as broadcast by the authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatBroadcast {
    pub id: EntityId,
    pub name: String,
    pub text: String,
}

/// Client -> authority events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "lowercase")]
pub enum ClientMsg {
    /// Request entry with a display name.
    Join(String),
    /// Movement intent for the current send tick.
    Move(MoveIntent),
    /// Chat text to broadcast.
    Chat(String),
}

/// Authority -> client events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "lowercase")]
pub enum ServerMsg {
    /// One-time identity assignment for this connection.
    Joined(Identity),
    /// Full authoritative snapshot; replaces any prior list.
    Players(Vec<PlayerState>),
    /// Chat broadcast.
    Chat(ChatBroadcast),
}

impl ServerMsg {
    /// Event name as it appears on the wire.
    pub fn event_name(&self) -> &'static str {
        match self {
            ServerMsg::Joined(_) => "joined",
            ServerMsg::Players(_) => "players",
            ServerMsg::Chat(_) => "chat",
        }
    }
}

/// Rejection reasons for frames crossing the connection boundary.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("move component out of range: dx={dx} dy={dy}")]
    MoveOutOfRange { dx: i8, dy: i8 },
    #[error("entity id is empty")]
    EmptyId,
    #[error("non-finite position for entity {0}")]
    NonFinitePosition(EntityId),
    #[error("duplicate entity {0} in snapshot")]
    DuplicateEntity(EntityId),
    #[error("text payload invalid: {0}")]
    Text(#[from] InputError),
}

/// Local input that must never reach the connection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("text is empty after trimming")]
    Empty,
    #[error("text exceeds {max} characters")]
    TooLong { max: usize },
}

/// A message type that can cross the wire.
pub trait WireMessage: Serialize + DeserializeOwned {
    /// Checks contract values that the JSON shape alone cannot express.
    fn validate(&self) -> Result<(), ProtocolError>;
}

impl WireMessage for ClientMsg {
    fn validate(&self) -> Result<(), ProtocolError> {
        match self {
            ClientMsg::Join(name) => check_text(name, MAX_NAME_LEN)?,
            ClientMsg::Move(intent) => {
                if !(-1..=1).contains(&intent.dx) || !(-1..=1).contains(&intent.dy) {
                    return Err(ProtocolError::MoveOutOfRange {
                        dx: intent.dx,
                        dy: intent.dy,
                    });
                }
            }
            ClientMsg::Chat(text) => check_text(text, MAX_CHAT_LEN)?,
        }
        Ok(())
    }
}

impl WireMessage for ServerMsg {
    fn validate(&self) -> Result<(), ProtocolError> {
        match self {
            ServerMsg::Joined(identity) => {
                if identity.id.as_str().is_empty() {
                    return Err(ProtocolError::EmptyId);
                }
            }
            ServerMsg::Players(players) => {
                let mut seen = HashSet::with_capacity(players.len());
                for p in players {
                    if p.id.as_str().is_empty() {
                        return Err(ProtocolError::EmptyId);
                    }
                    if !p.position().is_finite() {
                        return Err(ProtocolError::NonFinitePosition(p.id.clone()));
                    }
                    if !seen.insert(&p.id) {
                        return Err(ProtocolError::DuplicateEntity(p.id.clone()));
                    }
                }
            }
            ServerMsg::Chat(chat) => {
                if chat.id.as_str().is_empty() {
                    return Err(ProtocolError::EmptyId);
                }
                check_text(&chat.text, MAX_CHAT_LEN)?;
            }
        }
        Ok(())
    }
}

fn check_text(text: &str, max: usize) -> Result<(), InputError> {
    if text.trim().is_empty() {
        return Err(InputError::Empty);
    }
    if text.chars().count() > max {
        return Err(InputError::TooLong { max });
    }
    Ok(())
}

/// Encodes a message into a JSON text frame after validating it.
pub fn encode<M: WireMessage>(msg: &M) -> Result<String, ProtocolError> {
    msg.validate()?;
    Ok(serde_json::to_string(msg)?)
}

/// Decodes and validates a JSON text frame.
pub fn decode<M: WireMessage>(frame: &str) -> Result<M, ProtocolError> {
    let msg: M = serde_json::from_str(frame)?;
    msg.validate()?;
    Ok(msg)
}

/// Trims `raw` and truncates it to `max` characters.
///
/// Returns `InputError::Empty` when nothing is left to send.
pub fn bounded_text(raw: &str, max: usize) -> Result<String, InputError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(InputError::Empty);
    }
    // Truncation can expose trailing whitespace that was interior before.
    let bounded: String = trimmed.chars().take(max).collect();
    Ok(bounded.trim_end().to_string())
}

/// Normalizes a display name for the join request.
pub fn player_name(raw: &str) -> Result<String, InputError> {
    bounded_text(raw, MAX_NAME_LEN)
}

/// Normalizes outgoing chat text.
pub fn chat_text(raw: &str) -> Result<String, InputError> {
    bounded_text(raw, MAX_CHAT_LEN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_messages_use_event_envelope() {
        let join = encode(&ClientMsg::Join("Ann".into())).unwrap();
        assert_eq!(join, r#"{"event":"join","data":"Ann"}"#);

        let mv = encode(&ClientMsg::Move(MoveIntent::new(1, -1))).unwrap();
        assert_eq!(mv, r#"{"event":"move","data":{"dx":1,"dy":-1}}"#);

        let chat = encode(&ClientMsg::Chat("hi".into())).unwrap();
        assert_eq!(chat, r#"{"event":"chat","data":"hi"}"#);
    }

    #[test]
    fn server_snapshot_decodes() {
        let frame = r#"{"event":"players","data":[{"id":"p1","name":"Ann","x":100,"y":100.5}]}"#;
        let msg: ServerMsg = decode(frame).unwrap();
        assert_eq!(
            msg,
            ServerMsg::Players(vec![PlayerState::new("p1", "Ann", 100.0, 100.5)])
        );
        assert_eq!(msg.event_name(), "players");
    }

    #[test]
    fn server_joined_and_chat_decode() {
        let joined: ServerMsg = decode(r#"{"event":"joined","data":{"id":"p1"}}"#).unwrap();
        assert_eq!(joined, ServerMsg::Joined(Identity { id: "p1".into() }));

        let chat: ServerMsg =
            decode(r#"{"event":"chat","data":{"id":"p2","name":"Bo","text":"yo"}}"#).unwrap();
        assert_eq!(
            chat,
            ServerMsg::Chat(ChatBroadcast {
                id: "p2".into(),
                name: "Bo".into(),
                text: "yo".into(),
            })
        );
    }

    #[test]
    fn unknown_event_is_malformed() {
        let err = decode::<ServerMsg>(r#"{"event":"teleport","data":{}}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed(_)));
    }

    #[test]
    fn shape_mismatch_is_malformed() {
        let err = decode::<ServerMsg>(r#"{"event":"players","data":{"id":"p1"}}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed(_)));
    }

    #[test]
    fn duplicate_ids_rejected() {
        let msg = ServerMsg::Players(vec![
            PlayerState::new("p1", "Ann", 0.0, 0.0),
            PlayerState::new("p1", "Ann", 1.0, 1.0),
        ]);
        assert!(matches!(
            msg.validate(),
            Err(ProtocolError::DuplicateEntity(id)) if id.as_str() == "p1"
        ));
    }

    #[test]
    fn non_finite_position_rejected() {
        let msg = ServerMsg::Players(vec![PlayerState::new("p1", "Ann", f64::INFINITY, 0.0)]);
        assert!(matches!(
            msg.validate(),
            Err(ProtocolError::NonFinitePosition(_))
        ));
    }

    #[test]
    fn empty_identity_rejected() {
        let err = decode::<ServerMsg>(r#"{"event":"joined","data":{"id":""}}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::EmptyId));
    }

    #[test]
    fn chat_broadcast_checked_at_boundary() {
        let err = decode::<ServerMsg>(r#"{"event":"chat","data":{"id":"","name":"","text":"x"}}"#)
            .unwrap_err();
        assert!(matches!(err, ProtocolError::EmptyId));

        let long = format!(
            r#"{{"event":"chat","data":{{"id":"p2","name":"Bo","text":"{}"}}}}"#,
            "x".repeat(MAX_CHAT_LEN + 1)
        );
        assert!(matches!(
            decode::<ServerMsg>(&long),
            Err(ProtocolError::Text(InputError::TooLong { max: MAX_CHAT_LEN }))
        ));

        let blank = r#"{"event":"chat","data":{"id":"p2","name":"Bo","text":"   "}}"#;
        assert!(matches!(
            decode::<ServerMsg>(blank),
            Err(ProtocolError::Text(InputError::Empty))
        ));

        let at_cap = ServerMsg::Chat(ChatBroadcast {
            id: "p2".into(),
            name: "Bo".into(),
            text: "x".repeat(MAX_CHAT_LEN),
        });
        assert!(at_cap.validate().is_ok());
    }

    #[test]
    fn out_of_range_move_rejected() {
        let err = decode::<ClientMsg>(r#"{"event":"move","data":{"dx":3,"dy":0}}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::MoveOutOfRange { dx: 3, dy: 0 }));
    }

    #[test]
    fn move_intent_collapses_to_sign() {
        assert_eq!(MoveIntent::new(5, -7), MoveIntent { dx: 1, dy: -1 });
        assert!(MoveIntent::new(0, 0).is_idle());
    }

    #[test]
    fn outgoing_text_is_trimmed_and_bounded() {
        assert_eq!(player_name("  Ann  ").unwrap(), "Ann");
        assert_eq!(player_name("   "), Err(InputError::Empty));
        assert_eq!(player_name(&"x".repeat(30)).unwrap().chars().count(), MAX_NAME_LEN);

        let long = "é".repeat(MAX_CHAT_LEN + 10);
        assert_eq!(chat_text(&long).unwrap().chars().count(), MAX_CHAT_LEN);
    }

    #[test]
    fn oversized_chat_rejected_on_encode() {
        let msg = ClientMsg::Chat("a".repeat(MAX_CHAT_LEN + 1));
        assert!(matches!(
            encode(&msg),
            Err(ProtocolError::Text(InputError::TooLong { max: MAX_CHAT_LEN }))
        ));
    }
}
