//! JSON wire protocol
//!
//! Every datagram carries one envelope:
//!
//! ```json
//! { "type": "toggleDoor", "seq": 12, "payload": { "doorId": 3 } }
//! ```
//!
//! `seq` is optional and chosen by the sender; replies echo it back as
//! `replyTo`. Messages with no data still carry an empty `payload` object,
//! but a missing payload is accepted and treated as `{}`.

use crate::math::Vec3;
use crate::state::{CharType, KillerType, MatchState};
use crate::world::WorldData;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors raised while decoding or encoding envelopes.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed JSON: {0}")]
    Malformed(serde_json::Error),

    #[error("envelope is not a JSON object")]
    NotAnObject,

    #[error("envelope has no string \"type\" field")]
    MissingType,

    #[error("unknown message type '{0}'")]
    UnknownType(String),

    #[error("invalid payload for '{kind}': {source}")]
    InvalidPayload {
        kind: String,
        source: serde_json::Error,
    },

    #[error("failed to encode message: {0}")]
    Encode(serde_json::Error),
}

/// Message enums that can travel inside an [`Envelope`].
pub trait MessageKinds {
    /// Every `type` string the enum accepts.
    const KINDS: &'static [&'static str];

    fn kind(&self) -> &'static str;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoom {
    #[serde(default)]
    pub room_id: Option<String>,
    #[serde(default)]
    pub char_type: Option<CharType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerUpdate {
    pub position: Vec3,
    #[serde(default)]
    pub is_hiding: Option<bool>,
    #[serde(default)]
    pub rotation: Option<f32>,
    #[serde(default)]
    pub is_sprinting: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRepairing {
    pub fuse_box_id: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PickupObject {
    pub object_id: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThrowObject {
    pub object_id: u32,
    pub direction: [f32; 3],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleDoor {
    pub door_id: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GhostWhisper {
    pub position: Vec3,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UseFinisherTool {
    pub direction: [f32; 3],
}

/// Client -> server messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum ClientMessage {
    JoinRoom(JoinRoom),
    PlayerUpdate(PlayerUpdate),
    StartRepairing(StartRepairing),
    StopRepairing {},
    PickupObject(PickupObject),
    ThrowObject(ThrowObject),
    ToggleDoor(ToggleDoor),
    GhostWhisper(GhostWhisper),
    UseScoutAbility {},
    UseFinisherTool(UseFinisherTool),
    Ping {},
    Disconnect {},
}

impl MessageKinds for ClientMessage {
    const KINDS: &'static [&'static str] = &[
        "joinRoom",
        "playerUpdate",
        "startRepairing",
        "stopRepairing",
        "pickupObject",
        "throwObject",
        "toggleDoor",
        "ghostWhisper",
        "useScoutAbility",
        "useFinisherTool",
        "ping",
        "disconnect",
    ];

    fn kind(&self) -> &'static str {
        match self {
            ClientMessage::JoinRoom(_) => "joinRoom",
            ClientMessage::PlayerUpdate(_) => "playerUpdate",
            ClientMessage::StartRepairing(_) => "startRepairing",
            ClientMessage::StopRepairing {} => "stopRepairing",
            ClientMessage::PickupObject(_) => "pickupObject",
            ClientMessage::ThrowObject(_) => "throwObject",
            ClientMessage::ToggleDoor(_) => "toggleDoor",
            ClientMessage::GhostWhisper(_) => "ghostWhisper",
            ClientMessage::UseScoutAbility {} => "useScoutAbility",
            ClientMessage::UseFinisherTool(_) => "useFinisherTool",
            ClientMessage::Ping {} => "ping",
            ClientMessage::Disconnect {} => "disconnect",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Welcome {
    pub id: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoomAck {
    pub room_id: String,
    pub survivor_id: u32,
    pub world_seed: u64,
    pub killer_type: KillerType,
    pub world_data: WorldData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoutPing {
    pub position: Vec3,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Disconnected {
    pub reason: String,
}

/// Server -> client messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum ServerMessage {
    Welcome(Welcome),
    JoinRoomAck(Box<JoinRoomAck>),
    GameState(Box<MatchState>),
    ScoutPing(ScoutPing),
    Pong {},
    Disconnected(Disconnected),
}

impl MessageKinds for ServerMessage {
    const KINDS: &'static [&'static str] = &[
        "welcome",
        "joinRoomAck",
        "gameState",
        "scoutPing",
        "pong",
        "disconnected",
    ];

    fn kind(&self) -> &'static str {
        match self {
            ServerMessage::Welcome(_) => "welcome",
            ServerMessage::JoinRoomAck(_) => "joinRoomAck",
            ServerMessage::GameState(_) => "gameState",
            ServerMessage::ScoutPing(_) => "scoutPing",
            ServerMessage::Pong {} => "pong",
            ServerMessage::Disconnected(_) => "disconnected",
        }
    }
}

/// A message plus its optional sequencing metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope<M> {
    pub message: M,
    pub seq: Option<u32>,
    pub reply_to: Option<u32>,
}

impl<M> Envelope<M> {
    pub fn new(message: M) -> Self {
        Self {
            message,
            seq: None,
            reply_to: None,
        }
    }

    pub fn with_seq(mut self, seq: u32) -> Self {
        self.seq = Some(seq);
        self
    }

    pub fn reply_to(message: M, seq: Option<u32>) -> Self {
        Self {
            message,
            seq: None,
            reply_to: seq,
        }
    }
}

impl<M: Serialize> Envelope<M> {
    pub fn to_value(&self) -> Result<Value, ProtocolError> {
        let mut value = serde_json::to_value(&self.message).map_err(ProtocolError::Encode)?;
        if let Value::Object(map) = &mut value {
            if !map.contains_key("payload") {
                map.insert("payload".to_string(), Value::Object(Map::new()));
            }
            if let Some(seq) = self.seq {
                map.insert("seq".to_string(), Value::from(seq));
            }
            if let Some(reply_to) = self.reply_to {
                map.insert("replyTo".to_string(), Value::from(reply_to));
            }
        }
        Ok(value)
    }

    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let value = self.to_value()?;
        serde_json::to_vec(&value).map_err(ProtocolError::Encode)
    }
}

impl<M: DeserializeOwned + MessageKinds> Envelope<M> {
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_slice(bytes).map_err(ProtocolError::Malformed)?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, ProtocolError> {
        let Value::Object(mut map) = value else {
            return Err(ProtocolError::NotAnObject);
        };

        let kind = match map.remove("type") {
            Some(Value::String(kind)) => kind,
            _ => return Err(ProtocolError::MissingType),
        };
        if !M::KINDS.contains(&kind.as_str()) {
            return Err(ProtocolError::UnknownType(kind));
        }

        let seq = read_u32(map.get("seq"));
        let reply_to = read_u32(map.get("replyTo"));
        let payload = match map.remove("payload") {
            None | Some(Value::Null) => Value::Object(Map::new()),
            Some(payload) => payload,
        };

        let mut tagged = Map::new();
        tagged.insert("type".to_string(), Value::String(kind.clone()));
        tagged.insert("payload".to_string(), payload);

        let message = serde_json::from_value(Value::Object(tagged))
            .map_err(|source| ProtocolError::InvalidPayload { kind, source })?;

        Ok(Self {
            message,
            seq,
            reply_to,
        })
    }
}

fn read_u32(value: Option<&Value>) -> Option<u32> {
    value
        .and_then(Value::as_u64)
        .and_then(|v| u32::try_from(v).ok())
}
