//! Wire protocol for duel netplay.
//!
//! Defines the two datagram payloads exchanged between host and
//! clients/spectators (per-tick control-input samples and authoritative
//! state snapshots) plus the envelope used when a relay sits in the
//! middle. Everything is flat, field-named JSON so either side can add
//! optional fields without breaking the other.

use serde::{Deserialize, Serialize};

/// Maximum encoded size of a control-input datagram (UDP safe).
pub const MAX_INPUT_SIZE: usize = 2048;

/// Maximum encoded size of a state-snapshot datagram (UDP safe).
pub const MAX_SNAPSHOT_SIZE: usize = 8192;

/// One participant's intent for a single input tick.
///
/// `attack` and `gesture` are edge-triggered clicks; the movement axes,
/// `dash` and `block` are held flags. A sample decoded from a sparse
/// payload degrades to "no intent".
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InputSample {
    #[serde(default)]
    pub up: bool,
    #[serde(default)]
    pub down: bool,
    #[serde(default)]
    pub left: bool,
    #[serde(default)]
    pub right: bool,
    #[serde(default)]
    pub dash: bool,
    #[serde(default)]
    pub block: bool,
    #[serde(default)]
    pub attack: bool,
    #[serde(default)]
    pub gesture: bool,
    /// Pointer position in screen space, when the source has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mouse_x: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mouse_y: Option<f32>,
}

/// Camera focal position in world space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CameraState {
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
}

/// Authoritative per-tick record for one participant.
///
/// A snapshot is a complete replacement of the prior one; numeric fields
/// default to zero and flags to false so a momentarily missing field
/// degrades gracefully instead of failing the decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    pub name: String,
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    #[serde(default)]
    pub health: f32,
    #[serde(default)]
    pub max_health: f32,
    /// One of "up", "down", "left", "right".
    #[serde(default)]
    pub facing: String,
    #[serde(default)]
    pub is_attacking: bool,
    #[serde(default)]
    pub is_blocking: bool,
    #[serde(default)]
    pub is_gesturing: bool,
    #[serde(default)]
    pub is_moving: bool,
    #[serde(default)]
    pub attack_dir_x: f32,
    #[serde(default)]
    pub attack_dir_y: f32,
    #[serde(default)]
    pub attack_origin_x: f32,
    #[serde(default)]
    pub attack_origin_y: f32,
    /// Shield aim in continuous radians.
    #[serde(default)]
    pub shield_angle: f32,
    #[serde(default)]
    pub mouse_world_x: f32,
    #[serde(default)]
    pub mouse_world_y: f32,
    #[serde(default)]
    pub critical_hit_timer: f32,
    #[serde(default)]
    pub critical_border_timer: f32,
    #[serde(default)]
    pub critical_text_world_x: f32,
    #[serde(default)]
    pub critical_text_world_y: f32,
    #[serde(default)]
    pub critical_text_offset_y: f32,
    #[serde(default)]
    pub shield_block_timer: f32,
    #[serde(default)]
    pub shield_text_world_x: f32,
    #[serde(default)]
    pub shield_text_world_y: f32,
    #[serde(default)]
    pub shield_text_offset_y: f32,
    /// Health-bar color as an RGB triple.
    #[serde(default)]
    pub ui_color: [u8; 3],
}

/// Transient projectile record. Rebuilt wholesale every snapshot; no
/// identity is preserved across snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectileState {
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    #[serde(default)]
    pub dir_x: f32,
    #[serde(default)]
    pub dir_y: f32,
    /// Owning participant's name; empty when unowned.
    #[serde(default)]
    pub owner: String,
}

/// One complete host-authoritative description of visible game state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Session phase tag, "menu" or "playing".
    pub game_state: String,
    #[serde(default)]
    pub last_winner: Option<String>,
    #[serde(default)]
    pub camera: CameraState,
    #[serde(default)]
    pub players: Vec<PlayerState>,
    #[serde(default)]
    pub projectiles: Vec<ProjectileState>,
}

/// Party role tag carried by relay envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayRole {
    Host,
    Client,
}

/// Which forwarding lane of the relay an envelope belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayKind {
    Control,
    State,
}

/// Envelope wrapping a payload for blind relay forwarding, or (with
/// `msg_type = "register"` and no payload) re-registering the sender's
/// address with the relay so its mapping does not expire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayEnvelope {
    pub lobby: String,
    pub role: RelayRole,
    pub kind: RelayKind,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub msg_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

/// Codec errors.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Malformed message: {0}")]
    Malformed(String),

    #[error("Encoded payload is {size} bytes, over the {limit} byte datagram cap")]
    TooLarge { size: usize, limit: usize },
}

fn encode_capped<T: Serialize>(value: &T, limit: usize) -> Result<Vec<u8>, CodecError> {
    let bytes = serde_json::to_vec(value).map_err(|e| CodecError::Malformed(e.to_string()))?;
    if bytes.len() > limit {
        return Err(CodecError::TooLarge {
            size: bytes.len(),
            limit,
        });
    }
    Ok(bytes)
}

/// Encode a control-input sample for the wire.
pub fn encode_input(sample: &InputSample) -> Result<Vec<u8>, CodecError> {
    encode_capped(sample, MAX_INPUT_SIZE)
}

/// Decode a control-input sample. Any structural mismatch is
/// `CodecError::Malformed`; callers drop the datagram and continue.
pub fn decode_input(bytes: &[u8]) -> Result<InputSample, CodecError> {
    serde_json::from_slice(bytes).map_err(|e| CodecError::Malformed(e.to_string()))
}

/// Encode a state snapshot for the wire.
pub fn encode_snapshot(snapshot: &StateSnapshot) -> Result<Vec<u8>, CodecError> {
    encode_capped(snapshot, MAX_SNAPSHOT_SIZE)
}

/// Decode a state snapshot.
pub fn decode_snapshot(bytes: &[u8]) -> Result<StateSnapshot, CodecError> {
    serde_json::from_slice(bytes).map_err(|e| CodecError::Malformed(e.to_string()))
}

impl RelayEnvelope {
    /// Wrap a snapshot for relay forwarding on the state lane.
    pub fn state(lobby: &str, snapshot: &StateSnapshot) -> Result<Self, CodecError> {
        Ok(Self {
            lobby: lobby.to_string(),
            role: RelayRole::Host,
            kind: RelayKind::State,
            msg_type: None,
            payload: Some(
                serde_json::to_value(snapshot).map_err(|e| CodecError::Malformed(e.to_string()))?,
            ),
        })
    }

    /// Wrap an input sample for relay forwarding on the control lane.
    pub fn control(lobby: &str, sample: &InputSample) -> Result<Self, CodecError> {
        Ok(Self {
            lobby: lobby.to_string(),
            role: RelayRole::Client,
            kind: RelayKind::Control,
            msg_type: None,
            payload: Some(
                serde_json::to_value(sample).map_err(|e| CodecError::Malformed(e.to_string()))?,
            ),
        })
    }

    /// Registration/keepalive envelope carrying no payload.
    pub fn register(lobby: &str, role: RelayRole, kind: RelayKind) -> Self {
        Self {
            lobby: lobby.to_string(),
            role,
            kind,
            msg_type: Some("register".to_string()),
            payload: None,
        }
    }

    /// Encode for the wire, capped at the size limit of the wrapped kind.
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let limit = match self.kind {
            RelayKind::Control => MAX_INPUT_SIZE,
            RelayKind::State => MAX_SNAPSHOT_SIZE,
        };
        encode_capped(self, limit)
    }

    /// Decode an envelope from the wire.
    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        serde_json::from_slice(bytes).map_err(|e| CodecError::Malformed(e.to_string()))
    }

    /// Extract the wrapped snapshot, if this is a state envelope with a payload.
    pub fn snapshot(&self) -> Result<StateSnapshot, CodecError> {
        let payload = self
            .payload
            .as_ref()
            .ok_or_else(|| CodecError::Malformed("envelope has no payload".to_string()))?;
        serde_json::from_value(payload.clone()).map_err(|e| CodecError::Malformed(e.to_string()))
    }

    /// Extract the wrapped input sample, if this is a control envelope with a payload.
    pub fn input(&self) -> Result<InputSample, CodecError> {
        let payload = self
            .payload
            .as_ref()
            .ok_or_else(|| CodecError::Malformed("envelope has no payload".to_string()))?;
        serde_json::from_value(payload.clone()).map_err(|e| CodecError::Malformed(e.to_string()))
    }
}
