//! All PhoneMouse packet types.
//!
//! Every frame on the wire starts with a one-byte [`PacketIdentifier`] followed
//! by the payload of the matching [`Packet`] variant.  All multi-byte numeric
//! fields are little-endian.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ── Payload sizes ─────────────────────────────────────────────────────────────

/// Size of the identifier byte that prefixes every frame.
pub const IDENTIFIER_SIZE: usize = 1;

/// Payload size of a `SwitchMode` packet: one mode byte.
pub const SWITCH_MODE_PAYLOAD_SIZE: usize = 1;

/// Payload size of a `Gravity` packet: three `f32` components.
pub const GRAVITY_PAYLOAD_SIZE: usize = 12;

/// Payload size of a `Key` packet: `u16` button code + pressed flag.
pub const KEY_PAYLOAD_SIZE: usize = 3;

/// Size of one encoded [`TouchPoint`]: `i64` id + `f32` x + `f32` y.
pub const TOUCH_POINT_SIZE: usize = 16;

/// Largest number of contact points a single `Touch` frame can carry.
pub const MAX_TOUCH_POINTS: usize = u8::MAX as usize;

// ── Packet identifiers ────────────────────────────────────────────────────────

/// Discriminates the payload kind; always the first byte of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum PacketIdentifier {
    SwitchMode = 0x00,
    Gravity = 0x01,
    Key = 0x02,
    Touch = 0x03,
}

/// Rejects bytes outside `0x00..=0x03`, handing the byte back.
impl TryFrom<u8> for PacketIdentifier {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, u8> {
        match value {
            0x00 => Ok(PacketIdentifier::SwitchMode),
            0x01 => Ok(PacketIdentifier::Gravity),
            0x02 => Ok(PacketIdentifier::Key),
            0x03 => Ok(PacketIdentifier::Touch),
            other => Err(other),
        }
    }
}

// ── Controller mode ───────────────────────────────────────────────────────────

/// Operating mode currently active on the handheld.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum ControllerMode {
    #[default]
    Idle = 0x00,
    Gravity = 0x01,
    Touchpad = 0x02,
    Tablet = 0x03,
    Mouse = 0x04,
}

impl TryFrom<u8> for ControllerMode {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, u8> {
        match value {
            0x00 => Ok(ControllerMode::Idle),
            0x01 => Ok(ControllerMode::Gravity),
            0x02 => Ok(ControllerMode::Touchpad),
            0x03 => Ok(ControllerMode::Tablet),
            0x04 => Ok(ControllerMode::Mouse),
            other => Err(other),
        }
    }
}

impl ControllerMode {
    /// Lower-case name, as accepted by [`FromStr`].
    pub fn as_str(self) -> &'static str {
        match self {
            ControllerMode::Idle => "idle",
            ControllerMode::Gravity => "gravity",
            ControllerMode::Touchpad => "touchpad",
            ControllerMode::Tablet => "tablet",
            ControllerMode::Mouse => "mouse",
        }
    }
}

impl fmt::Display for ControllerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ControllerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "idle" => Ok(ControllerMode::Idle),
            "gravity" => Ok(ControllerMode::Gravity),
            "touchpad" => Ok(ControllerMode::Touchpad),
            "tablet" => Ok(ControllerMode::Tablet),
            "mouse" => Ok(ControllerMode::Mouse),
            other => Err(format!("unknown controller mode: {other}")),
        }
    }
}

// ── Buttons ───────────────────────────────────────────────────────────────────

/// Pointer button carried by a `Key` packet.
///
/// The numeric codes match the host's virtual input button numbering
/// (`BTN_LEFT` / `BTN_RIGHT` in the Linux input event codes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u16)]
pub enum MouseButton {
    Left = 272,
    Right = 273,
}

impl MouseButton {
    /// Wire code of this button.
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Maps a wire code back to a button, if it is one we know.
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            272 => Some(MouseButton::Left),
            273 => Some(MouseButton::Right),
            _ => None,
        }
    }
}

impl FromStr for MouseButton {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "left" => Ok(MouseButton::Left),
            "right" => Ok(MouseButton::Right),
            other => Err(format!("unknown mouse button: {other}")),
        }
    }
}

// ── Payload structs ───────────────────────────────────────────────────────────

/// Accelerometer / orientation sample.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GravitySample {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl GravitySample {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// Button edge: `pressed = true` on press, `false` on release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPacket {
    pub button: MouseButton,
    pub pressed: bool,
}

impl KeyPacket {
    pub fn press(button: MouseButton) -> Self {
        Self { button, pressed: true }
    }

    pub fn release(button: MouseButton) -> Self {
        Self { button, pressed: false }
    }
}

/// One active contact point.
///
/// `id` is assigned by the input surface and stays stable for as long as the
/// contact persists; the protocol does not interpret it further.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TouchPoint {
    pub id: i64,
    pub x: f32,
    pub y: f32,
}

impl TouchPoint {
    pub fn new(id: i64, x: f32, y: f32) -> Self {
        Self { id, x, y }
    }
}

// ── Top-level packet ──────────────────────────────────────────────────────────

/// A decoded packet: one variant per [`PacketIdentifier`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Packet {
    SwitchMode(ControllerMode),
    Gravity(GravitySample),
    Key(KeyPacket),
    /// All contact points active in one frame, in input-surface order.
    Touch(Vec<TouchPoint>),
}

impl Packet {
    /// Returns the identifier byte that prefixes this packet on the wire.
    pub fn identifier(&self) -> PacketIdentifier {
        match self {
            Packet::SwitchMode(_) => PacketIdentifier::SwitchMode,
            Packet::Gravity(_) => PacketIdentifier::Gravity,
            Packet::Key(_) => PacketIdentifier::Key,
            Packet::Touch(_) => PacketIdentifier::Touch,
        }
    }

    /// Encoded payload size in bytes, excluding the identifier byte.
    pub fn payload_len(&self) -> usize {
        match self {
            Packet::SwitchMode(_) => SWITCH_MODE_PAYLOAD_SIZE,
            Packet::Gravity(_) => GRAVITY_PAYLOAD_SIZE,
            Packet::Key(_) => KEY_PAYLOAD_SIZE,
            Packet::Touch(points) => 1 + points.len() * TOUCH_POINT_SIZE,
        }
    }

    /// Total frame size in bytes, identifier included.
    pub fn frame_len(&self) -> usize {
        IDENTIFIER_SIZE + self.payload_len()
    }
}
