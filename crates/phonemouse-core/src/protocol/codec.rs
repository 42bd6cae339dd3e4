//! Binary codec for encoding and decoding PhoneMouse frames.
//!
//! Wire format:
//! ```text
//! [identifier:1][payload:N]
//!
//! SwitchMode  [mode:1]
//! Gravity     [x:f32][y:f32][z:f32]
//! Key         [button:u16][pressed:1]
//! Touch       [count:1] count × [id:i64][x:f32][y:f32]
//! ```
//! All multi-byte fields are little-endian.  Every payload is either fixed-size
//! or self-length-prefixed, so frames can be concatenated on a stream without
//! any extra framing.

use thiserror::Error;

use crate::protocol::messages::{
    ControllerMode, GravitySample, KeyPacket, MouseButton, Packet, PacketIdentifier, TouchPoint,
    GRAVITY_PAYLOAD_SIZE, IDENTIFIER_SIZE, KEY_PAYLOAD_SIZE, MAX_TOUCH_POINTS,
    SWITCH_MODE_PAYLOAD_SIZE, TOUCH_POINT_SIZE,
};

/// Errors that can occur during frame encoding or decoding.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The bytes do not form a valid frame.  Decoding never guesses past this.
    #[error("malformed frame: {0}")]
    MalformedFrame(#[from] FrameDefect),

    /// A touch payload has more points than the one-byte count can express.
    #[error("touch frame has {0} points; at most {MAX_TOUCH_POINTS} fit in one frame")]
    TooManyTouchPoints(usize),
}

/// Why a byte sequence was rejected as a frame.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameDefect {
    #[error("empty buffer")]
    Empty,

    #[error("unknown packet identifier 0x{0:02X}")]
    UnknownIdentifier(u8),

    #[error("{context} needs {needed} bytes, got {available}")]
    Truncated {
        context: &'static str,
        needed: usize,
        available: usize,
    },

    #[error("unknown controller mode {0}")]
    UnknownMode(u8),

    #[error("unknown button code {0}")]
    UnknownButton(u16),
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes a [`Packet`] into a complete frame (identifier byte + payload).
///
/// # Errors
///
/// Returns [`ProtocolError::TooManyTouchPoints`] for a touch packet with more
/// than [`MAX_TOUCH_POINTS`] points.
///
/// # Examples
///
/// ```rust
/// use phonemouse_core::protocol::{decode_frame, encode_frame};
/// use phonemouse_core::protocol::messages::{KeyPacket, MouseButton, Packet};
///
/// let packet = Packet::Key(KeyPacket::press(MouseButton::Left));
/// let bytes = encode_frame(&packet).unwrap();
/// assert_eq!(bytes, [0x02, 0x10, 0x01, 0x01]);
///
/// let (decoded, consumed) = decode_frame(&bytes).unwrap();
/// assert_eq!(decoded, packet);
/// assert_eq!(consumed, 4);
/// ```
pub fn encode_frame(packet: &Packet) -> Result<Vec<u8>, ProtocolError> {
    let mut buf = Vec::with_capacity(packet.frame_len());
    buf.push(packet.identifier() as u8);
    write_payload(&mut buf, packet)?;
    Ok(buf)
}

/// Decodes one frame from the beginning of `bytes`.
///
/// Returns the packet and the number of bytes consumed (identifier included).
/// Bytes after the frame are left untouched so the caller can advance a
/// cursor over concatenated frames.
///
/// # Errors
///
/// Returns [`ProtocolError::MalformedFrame`] if the identifier is unknown or the
/// buffer is shorter than the variant requires.
pub fn decode_frame(bytes: &[u8]) -> Result<(Packet, usize), ProtocolError> {
    let (&first, rest) = bytes.split_first().ok_or(FrameDefect::Empty)?;
    let identifier =
        PacketIdentifier::try_from(first).map_err(FrameDefect::UnknownIdentifier)?;
    let (packet, payload_len) = decode_payload(identifier, rest)?;
    Ok((packet, IDENTIFIER_SIZE + payload_len))
}

/// Encodes only the payload of `packet`, without the identifier byte.
///
/// # Errors
///
/// See [`encode_frame`].
pub fn encode_payload(packet: &Packet) -> Result<Vec<u8>, ProtocolError> {
    let mut buf = Vec::with_capacity(packet.payload_len());
    write_payload(&mut buf, packet)?;
    Ok(buf)
}

/// Decodes the payload of a packet whose identifier is already known.
///
/// Returns the packet and the number of payload bytes consumed.
///
/// # Errors
///
/// Returns [`ProtocolError::MalformedFrame`] if `payload` is too short or holds
/// an out-of-range field.
pub fn decode_payload(
    identifier: PacketIdentifier,
    payload: &[u8],
) -> Result<(Packet, usize), ProtocolError> {
    match identifier {
        PacketIdentifier::SwitchMode => decode_switch_mode(payload)
            .map(|mode| (Packet::SwitchMode(mode), SWITCH_MODE_PAYLOAD_SIZE)),
        PacketIdentifier::Gravity => {
            decode_gravity(payload).map(|g| (Packet::Gravity(g), GRAVITY_PAYLOAD_SIZE))
        }
        PacketIdentifier::Key => decode_key(payload).map(|k| (Packet::Key(k), KEY_PAYLOAD_SIZE)),
        PacketIdentifier::Touch => decode_touch(payload).map(|(points, used)| (Packet::Touch(points), used)),
    }
}

// ── Payload encoding ──────────────────────────────────────────────────────────

fn write_payload(buf: &mut Vec<u8>, packet: &Packet) -> Result<(), ProtocolError> {
    match packet {
        Packet::SwitchMode(mode) => buf.push(*mode as u8),
        Packet::Gravity(g) => encode_gravity(buf, g),
        Packet::Key(k) => encode_key(buf, k),
        Packet::Touch(points) => encode_touch(buf, points)?,
    }
    Ok(())
}

fn encode_gravity(buf: &mut Vec<u8>, g: &GravitySample) {
    buf.extend_from_slice(&g.x.to_le_bytes());
    buf.extend_from_slice(&g.y.to_le_bytes());
    buf.extend_from_slice(&g.z.to_le_bytes());
}

fn encode_key(buf: &mut Vec<u8>, k: &KeyPacket) {
    buf.extend_from_slice(&k.button.code().to_le_bytes());
    buf.push(if k.pressed { 0x01 } else { 0x00 });
}

fn encode_touch(buf: &mut Vec<u8>, points: &[TouchPoint]) -> Result<(), ProtocolError> {
    if points.len() > MAX_TOUCH_POINTS {
        return Err(ProtocolError::TooManyTouchPoints(points.len()));
    }
    buf.push(points.len() as u8);
    for point in points {
        buf.extend_from_slice(&point.id.to_le_bytes());
        buf.extend_from_slice(&point.x.to_le_bytes());
        buf.extend_from_slice(&point.y.to_le_bytes());
    }
    Ok(())
}

// ── Payload decoding ──────────────────────────────────────────────────────────

fn decode_switch_mode(p: &[u8]) -> Result<ControllerMode, ProtocolError> {
    require_len(p, SWITCH_MODE_PAYLOAD_SIZE, "SwitchMode")?;
    ControllerMode::try_from(p[0]).map_err(|b| FrameDefect::UnknownMode(b).into())
}

fn decode_gravity(p: &[u8]) -> Result<GravitySample, ProtocolError> {
    require_len(p, GRAVITY_PAYLOAD_SIZE, "Gravity")?;
    Ok(GravitySample {
        x: read_f32(p, 0),
        y: read_f32(p, 4),
        z: read_f32(p, 8),
    })
}

fn decode_key(p: &[u8]) -> Result<KeyPacket, ProtocolError> {
    require_len(p, KEY_PAYLOAD_SIZE, "Key")?;
    let code = u16::from_le_bytes([p[0], p[1]]);
    let button = MouseButton::from_code(code).ok_or(FrameDefect::UnknownButton(code))?;
    // Any non-zero flag counts as pressed.
    let pressed = p[2] != 0;
    Ok(KeyPacket { button, pressed })
}

fn decode_touch(p: &[u8]) -> Result<(Vec<TouchPoint>, usize), ProtocolError> {
    require_len(p, 1, "Touch")?;
    let count = p[0] as usize;
    let total = 1 + count * TOUCH_POINT_SIZE;
    require_len(p, total, "Touch points")?;

    let mut points = Vec::with_capacity(count);
    let mut off = 1;
    for _ in 0..count {
        let mut id = [0u8; 8];
        id.copy_from_slice(&p[off..off + 8]);
        points.push(TouchPoint {
            id: i64::from_le_bytes(id),
            x: read_f32(p, off + 8),
            y: read_f32(p, off + 12),
        });
        off += TOUCH_POINT_SIZE;
    }
    Ok((points, total))
}

// ── Utility helpers ───────────────────────────────────────────────────────────

fn require_len(buf: &[u8], needed: usize, context: &'static str) -> Result<(), ProtocolError> {
    if buf.len() < needed {
        Err(FrameDefect::Truncated {
            context,
            needed,
            available: buf.len(),
        }
        .into())
    } else {
        Ok(())
    }
}

/// Reads a little-endian `f32`; callers check the length first.
fn read_f32(buf: &[u8], offset: usize) -> f32 {
    f32::from_le_bytes([buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]])
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(packet: &Packet) -> Packet {
        let bytes = encode_frame(packet).expect("encode");
        let (decoded, consumed) = decode_frame(&bytes).expect("decode");
        assert_eq!(consumed, bytes.len(), "decode must consume the whole frame");
        decoded
    }

    // ── SwitchMode ────────────────────────────────────────────────────────────

    #[test]
    fn test_switch_mode_round_trip_all_modes() {
        for mode in [
            ControllerMode::Idle,
            ControllerMode::Gravity,
            ControllerMode::Touchpad,
            ControllerMode::Tablet,
            ControllerMode::Mouse,
        ] {
            let packet = Packet::SwitchMode(mode);
            assert_eq!(round_trip(&packet), packet);
        }
    }

    #[test]
    fn test_switch_mode_touchpad_encodes_to_two_bytes() {
        let bytes = encode_frame(&Packet::SwitchMode(ControllerMode::Touchpad)).unwrap();
        assert_eq!(bytes, [0x00, 0x02]);
    }

    #[test]
    fn test_switch_mode_unknown_mode_byte_is_malformed() {
        let result = decode_frame(&[0x00, 0x09]);
        assert_eq!(
            result,
            Err(ProtocolError::MalformedFrame(FrameDefect::UnknownMode(0x09)))
        );
    }

    // ── Gravity ───────────────────────────────────────────────────────────────

    #[test]
    fn test_gravity_round_trip() {
        let packet = Packet::Gravity(GravitySample::new(0.25, -9.81, 3.5));
        assert_eq!(round_trip(&packet), packet);
    }

    #[test]
    fn test_gravity_extreme_values_round_trip() {
        let packet = Packet::Gravity(GravitySample::new(f32::MAX, f32::MIN, f32::EPSILON));
        assert_eq!(round_trip(&packet), packet);
    }

    #[test]
    fn test_gravity_is_little_endian() {
        let bytes = encode_frame(&Packet::Gravity(GravitySample::new(1.0, 0.0, 0.0))).unwrap();
        assert_eq!(bytes.len(), 13);
        assert_eq!(&bytes[1..5], &1.0f32.to_le_bytes());
        assert_eq!(&bytes[5..13], &[0u8; 8]);
    }

    #[test]
    fn test_gravity_truncated_payload_is_malformed() {
        let bytes = encode_frame(&Packet::Gravity(GravitySample::new(1.0, 2.0, 3.0))).unwrap();
        let result = decode_frame(&bytes[..12]);
        assert_eq!(
            result,
            Err(ProtocolError::MalformedFrame(FrameDefect::Truncated {
                context: "Gravity",
                needed: 12,
                available: 11,
            }))
        );
    }

    // ── Key ───────────────────────────────────────────────────────────────────

    #[test]
    fn test_key_left_pressed_matches_reference_bytes() {
        let packet = Packet::Key(KeyPacket::press(MouseButton::Left));

        let bytes = encode_frame(&packet).unwrap();
        assert_eq!(bytes, [0x02, 0x10, 0x01, 0x01]);

        let (decoded, consumed) = decode_frame(&bytes).unwrap();
        assert_eq!(decoded, packet);
        assert_eq!(consumed, 4);
    }

    #[test]
    fn test_key_right_released_round_trip() {
        let packet = Packet::Key(KeyPacket::release(MouseButton::Right));
        assert_eq!(round_trip(&packet), packet);
    }

    #[test]
    fn test_key_nonzero_pressed_flag_decodes_as_pressed() {
        let (decoded, _) = decode_frame(&[0x02, 0x11, 0x01, 0x7F]).unwrap();
        assert_eq!(decoded, Packet::Key(KeyPacket::press(MouseButton::Right)));
    }

    #[test]
    fn test_key_unknown_button_code_is_malformed() {
        let result = decode_frame(&[0x02, 0x12, 0x01, 0x01]);
        assert_eq!(
            result,
            Err(ProtocolError::MalformedFrame(FrameDefect::UnknownButton(274)))
        );
    }

    // ── Touch ─────────────────────────────────────────────────────────────────

    #[test]
    fn test_touch_empty_is_single_count_byte() {
        let packet = Packet::Touch(Vec::new());

        let payload = encode_payload(&packet).unwrap();
        assert_eq!(payload, [0x00]);

        let frame = encode_frame(&packet).unwrap();
        assert_eq!(frame, [0x03, 0x00]);
        assert_eq!(round_trip(&packet), packet);
    }

    #[test]
    fn test_touch_multiple_points_round_trip_in_order() {
        let packet = Packet::Touch(vec![
            TouchPoint::new(7, 10.5, 20.25),
            TouchPoint::new(-3, 0.0, 1080.0),
            TouchPoint::new(i64::MAX, -1.0, -2.0),
        ]);
        assert_eq!(round_trip(&packet), packet);
    }

    #[test]
    fn test_touch_max_points_round_trip() {
        let points: Vec<TouchPoint> = (0..MAX_TOUCH_POINTS as i64)
            .map(|i| TouchPoint::new(i, i as f32, -(i as f32)))
            .collect();
        let packet = Packet::Touch(points);
        let bytes = encode_frame(&packet).unwrap();
        assert_eq!(bytes.len(), 2 + MAX_TOUCH_POINTS * TOUCH_POINT_SIZE);
        assert_eq!(round_trip(&packet), packet);
    }

    #[test]
    fn test_touch_too_many_points_is_rejected_on_encode() {
        let points = vec![TouchPoint::new(0, 0.0, 0.0); MAX_TOUCH_POINTS + 1];
        let result = encode_frame(&Packet::Touch(points));
        assert_eq!(result, Err(ProtocolError::TooManyTouchPoints(256)));
    }

    #[test]
    fn test_touch_decode_stops_at_declared_count() {
        let packet = Packet::Touch(vec![TouchPoint::new(1, 2.0, 3.0)]);
        let mut bytes = encode_frame(&packet).unwrap();
        bytes.extend_from_slice(&[0xAA, 0xBB, 0xCC]);

        let (decoded, consumed) = decode_frame(&bytes).unwrap();

        assert_eq!(decoded, packet);
        assert_eq!(consumed, 2 + TOUCH_POINT_SIZE);
    }

    #[test]
    fn test_touch_count_larger_than_buffer_is_malformed() {
        // Declares two points but carries only one.
        let mut bytes = vec![0x03, 0x02];
        bytes.extend_from_slice(&[0u8; TOUCH_POINT_SIZE]);
        let result = decode_frame(&bytes);
        assert!(matches!(
            result,
            Err(ProtocolError::MalformedFrame(FrameDefect::Truncated {
                needed: 33,
                available: 17,
                ..
            }))
        ));
    }

    // ── Frame boundaries and rejection ────────────────────────────────────────

    #[test]
    fn test_concatenated_frames_decode_in_sequence() {
        let first = Packet::Touch(vec![TouchPoint::new(1, 1.0, 1.0), TouchPoint::new(2, 2.0, 2.0)]);
        let second = Packet::Key(KeyPacket::release(MouseButton::Left));
        let mut bytes = encode_frame(&first).unwrap();
        let first_len = bytes.len();
        bytes.extend(encode_frame(&second).unwrap());

        let (a, used_a) = decode_frame(&bytes).unwrap();
        let (b, used_b) = decode_frame(&bytes[used_a..]).unwrap();

        assert_eq!(a, first);
        assert_eq!(used_a, first_len);
        assert_eq!(b, second);
        assert_eq!(used_a + used_b, bytes.len());
    }

    #[test]
    fn test_decode_empty_buffer_is_malformed() {
        assert_eq!(
            decode_frame(&[]),
            Err(ProtocolError::MalformedFrame(FrameDefect::Empty))
        );
    }

    #[test]
    fn test_decode_unknown_identifier_is_malformed() {
        assert_eq!(
            decode_frame(&[0x04, 0x00, 0x00]),
            Err(ProtocolError::MalformedFrame(FrameDefect::UnknownIdentifier(0x04)))
        );
    }

    #[test]
    fn test_decode_identifier_without_payload_is_malformed() {
        for id in 0x00..=0x03u8 {
            let result = decode_frame(&[id]);
            assert!(
                matches!(result, Err(ProtocolError::MalformedFrame(FrameDefect::Truncated { .. }))),
                "identifier {id} alone must be rejected, got {result:?}"
            );
        }
    }

    #[test]
    fn test_decode_payload_reports_payload_bytes_only() {
        let (packet, used) =
            decode_payload(PacketIdentifier::Key, &[0x10, 0x01, 0x00, 0xFF]).unwrap();
        assert_eq!(packet, Packet::Key(KeyPacket::release(MouseButton::Left)));
        assert_eq!(used, KEY_PAYLOAD_SIZE);
    }
}
