//! Iterates over a buffer of back-to-back frames.
//!
//! The reliable channel is a byte stream: frames arrive concatenated with no
//! extra delimiters.  Because every payload is fixed-size or length-prefixed,
//! [`FrameReader`] can walk such a buffer frame by frame.

use crate::protocol::codec::{decode_frame, ProtocolError};
use crate::protocol::messages::Packet;

/// Decodes consecutive frames from a borrowed buffer.
///
/// Iteration stops after the last complete frame, or after yielding the first
/// error.  [`FrameReader::consumed`] tells the caller how many bytes were
/// fully decoded, so a partial trailing frame can be kept for the next read.
///
/// # Examples
///
/// ```rust
/// use phonemouse_core::protocol::{encode_frame, FrameReader};
/// use phonemouse_core::protocol::messages::{ControllerMode, Packet};
///
/// let mut buf = encode_frame(&Packet::SwitchMode(ControllerMode::Mouse)).unwrap();
/// buf.extend(encode_frame(&Packet::SwitchMode(ControllerMode::Idle)).unwrap());
///
/// let packets: Vec<_> = FrameReader::new(&buf).collect::<Result<_, _>>().unwrap();
/// assert_eq!(packets.len(), 2);
/// ```
pub struct FrameReader<'a> {
    buf: &'a [u8],
    offset: usize,
    failed: bool,
}

impl<'a> FrameReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            offset: 0,
            failed: false,
        }
    }

    /// Number of bytes consumed by the frames decoded so far.
    pub fn consumed(&self) -> usize {
        self.offset
    }

    /// Bytes not yet decoded.
    pub fn remaining(&self) -> &'a [u8] {
        &self.buf[self.offset..]
    }
}

impl Iterator for FrameReader<'_> {
    type Item = Result<Packet, ProtocolError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.buf.len() {
            return None;
        }
        match decode_frame(&self.buf[self.offset..]) {
            Ok((packet, used)) => {
                self.offset += used;
                Some(Ok(packet))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

impl std::iter::FusedIterator for FrameReader<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::codec::{encode_frame, FrameDefect};
    use crate::protocol::messages::{
        ControllerMode, GravitySample, KeyPacket, MouseButton, TouchPoint,
    };

    #[test]
    fn test_reader_yields_every_frame_in_order() {
        // Arrange
        let packets = vec![
            Packet::SwitchMode(ControllerMode::Touchpad),
            Packet::Touch(vec![TouchPoint::new(4, 1.0, 2.0)]),
            Packet::Key(KeyPacket::press(MouseButton::Right)),
            Packet::Gravity(GravitySample::new(0.0, 9.8, 0.0)),
        ];
        let buf: Vec<u8> = packets
            .iter()
            .flat_map(|p| encode_frame(p).unwrap())
            .collect();

        // Act
        let mut reader = FrameReader::new(&buf);
        let decoded: Vec<Packet> = reader.by_ref().map(|r| r.unwrap()).collect();

        // Assert
        assert_eq!(decoded, packets);
        assert_eq!(reader.consumed(), buf.len());
        assert!(reader.remaining().is_empty());
    }

    #[test]
    fn test_reader_on_empty_buffer_yields_nothing() {
        let mut reader = FrameReader::new(&[]);
        assert!(reader.next().is_none());
        assert_eq!(reader.consumed(), 0);
    }

    #[test]
    fn test_reader_stops_after_partial_trailing_frame() {
        // Arrange: one complete Key frame followed by the first half of another.
        let mut buf = encode_frame(&Packet::Key(KeyPacket::press(MouseButton::Left))).unwrap();
        buf.extend_from_slice(&[0x02, 0x10]);

        // Act
        let mut reader = FrameReader::new(&buf);
        let first = reader.next();
        let second = reader.next();
        let third = reader.next();

        // Assert
        assert!(matches!(first, Some(Ok(Packet::Key(_)))));
        assert!(matches!(
            second,
            Some(Err(ProtocolError::MalformedFrame(FrameDefect::Truncated { .. })))
        ));
        assert!(third.is_none(), "reader must stay fused after an error");
        assert_eq!(reader.consumed(), 4);
        assert_eq!(reader.remaining(), &[0x02, 0x10]);
    }
}
