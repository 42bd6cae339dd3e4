//! Input events produced by sensors and gesture surfaces.
//!
//! An [`InputEvent`] is what a producer hands to the controller.  Each kind
//! maps to exactly one packet and one transport channel:
//!
//! | Event     | Packet      | Channel    |
//! |-----------|-------------|------------|
//! | `Key`     | `Key`       | reliable   |
//! | `Gravity` | `Gravity`   | unreliable |
//! | `Touch`   | `Touch`     | unreliable |
//!
//! Mode switches are not events; they go through
//! [`ConnectionController::set_mode`](super::connection_controller::ConnectionController::set_mode)
//! because the controller tracks the current mode.

use phonemouse_core::{GravitySample, KeyPacket, MouseButton, Packet, TouchPoint};

use crate::infrastructure::network::Channel;

#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    Key(KeyPacket),
    Gravity(GravitySample),
    Touch(Vec<TouchPoint>),
}

impl InputEvent {
    /// Builds a gravity event from a raw accelerometer sample.
    pub fn gravity(x: f32, y: f32, z: f32) -> Self {
        InputEvent::Gravity(GravitySample::new(x, y, z))
    }

    /// Builds a touch event from the currently active contacts.
    pub fn touch(points: impl IntoIterator<Item = TouchPoint>) -> Self {
        InputEvent::Touch(points.into_iter().collect())
    }

    pub fn press(button: MouseButton) -> Self {
        InputEvent::Key(KeyPacket::press(button))
    }

    pub fn release(button: MouseButton) -> Self {
        InputEvent::Key(KeyPacket::release(button))
    }

    /// Channel this event travels on.
    pub fn channel(&self) -> Channel {
        match self {
            InputEvent::Key(_) => Channel::Reliable,
            InputEvent::Gravity(_) | InputEvent::Touch(_) => Channel::Unreliable,
        }
    }

    pub fn into_packet(self) -> Packet {
        match self {
            InputEvent::Key(key) => Packet::Key(key),
            InputEvent::Gravity(sample) => Packet::Gravity(sample),
            InputEvent::Touch(points) => Packet::Touch(points),
        }
    }
}

impl From<KeyPacket> for InputEvent {
    fn from(key: KeyPacket) -> Self {
        InputEvent::Key(key)
    }
}

impl From<GravitySample> for InputEvent {
    fn from(sample: GravitySample) -> Self {
        InputEvent::Gravity(sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_key_events_use_the_reliable_channel() {
        assert_eq!(InputEvent::press(MouseButton::Left).channel(), Channel::Reliable);
        assert_eq!(InputEvent::gravity(0.0, 0.0, 0.0).channel(), Channel::Unreliable);
        assert_eq!(InputEvent::touch(Vec::new()).channel(), Channel::Unreliable);
    }

    #[test]
    fn test_touch_helper_collects_points_in_order() {
        let event = InputEvent::touch((0..3).map(|i| TouchPoint::new(i, i as f32, 0.0)));
        match event.into_packet() {
            Packet::Touch(points) => {
                assert_eq!(points.iter().map(|p| p.id).collect::<Vec<_>>(), vec![0, 1, 2]);
            }
            other => panic!("expected Touch, got {other:?}"),
        }
    }

    #[test]
    fn test_into_packet_preserves_key_edge() {
        assert_eq!(
            InputEvent::release(MouseButton::Right).into_packet(),
            Packet::Key(KeyPacket::release(MouseButton::Right))
        );
    }
}
