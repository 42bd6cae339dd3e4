//! Protocol module containing packet types, the binary codec and the frame reader.

pub mod codec;
pub mod messages;
pub mod reader;

pub use codec::{
    decode_frame, decode_payload, encode_frame, encode_payload, FrameDefect, ProtocolError,
};
pub use messages::*;
pub use reader::FrameReader;
