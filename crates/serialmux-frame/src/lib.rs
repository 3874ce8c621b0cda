//! Checksummed, channel-tagged framing for serialmux.
//!
//! Every frame on the wire is:
//! - a 1-byte channel identifier (0 is the control channel)
//! - a 1-byte payload length (1..=255)
//! - the payload
//! - a 1-byte additive checksum over everything before it
//!
//! Decoding never trusts the stream: a frame is only yielded once its length is
//! legal and its checksum matches, and a bad byte costs exactly one byte of
//! resynchronization.

pub mod channel;
pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

pub use channel::{
    is_control, is_valid_name, ChannelId, CONTROL, FIRST_USER_CHANNEL, MAX_CHANNEL_NAME_LEN,
};
pub use codec::{
    checksum, encode_frame, try_decode, Decoded, Frame, FrameConfig, CHECKSUM_SIZE,
    DEFAULT_STALL_LIMIT, FRAME_OVERHEAD, HEADER_SIZE, MAX_FRAME_SIZE, MAX_PAYLOAD,
};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use writer::FrameWriter;
