//! Control channel messages.
//!
//! Every control frame carries a fixed 16-byte payload:
//!
//! ```text
//! [command: u8][timestamp: u32 BE][channel: u8][name: 10 bytes, NUL padded]
//! ```
//!
//! Fields a command does not use are sent as zero.

use bytes::{Buf, BufMut};
use serialmux_frame::{is_valid_name, ChannelId, MAX_CHANNEL_NAME_LEN};

/// Size of every control payload on the wire.
pub const CONTROL_PAYLOAD_LEN: usize = 1 + 4 + 1 + MAX_CHANNEL_NAME_LEN;

/// Heartbeat request.
pub const CONTROL_SYNC: u8 = 0x00;
/// Heartbeat response echoing the request timestamp.
pub const CONTROL_SYNC_RSP: u8 = 0x01;
/// Request to receive a named channel.
pub const CONTROL_SCRB: u8 = 0x02;
/// Answer to a subscribe request carrying the responder's identifier.
pub const CONTROL_SCRB_RSP: u8 = 0x03;

/// Decoded control channel message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    /// Heartbeat stamped with the sender's clock.
    Sync { timestamp: u32 },
    /// Reply to a heartbeat; `timestamp` is the request's, unchanged.
    SyncResponse { timestamp: u32 },
    /// The sender wants frames of the channel called `name`.
    Subscribe { name: String },
    /// `channel` is the responder's identifier for `name`, or 0 if it has none.
    SubscribeResponse { channel: ChannelId, name: String },
}

impl ControlMessage {
    /// Command byte for this message.
    pub fn command(&self) -> u8 {
        match self {
            Self::Sync { .. } => CONTROL_SYNC,
            Self::SyncResponse { .. } => CONTROL_SYNC_RSP,
            Self::Subscribe { .. } => CONTROL_SCRB,
            Self::SubscribeResponse { .. } => CONTROL_SCRB_RSP,
        }
    }

    /// Encode into the fixed-size wire payload.
    pub fn encode(&self) -> [u8; CONTROL_PAYLOAD_LEN] {
        let (timestamp, channel, name) = match self {
            Self::Sync { timestamp } | Self::SyncResponse { timestamp } => (*timestamp, 0, ""),
            Self::Subscribe { name } => (0, 0, name.as_str()),
            Self::SubscribeResponse { channel, name } => (0, *channel, name.as_str()),
        };

        let mut name_field = [0u8; MAX_CHANNEL_NAME_LEN];
        let name = name.as_bytes();
        let len = name.len().min(MAX_CHANNEL_NAME_LEN);
        name_field[..len].copy_from_slice(&name[..len]);

        let mut out = [0u8; CONTROL_PAYLOAD_LEN];
        let mut cursor = &mut out[..];
        cursor.put_u8(self.command());
        cursor.put_u32(timestamp);
        cursor.put_u8(channel);
        cursor.put_slice(&name_field);
        out
    }

    /// Decode a control payload.
    ///
    /// Returns `None` for a payload of the wrong length, an unknown command,
    /// or a subscription message whose name is not a valid channel name.
    pub fn decode(payload: &[u8]) -> Option<Self> {
        if payload.len() != CONTROL_PAYLOAD_LEN {
            return None;
        }

        let mut buf = payload;
        let command = buf.get_u8();
        let timestamp = buf.get_u32();
        let channel = buf.get_u8();
        let name_field = buf;

        match command {
            CONTROL_SYNC => Some(Self::Sync { timestamp }),
            CONTROL_SYNC_RSP => Some(Self::SyncResponse { timestamp }),
            CONTROL_SCRB => decode_name(name_field).map(|name| Self::Subscribe { name }),
            CONTROL_SCRB_RSP => {
                decode_name(name_field).map(|name| Self::SubscribeResponse { channel, name })
            }
            _ => None,
        }
    }
}

fn decode_name(field: &[u8]) -> Option<String> {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    let name = std::str::from_utf8(&field[..end]).ok()?;
    is_valid_name(name).then(|| name.to_string())
}
