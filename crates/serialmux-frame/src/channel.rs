//! Channel identifiers and names.
//!
//! Identifier 0 is reserved for the control channel (heartbeats and
//! subscription negotiation). Application channels are numbered from 1 in
//! registration order.

/// Numeric channel identifier as carried on the wire.
pub type ChannelId = u8;

/// Control channel: synchronization and subscription traffic only.
pub const CONTROL: ChannelId = 0;

/// First identifier handed out to an application channel.
pub const FIRST_USER_CHANNEL: ChannelId = 1;

/// Maximum channel name length in bytes (width of the wire name field).
pub const MAX_CHANNEL_NAME_LEN: usize = 10;

/// Returns true for the reserved control channel.
pub fn is_control(id: ChannelId) -> bool {
    id == CONTROL
}

/// Returns true if `name` fits the wire name field.
///
/// Names are 1..=10 bytes and must not contain NUL, which pads the field.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name.len() <= MAX_CHANNEL_NAME_LEN && !name.contains('\0')
}
