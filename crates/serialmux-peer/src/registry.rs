use std::fmt;

use serialmux_frame::{is_valid_name, ChannelId, FIRST_USER_CHANNEL};
use tracing::debug;

use crate::dispatch::Subscriber;
use crate::error::{MuxError, Result};

struct Channel {
    name: String,
    max_payload_size: usize,
    subscriber: Option<Subscriber>,
    peer_subscribed: bool,
}

/// Local channels, indexed by identifier.
///
/// Identifiers are handed out from 1 in registration order and never change.
pub struct ChannelRegistry {
    channels: Vec<Channel>,
    max_channels: u8,
    max_payload_size: usize,
}

impl ChannelRegistry {
    /// Create an empty registry.
    ///
    /// `max_payload_size` is the frame-level ceiling individual channels must
    /// stay within.
    pub fn new(max_channels: u8, max_payload_size: usize) -> Self {
        Self {
            channels: Vec::with_capacity(max_channels as usize),
            max_channels,
            max_payload_size,
        }
    }

    /// Register a channel and return its identifier.
    pub fn register(&mut self, name: &str, max_payload_size: usize) -> Result<ChannelId> {
        if !is_valid_name(name) {
            return Err(MuxError::InvalidChannelName(name.to_string()));
        }
        if max_payload_size == 0 || max_payload_size > self.max_payload_size {
            return Err(MuxError::InvalidChannelSize {
                name: name.to_string(),
                size: max_payload_size,
                max: self.max_payload_size,
            });
        }
        if self.position(name).is_some() {
            return Err(MuxError::DuplicateChannelName(name.to_string()));
        }
        if self.channels.len() >= self.max_channels as usize {
            return Err(MuxError::ChannelLimitExceeded {
                max: self.max_channels,
            });
        }

        self.channels.push(Channel {
            name: name.to_string(),
            max_payload_size,
            subscriber: None,
            peer_subscribed: false,
        });
        let id = index_to_id(self.channels.len() - 1);
        debug!(channel = id, name, max_payload_size, "channel registered");
        Ok(id)
    }

    /// Identifier of a registered channel.
    pub fn resolve(&self, name: &str) -> Result<ChannelId> {
        self.position(name)
            .map(index_to_id)
            .ok_or_else(|| MuxError::UnknownChannel(name.to_string()))
    }

    /// Name of a registered channel.
    pub fn name_of(&self, id: ChannelId) -> Result<&str> {
        self.get(id)
            .map(|channel| channel.name.as_str())
            .ok_or_else(|| unknown_id(id))
    }

    /// Maximum payload size a channel was registered with.
    pub fn max_size_for(&self, id: ChannelId) -> Result<usize> {
        self.get(id)
            .map(|channel| channel.max_payload_size)
            .ok_or_else(|| unknown_id(id))
    }

    /// Install the subscriber for a channel, replacing any previous one.
    pub fn set_subscriber(&mut self, name: &str, subscriber: Subscriber) -> Result<ChannelId> {
        let index = self
            .position(name)
            .ok_or_else(|| MuxError::UnknownChannel(name.to_string()))?;
        let replaced = self.channels[index].subscriber.replace(subscriber).is_some();
        let id = index_to_id(index);
        debug!(channel = id, name, replaced, "subscriber installed");
        Ok(id)
    }

    /// Subscriber for a channel, if one is installed.
    pub fn subscriber_mut(&mut self, id: ChannelId) -> Option<&mut Subscriber> {
        let index = id_to_index(id)?;
        self.channels.get_mut(index)?.subscriber.as_mut()
    }

    /// Record that the peer asked to receive this channel.
    pub fn mark_peer_subscribed(&mut self, id: ChannelId) {
        if let Some(channel) = id_to_index(id).and_then(|index| self.channels.get_mut(index)) {
            channel.peer_subscribed = true;
        }
    }

    /// Whether the peer has asked to receive this channel.
    pub fn is_peer_subscribed(&self, name: &str) -> Result<bool> {
        self.position(name)
            .map(|index| self.channels[index].peer_subscribed)
            .ok_or_else(|| MuxError::UnknownChannel(name.to_string()))
    }

    /// Number of registered channels.
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Channel ceiling.
    pub fn max_channels(&self) -> u8 {
        self.max_channels
    }

    /// Registered channels as `(id, name, max_payload_size)`.
    pub fn iter(&self) -> impl Iterator<Item = (ChannelId, &str, usize)> + '_ {
        self.channels
            .iter()
            .enumerate()
            .map(|(index, channel)| (index_to_id(index), channel.name.as_str(), channel.max_payload_size))
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.channels.iter().position(|channel| channel.name == name)
    }

    fn get(&self, id: ChannelId) -> Option<&Channel> {
        self.channels.get(id_to_index(id)?)
    }
}

impl fmt::Debug for ChannelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelRegistry")
            .field("channels", &self.iter().collect::<Vec<_>>())
            .field("max_channels", &self.max_channels)
            .field("max_payload_size", &self.max_payload_size)
            .finish()
    }
}

// Indexes are bounded by max_channels (a u8), so the cast cannot truncate.
fn index_to_id(index: usize) -> ChannelId {
    FIRST_USER_CHANNEL + index as ChannelId
}

fn id_to_index(id: ChannelId) -> Option<usize> {
    id.checked_sub(FIRST_USER_CHANNEL).map(usize::from)
}

fn unknown_id(id: ChannelId) -> MuxError {
    MuxError::UnknownChannel(format!("#{id}"))
}
