//! Subscriptions to channels created on the remote side.
//!
//! A peer cannot know the identifier its counterpart assigned to a channel,
//! so it asks by name (`SCRB`) and binds the identifier that comes back
//! (`SCRB_RSP`) to the local callback.

use std::collections::HashMap;
use std::fmt;

use serialmux_frame::ChannelId;
use tracing::debug;

use crate::dispatch::Subscriber;
use crate::error::{MuxError, Result};

struct Route {
    name: String,
    subscriber: Subscriber,
}

/// Pending and bound remote subscriptions.
pub struct SubscriptionTable {
    pending: Vec<(String, Subscriber)>,
    routes: HashMap<ChannelId, Route>,
    limit: u8,
}

impl SubscriptionTable {
    /// Create a table holding at most `limit` subscriptions, pending or bound.
    pub fn new(limit: u8) -> Self {
        Self {
            pending: Vec::new(),
            routes: HashMap::new(),
            limit,
        }
    }

    /// Queue a subscription to the remote channel called `name`.
    ///
    /// Subscribing again to a pending or bound name replaces its callback.
    pub fn request(&mut self, name: &str, subscriber: Subscriber) -> Result<()> {
        if let Some(route) = self.routes.values_mut().find(|route| route.name == name) {
            route.subscriber = subscriber;
            return Ok(());
        }
        if let Some(entry) = self.pending.iter_mut().find(|(pending, _)| pending == name) {
            entry.1 = subscriber;
            return Ok(());
        }
        if self.len() >= self.limit as usize {
            return Err(MuxError::ChannelLimitExceeded { max: self.limit });
        }

        debug!(name, "remote subscription queued");
        self.pending.push((name.to_string(), subscriber));
        Ok(())
    }

    /// Names still waiting for a usable answer.
    pub fn pending_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.pending.iter().map(|(name, _)| name.as_str())
    }

    /// Apply a `SCRB_RSP`. Returns true if a pending subscription was bound.
    ///
    /// Identifier 0 means the peer does not know the channel yet; the
    /// subscription stays pending and is asked for again.
    pub fn resolve(&mut self, channel: ChannelId, name: &str) -> bool {
        if channel == 0 {
            debug!(name, "peer has no such channel yet");
            return false;
        }
        let Some(index) = self.pending.iter().position(|(pending, _)| pending == name) else {
            return false;
        };

        let (name, subscriber) = self.pending.remove(index);
        debug!(channel, name = %name, "remote subscription bound");
        if let Some(previous) = self.routes.insert(channel, Route { name, subscriber }) {
            debug!(channel, previous = %previous.name, "remote route replaced");
        }
        true
    }

    /// Callback bound to a remote identifier.
    pub fn route_mut(&mut self, channel: ChannelId) -> Option<&mut Subscriber> {
        self.routes
            .get_mut(&channel)
            .map(|route| &mut route.subscriber)
    }

    /// Whether `name` has been bound to a remote identifier.
    pub fn is_bound(&self, name: &str) -> bool {
        self.routes.values().any(|route| route.name == name)
    }

    /// Number of pending subscriptions.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Number of bound remote routes.
    pub fn route_len(&self) -> usize {
        self.routes.len()
    }

    pub fn len(&self) -> usize {
        self.pending.len() + self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for SubscriptionTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let routes: HashMap<_, _> = self
            .routes
            .iter()
            .map(|(id, route)| (*id, route.name.as_str()))
            .collect();
        f.debug_struct("SubscriptionTable")
            .field("pending", &self.pending_names().collect::<Vec<_>>())
            .field("routes", &routes)
            .field("limit", &self.limit)
            .finish()
    }
}
