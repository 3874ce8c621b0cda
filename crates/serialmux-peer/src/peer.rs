use serialmux_frame::{is_control, ChannelId, FrameReader, FrameWriter, CONTROL};
use serialmux_transport::Stream;
use tracing::{debug, trace};

use crate::config::MuxConfig;
use crate::control::ControlMessage;
use crate::dispatch::{Delivery, Dispatcher, SubscriberResult};
use crate::error::{MuxError, Result};
use crate::negotiation::SubscriptionTable;
use crate::registry::ChannelRegistry;
use crate::stats::{MuxStats, ProcessReport};
use crate::sync::{SyncHooks, SyncMachine, SyncState};

/// One side of a multiplexed link.
///
/// Owns the transport and all protocol state. Nothing happens between calls:
/// the application drives the peer by calling [`process`](Self::process)
/// periodically with a monotonic millisecond timestamp.
#[derive(Debug)]
pub struct MuxPeer<S> {
    stream: S,
    reader: FrameReader,
    writer: FrameWriter,
    registry: ChannelRegistry,
    subscriptions: SubscriptionTable,
    sync: SyncMachine,
    hooks: SyncHooks,
    stats: MuxStats,
    config: MuxConfig,
}

impl<S: Stream> MuxPeer<S> {
    /// Create a peer with default timing and room for `max_channels` channels.
    ///
    /// A ceiling of zero is raised to one.
    pub fn new(stream: S, max_channels: u8) -> Self {
        let config = MuxConfig::with_max_channels(max_channels.max(1));
        Self::build(stream, config)
    }

    /// Create a peer with explicit configuration.
    pub fn with_config(stream: S, config: MuxConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(stream, config))
    }

    fn build(stream: S, config: MuxConfig) -> Self {
        Self {
            stream,
            reader: FrameReader::with_config(config.frame.clone()),
            writer: FrameWriter::with_config(config.frame.clone()),
            registry: ChannelRegistry::new(config.max_channels, config.frame.max_payload_size),
            subscriptions: SubscriptionTable::new(config.max_channels),
            sync: SyncMachine::new(&config),
            hooks: SyncHooks::default(),
            stats: MuxStats::default(),
            config,
        }
    }

    /// Register a local channel that this side sends on.
    pub fn create_channel(&mut self, name: &str, max_payload_size: usize) -> Result<ChannelId> {
        self.registry.register(name, max_payload_size)
    }

    /// Install the callback for frames arriving on a local channel.
    ///
    /// The channel must already exist. A second call replaces the callback.
    pub fn subscribe_to_channel<F>(&mut self, name: &str, callback: F) -> Result<ChannelId>
    where
        F: FnMut(&[u8]) -> SubscriberResult + Send + 'static,
    {
        self.registry.set_subscriber(name, Box::new(callback))
    }

    /// Ask the peer for frames of a channel it created.
    ///
    /// The request goes out with the next heartbeat exchange and is repeated
    /// until the peer answers with a usable identifier.
    pub fn subscribe_to_remote_channel<F>(&mut self, name: &str, callback: F) -> Result<()>
    where
        F: FnMut(&[u8]) -> SubscriberResult + Send + 'static,
    {
        if !serialmux_frame::is_valid_name(name) {
            return Err(MuxError::InvalidChannelName(name.to_string()));
        }
        self.subscriptions.request(name, Box::new(callback))
    }

    /// Run `callback` each time the link becomes synchronized.
    ///
    /// Replaces any previous callback. It runs inside [`process`](Self::process)
    /// right after the heartbeat that completed synchronization.
    pub fn on_synced<F>(&mut self, callback: F)
    where
        F: FnMut() + Send + 'static,
    {
        self.hooks.set_on_synced(Box::new(callback));
    }

    /// Run `callback` each time a synchronized link times out.
    pub fn on_desynced<F>(&mut self, callback: F)
    where
        F: FnMut() + Send + 'static,
    {
        self.hooks.set_on_desynced(Box::new(callback));
    }

    /// Send a payload on a named local channel. Returns bytes written.
    pub fn send_data(&mut self, name: &str, payload: &[u8]) -> Result<usize> {
        let id = self.registry.resolve(name)?;
        self.send_on(id, payload)
    }

    /// Send a payload on a local channel identifier. Returns bytes written.
    ///
    /// Size is checked against the channel before anything is written. Sends
    /// are attempted even while unsynchronized.
    pub fn send_on(&mut self, id: ChannelId, payload: &[u8]) -> Result<usize> {
        if is_control(id) {
            return Err(MuxError::UnknownChannel(format!("#{id}")));
        }
        let max = self.registry.max_size_for(id)?;
        if payload.len() > max {
            return Err(MuxError::PayloadTooLarge {
                channel: self.registry.name_of(id)?.to_string(),
                size: payload.len(),
                max,
            });
        }
        if !self.sync.is_synced() {
            trace!(channel = id, "sending while unsynchronized");
        }

        let written = self.writer.send(&mut self.stream, id, payload)?;
        self.stats.record_write(written);
        Ok(written)
    }

    /// Drain the transport, dispatch every complete frame, then run one
    /// heartbeat tick.
    ///
    /// Never blocks. Corrupt input is skipped and counted. A transport error
    /// ends this call; state stays consistent and the next call resumes.
    pub fn process(&mut self, now: u32) -> Result<ProcessReport> {
        let mut report = ProcessReport::default();
        let outcome = self.drive(now, &mut report);
        report.sync_state = self.sync.state();
        self.stats.absorb(&report);
        outcome.map(|()| report)
    }

    fn drive(&mut self, now: u32, report: &mut ProcessReport) -> Result<()> {
        let discarded_before = self.reader.discarded_bytes();
        let filled = self.reader.fill(&mut self.stream);
        report.bytes_read = filled.as_ref().copied().unwrap_or(0);

        // Frames already buffered are handled even if this read failed.
        let drained = self.drain(now, report);
        report.bytes_discarded = self.reader.discarded_bytes() - discarded_before;
        filled?;
        drained?;

        self.tick(now, report)
    }

    fn drain(&mut self, now: u32, report: &mut ProcessReport) -> Result<()> {
        while let Some(frame) = self.reader.next_frame() {
            report.frames_received += 1;
            if is_control(frame.channel) {
                self.handle_control(now, &frame.payload)?;
                continue;
            }

            match Dispatcher::new(&mut self.registry, &mut self.subscriptions).on_frame(&frame) {
                Delivery::Delivered => report.frames_dispatched += 1,
                Delivery::Dropped => report.frames_dropped += 1,
                Delivery::Failed(failure) => report.subscriber_failures.push(failure),
            }
        }
        Ok(())
    }

    fn handle_control(&mut self, now: u32, payload: &[u8]) -> Result<()> {
        let Some(message) = ControlMessage::decode(payload) else {
            trace!(len = payload.len(), "malformed control frame dropped");
            return Ok(());
        };
        trace!(?message, "control frame");

        match message {
            ControlMessage::Sync { timestamp } => {
                let was_synced = self.sync.is_synced();
                self.sync.on_request(now);
                self.sync_changed(was_synced);
                self.send_control(&ControlMessage::SyncResponse { timestamp })?;
                self.request_pending()?;
            }
            ControlMessage::SyncResponse { timestamp } => {
                let was_synced = self.sync.is_synced();
                if self.sync.on_response(now, timestamp) {
                    self.sync_changed(was_synced);
                    self.request_pending()?;
                }
            }
            ControlMessage::Subscribe { name } => {
                let channel = match self.registry.resolve(&name) {
                    Ok(id) => {
                        debug!(channel = id, name = %name, "peer subscribed");
                        self.registry.mark_peer_subscribed(id);
                        id
                    }
                    Err(_) => {
                        debug!(name = %name, "peer subscribed to unknown channel");
                        CONTROL
                    }
                };
                self.send_control(&ControlMessage::SubscribeResponse { channel, name })?;
            }
            ControlMessage::SubscribeResponse { channel, name } => {
                self.subscriptions.resolve(channel, &name);
            }
        }
        Ok(())
    }

    fn request_pending(&mut self) -> Result<()> {
        if !self.sync.is_synced() || self.subscriptions.pending_len() == 0 {
            return Ok(());
        }
        let names: Vec<String> = self.subscriptions.pending_names().map(str::to_string).collect();
        for name in names {
            self.send_control(&ControlMessage::Subscribe { name })?;
        }
        Ok(())
    }

    fn tick(&mut self, now: u32, report: &mut ProcessReport) -> Result<()> {
        let was_synced = self.sync.is_synced();
        let due = self.sync.poll(now);
        self.sync_changed(was_synced);

        if let Some(timestamp) = due {
            if self.send_control(&ControlMessage::Sync { timestamp })? {
                self.sync.heartbeat_sent(now);
                self.stats.heartbeats_sent += 1;
                report.heartbeat_sent = true;
            }
        }
        Ok(())
    }

    fn sync_changed(&mut self, was_synced: bool) {
        match (was_synced, self.sync.is_synced()) {
            (false, true) => self.hooks.notify(SyncState::Synchronized),
            (true, false) => {
                self.stats.sync_losses += 1;
                self.hooks.notify(SyncState::Unsynchronized);
            }
            _ => {}
        }
    }

    /// Returns true if the whole frame was accepted by the transport.
    fn send_control(&mut self, message: &ControlMessage) -> Result<bool> {
        let written = self.writer.send(&mut self.stream, CONTROL, &message.encode())?;
        self.stats.record_write(written);
        Ok(written == self.writer.last_frame_len())
    }

    pub fn is_synced(&self) -> bool {
        self.sync.is_synced()
    }

    pub fn sync_state(&self) -> SyncState {
        self.sync.state()
    }

    /// Identifier of a local channel.
    pub fn channel_id(&self, name: &str) -> Result<ChannelId> {
        self.registry.resolve(name)
    }

    /// Number of local channels.
    pub fn channel_count(&self) -> usize {
        self.registry.len()
    }

    /// Number of remote channels bound through negotiation.
    pub fn remote_channel_count(&self) -> usize {
        self.subscriptions.route_len()
    }

    /// Remote subscriptions still waiting for an identifier.
    pub fn pending_subscriptions(&self) -> usize {
        self.subscriptions.pending_len()
    }

    /// Whether a remote subscription has been bound.
    pub fn is_remote_bound(&self, name: &str) -> bool {
        self.subscriptions.is_bound(name)
    }

    /// Whether the peer has asked to receive a local channel.
    pub fn is_peer_subscribed(&self, name: &str) -> Result<bool> {
        self.registry.is_peer_subscribed(name)
    }

    pub fn registry(&self) -> &ChannelRegistry {
        &self.registry
    }

    pub fn stats(&self) -> &MuxStats {
        &self.stats
    }

    pub fn config(&self) -> &MuxConfig {
        &self.config
    }

    pub fn stream(&self) -> &S {
        &self.stream
    }

    pub fn stream_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    pub fn into_stream(self) -> S {
        self.stream
    }
}
