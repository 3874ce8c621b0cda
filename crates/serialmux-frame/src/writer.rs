use bytes::BytesMut;
use serialmux_transport::Stream;
use tracing::{trace, warn};

use crate::channel::ChannelId;
use crate::codec::{encode_frame, FrameConfig, MAX_FRAME_SIZE};
use crate::error::Result;

/// Encodes frames and hands them to a non-blocking stream.
///
/// The encode buffer is reused across sends. Each frame gets exactly one write
/// attempt; the byte count the transport accepted is returned so callers can
/// spot short writes.
#[derive(Debug)]
pub struct FrameWriter {
    buf: BytesMut,
    config: FrameConfig,
}

impl FrameWriter {
    /// Create a new frame writer with default configuration.
    pub fn new() -> Self {
        Self::with_config(FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(config: FrameConfig) -> Self {
        Self {
            buf: BytesMut::with_capacity(MAX_FRAME_SIZE),
            config,
        }
    }

    /// Encode and send a payload on a channel.
    ///
    /// Validation happens before anything touches the stream, so a rejected
    /// payload never leaves a partial frame on the wire.
    pub fn send<S: Stream + ?Sized>(
        &mut self,
        stream: &mut S,
        channel: ChannelId,
        payload: &[u8],
    ) -> Result<usize> {
        self.buf.clear();
        encode_frame(channel, payload, self.config.max_payload_size, &mut self.buf)?;

        let written = stream.write(&self.buf)?;
        if written < self.buf.len() {
            warn!(
                channel,
                written,
                frame_len = self.buf.len(),
                "short write; frame truncated on the wire"
            );
        } else {
            trace!(channel, len = payload.len(), "frame sent");
        }
        Ok(written)
    }

    /// Wire size of the most recently encoded frame.
    pub fn last_frame_len(&self) -> usize {
        self.buf.len()
    }
}

impl Default for FrameWriter {
    fn default() -> Self {
        Self::new()
    }
}
