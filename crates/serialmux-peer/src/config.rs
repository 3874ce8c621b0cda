use std::time::Duration;

use serialmux_frame::{FrameConfig, MAX_PAYLOAD};

use crate::control::CONTROL_PAYLOAD_LEN;
use crate::error::{MuxError, Result};

/// Default ceiling on user channels.
pub const DEFAULT_MAX_CHANNELS: u8 = 10;
/// Heartbeat period while the peer is synchronized.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(5000);
/// Heartbeat period while no peer has answered yet.
pub const DEFAULT_UNSYNCED_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(1000);
/// Silence after which a synchronized peer is considered lost.
pub const DEFAULT_SYNC_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Configuration for a [`MuxPeer`](crate::MuxPeer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MuxConfig {
    /// Maximum number of user channels this side may register.
    pub max_channels: u8,
    /// Heartbeat period while synchronized.
    pub heartbeat_interval: Duration,
    /// Heartbeat period while unsynchronized.
    pub unsynced_heartbeat_interval: Duration,
    /// Time without an inbound heartbeat before falling back to unsynchronized.
    pub sync_timeout: Duration,
    /// Framing limits shared by the reader and writer.
    pub frame: FrameConfig,
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self {
            max_channels: DEFAULT_MAX_CHANNELS,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            unsynced_heartbeat_interval: DEFAULT_UNSYNCED_HEARTBEAT_INTERVAL,
            sync_timeout: DEFAULT_SYNC_TIMEOUT,
            frame: FrameConfig::default(),
        }
    }
}

impl MuxConfig {
    /// Default configuration with a different channel ceiling.
    pub fn with_max_channels(max_channels: u8) -> Self {
        Self {
            max_channels,
            ..Self::default()
        }
    }

    /// Check the configuration for values the engine cannot honor.
    pub fn validate(&self) -> Result<()> {
        if self.max_channels == 0 {
            return Err(MuxError::InvalidConfig(
                "max_channels must be at least 1".to_string(),
            ));
        }

        let max_payload = self.frame.max_payload_size;
        if !(CONTROL_PAYLOAD_LEN..=MAX_PAYLOAD).contains(&max_payload) {
            return Err(MuxError::InvalidConfig(format!(
                "frame max_payload_size must be within {CONTROL_PAYLOAD_LEN}..={MAX_PAYLOAD}, got {max_payload}"
            )));
        }

        let heartbeat = millis("heartbeat_interval", self.heartbeat_interval)?;
        let unsynced = millis(
            "unsynced_heartbeat_interval",
            self.unsynced_heartbeat_interval,
        )?;
        let timeout = millis("sync_timeout", self.sync_timeout)?;
        if heartbeat == 0 || unsynced == 0 {
            return Err(MuxError::InvalidConfig(
                "heartbeat intervals must be at least 1ms".to_string(),
            ));
        }
        if timeout <= heartbeat {
            return Err(MuxError::InvalidConfig(format!(
                "sync_timeout ({timeout}ms) must exceed heartbeat_interval ({heartbeat}ms)"
            )));
        }

        Ok(())
    }

    pub(crate) fn heartbeat_ms(&self) -> u32 {
        clamp_ms(self.heartbeat_interval)
    }

    pub(crate) fn unsynced_heartbeat_ms(&self) -> u32 {
        clamp_ms(self.unsynced_heartbeat_interval)
    }

    pub(crate) fn sync_timeout_ms(&self) -> u32 {
        clamp_ms(self.sync_timeout)
    }
}

// Timestamps are wrapping u32 milliseconds, so every period must fit well
// inside half the clock range.
const MAX_PERIOD_MS: u128 = (u32::MAX / 2) as u128;

fn millis(field: &str, value: Duration) -> Result<u32> {
    let ms = value.as_millis();
    if ms > MAX_PERIOD_MS {
        return Err(MuxError::InvalidConfig(format!(
            "{field} ({ms}ms) exceeds {MAX_PERIOD_MS}ms"
        )));
    }
    Ok(ms as u32)
}

fn clamp_ms(value: Duration) -> u32 {
    value.as_millis().min(MAX_PERIOD_MS) as u32
}
