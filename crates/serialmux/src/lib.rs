//! Multiplexed, checksummed channels over a single serial byte stream.
//!
//! Two peers share one link (a UART, a USB CDC port, a TCP bridge) and
//! exchange independent named channels over it. Frames are self-delimiting
//! and checksummed, so a receiver that joins mid-stream or loses bytes
//! resynchronizes on its own. A heartbeat on the reserved control channel
//! tracks whether the other side is alive.
//!
//! # Crate Structure
//!
//! - [`transport`]: non-blocking byte stream contract (in-memory, TCP)
//! - [`frame`]: wire codec, receive buffer with resync, frame writer
//! - [`peer`]: channel registry, heartbeat sync, dispatch, the [`peer::MuxPeer`] façade
//!
//! # Example
//!
//! ```
//! use serialmux::peer::MuxPeer;
//! use serialmux::transport::MemoryStream;
//!
//! let (left, right) = MemoryStream::pair();
//! let mut sensor = MuxPeer::new(left, 4);
//! let mut host = MuxPeer::new(right, 4);
//!
//! sensor.create_channel("TEMP", 8).unwrap();
//! host.subscribe_to_remote_channel("TEMP", |payload: &[u8]| {
//!     println!("temperature: {}", String::from_utf8_lossy(payload));
//!     Ok(())
//! })
//! .unwrap();
//!
//! for now in 0..4 {
//!     sensor.process(now).unwrap();
//!     host.process(now).unwrap();
//! }
//! assert!(sensor.is_peer_subscribed("TEMP").unwrap());
//! sensor.send_data("TEMP", b"21.5").unwrap();
//! ```

/// Re-export transport types.
pub mod transport {
    pub use serialmux_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use serialmux_frame::*;
}

/// Re-export peer types (requires `peer` feature).
#[cfg(feature = "peer")]
pub mod peer {
    pub use serialmux_peer::*;
}
