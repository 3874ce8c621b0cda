//! Protocol engine for one side of a serialmux link.
//!
//! [`MuxPeer`] owns a transport and is driven entirely by the caller through
//! [`MuxPeer::process`]: each call drains the bytes the transport has right
//! now, dispatches every complete frame to its channel subscriber, and runs
//! one heartbeat tick. There are no threads and no timers inside.

pub mod config;
pub mod control;
pub mod dispatch;
pub mod error;
pub mod negotiation;
pub mod peer;
pub mod registry;
pub mod stats;
pub mod sync;

pub use config::{
    MuxConfig, DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_MAX_CHANNELS, DEFAULT_SYNC_TIMEOUT,
    DEFAULT_UNSYNCED_HEARTBEAT_INTERVAL,
};
pub use control::{
    ControlMessage, CONTROL_PAYLOAD_LEN, CONTROL_SCRB, CONTROL_SCRB_RSP, CONTROL_SYNC,
    CONTROL_SYNC_RSP,
};
pub use dispatch::{
    Delivery, Dispatcher, Subscriber, SubscriberError, SubscriberFailure, SubscriberResult,
};
pub use error::{MuxError, Result};
pub use negotiation::SubscriptionTable;
pub use peer::MuxPeer;
pub use registry::ChannelRegistry;
pub use stats::{MuxStats, ProcessReport};
pub use sync::{SyncCallback, SyncHooks, SyncMachine, SyncState};
