//! Heartbeat synchronization.
//!
//! Each side stamps its `SYNC` heartbeats with its own millisecond clock and
//! the other side echoes the stamp back in `SYNC_RSP`. Any inbound heartbeat
//! proves the link is alive. Clocks are never compared across peers.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::MuxConfig;
use crate::dispatch::panic_message;

/// Callback run when the link changes [`SyncState`].
pub type SyncCallback = Box<dyn FnMut() + Send>;

/// Link state as seen from this side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    #[default]
    Unsynchronized,
    Synchronized,
}

/// Heartbeat scheduling and timeout tracking.
///
/// All timestamps are wrapping `u32` milliseconds from a monotonic clock
/// owned by the caller.
#[derive(Debug, Clone)]
pub struct SyncMachine {
    state: SyncState,
    last_sync_sent_at: Option<u32>,
    last_sync_received_at: Option<u32>,
    heartbeat_ms: u32,
    unsynced_heartbeat_ms: u32,
    timeout_ms: u32,
}

impl SyncMachine {
    pub fn new(config: &MuxConfig) -> Self {
        Self {
            state: SyncState::Unsynchronized,
            last_sync_sent_at: None,
            last_sync_received_at: None,
            heartbeat_ms: config.heartbeat_ms(),
            unsynced_heartbeat_ms: config.unsynced_heartbeat_ms(),
            timeout_ms: config.sync_timeout_ms(),
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn is_synced(&self) -> bool {
        self.state == SyncState::Synchronized
    }

    pub fn last_sync_sent_at(&self) -> Option<u32> {
        self.last_sync_sent_at
    }

    pub fn last_sync_received_at(&self) -> Option<u32> {
        self.last_sync_received_at
    }

    /// Run one tick.
    ///
    /// Applies the timeout first, then returns the timestamp to send in a
    /// `SYNC` if a heartbeat is due. The caller reports a completed write with
    /// [`heartbeat_sent`](Self::heartbeat_sent); until then the heartbeat
    /// stays due.
    pub fn poll(&mut self, now: u32) -> Option<u32> {
        self.check_timeout(now);

        let period = if self.is_synced() {
            self.heartbeat_ms
        } else {
            self.unsynced_heartbeat_ms
        };
        match self.last_sync_sent_at {
            Some(sent) if now.wrapping_sub(sent) < period => None,
            _ => Some(now),
        }
    }

    /// Record that a `SYNC` stamped `now` was fully written.
    pub fn heartbeat_sent(&mut self, now: u32) {
        self.last_sync_sent_at = Some(now);
    }

    /// A `SYNC` arrived from the peer.
    pub fn on_request(&mut self, now: u32) {
        self.mark_received(now);
    }

    /// A `SYNC_RSP` arrived. Returns false if it does not answer the most
    /// recent heartbeat and was ignored.
    pub fn on_response(&mut self, now: u32, echoed: u32) -> bool {
        if self.last_sync_sent_at != Some(echoed) {
            debug!(
                echoed,
                expected = ?self.last_sync_sent_at,
                "stale heartbeat response ignored"
            );
            return false;
        }
        self.mark_received(now);
        true
    }

    /// Falls back to unsynchronized after `sync_timeout` without a heartbeat.
    /// Returns true on that transition.
    pub fn check_timeout(&mut self, now: u32) -> bool {
        if !self.is_synced() {
            return false;
        }
        let expired = self
            .last_sync_received_at
            .is_none_or(|received| now.wrapping_sub(received) >= self.timeout_ms);
        if expired {
            debug!(
                last_received = ?self.last_sync_received_at,
                now,
                "heartbeat timeout; peer unsynchronized"
            );
            self.state = SyncState::Unsynchronized;
        }
        expired
    }

    fn mark_received(&mut self, now: u32) {
        self.last_sync_received_at = Some(now);
        if self.state != SyncState::Synchronized {
            debug!(now, "peer synchronized");
            self.state = SyncState::Synchronized;
        }
    }
}

/// Application callbacks for link state transitions.
///
/// Each runs once per transition, inside the `process` call that observed it.
/// A panicking callback is logged and does not interrupt processing.
#[derive(Default)]
pub struct SyncHooks {
    on_synced: Option<SyncCallback>,
    on_desynced: Option<SyncCallback>,
}

impl SyncHooks {
    pub fn set_on_synced(&mut self, callback: SyncCallback) {
        self.on_synced = Some(callback);
    }

    pub fn set_on_desynced(&mut self, callback: SyncCallback) {
        self.on_desynced = Some(callback);
    }

    /// Run the callback for entering `state`, if one is registered.
    pub fn notify(&mut self, state: SyncState) {
        let callback = match state {
            SyncState::Synchronized => self.on_synced.as_mut(),
            SyncState::Unsynchronized => self.on_desynced.as_mut(),
        };
        let Some(callback) = callback else {
            return;
        };
        if let Err(panic) = catch_unwind(AssertUnwindSafe(|| callback())) {
            warn!(
                ?state,
                reason = %panic_message(panic.as_ref()),
                "sync callback panicked"
            );
        }
    }
}

impl fmt::Debug for SyncHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncHooks")
            .field("on_synced", &self.on_synced.is_some())
            .field("on_desynced", &self.on_desynced.is_some())
            .finish()
    }
}
