use serde::Serialize;

use crate::dispatch::SubscriberFailure;
use crate::sync::SyncState;

/// What a single [`MuxPeer::process`](crate::MuxPeer::process) call did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessReport {
    /// Bytes pulled from the transport.
    pub bytes_read: usize,
    /// Bytes dropped while resynchronizing after corruption.
    pub bytes_discarded: u64,
    /// Valid frames decoded, control frames included.
    pub frames_received: usize,
    /// Data frames handed to a subscriber that returned successfully.
    pub frames_dispatched: usize,
    /// Data frames with no subscriber.
    pub frames_dropped: usize,
    /// Whether a heartbeat was written during this call.
    pub heartbeat_sent: bool,
    /// Link state after the call.
    pub sync_state: SyncState,
    /// Subscribers that failed during this call.
    pub subscriber_failures: Vec<SubscriberFailure>,
}

/// Cumulative counters over the lifetime of a peer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MuxStats {
    pub bytes_read: u64,
    pub bytes_written: u64,
    pub bytes_discarded: u64,
    pub frames_received: u64,
    pub frames_sent: u64,
    pub frames_dispatched: u64,
    pub frames_dropped: u64,
    pub heartbeats_sent: u64,
    pub subscriber_failures: u64,
    pub sync_losses: u64,
}

impl MuxStats {
    pub(crate) fn absorb(&mut self, report: &ProcessReport) {
        self.bytes_read += report.bytes_read as u64;
        self.bytes_discarded += report.bytes_discarded;
        self.frames_received += report.frames_received as u64;
        self.frames_dispatched += report.frames_dispatched as u64;
        self.frames_dropped += report.frames_dropped as u64;
        self.subscriber_failures += report.subscriber_failures.len() as u64;
    }

    pub(crate) fn record_write(&mut self, written: usize) {
        self.frames_sent += 1;
        self.bytes_written += written as u64;
    }
}
