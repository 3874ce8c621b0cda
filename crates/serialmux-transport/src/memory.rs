use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::{Buf, BytesMut};

use crate::error::Result;
use crate::traits::Stream;

type SharedBuffer = Arc<Mutex<BytesMut>>;

/// In-memory [`Stream`] backed by shared byte buffers.
///
/// Used to drive the protocol engine without real I/O:
/// - [`MemoryStream::new`] gives a standalone end whose input is fed with
///   [`push_inbound`](MemoryStream::push_inbound) and whose output is collected
///   with [`take_outbound`](MemoryStream::take_outbound).
/// - [`MemoryStream::loopback`] reads back everything it writes.
/// - [`MemoryStream::pair`] cross-links two ends, like a null-modem cable.
///
/// Clones share the same buffers, so a test can keep a handle while the engine
/// owns the stream.
#[derive(Clone, Default)]
pub struct MemoryStream {
    rx: SharedBuffer,
    tx: SharedBuffer,
    write_limit: Option<usize>,
    fail_writes: bool,
}

impl MemoryStream {
    /// Create a standalone stream with independent input and output buffers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a stream whose writes become its own input.
    pub fn loopback() -> Self {
        let shared = SharedBuffer::default();
        Self {
            rx: Arc::clone(&shared),
            tx: shared,
            ..Self::default()
        }
    }

    /// Create two connected ends: bytes written on one are readable on the other.
    pub fn pair() -> (Self, Self) {
        let a_to_b = SharedBuffer::default();
        let b_to_a = SharedBuffer::default();
        let left = Self {
            rx: Arc::clone(&b_to_a),
            tx: Arc::clone(&a_to_b),
            ..Self::default()
        };
        let right = Self {
            rx: a_to_b,
            tx: b_to_a,
            ..Self::default()
        };
        (left, right)
    }

    /// Append bytes to the input side, as if the remote end had sent them.
    pub fn push_inbound(&self, data: &[u8]) {
        lock(&self.rx).extend_from_slice(data);
    }

    /// Drain everything written so far.
    pub fn take_outbound(&self) -> Vec<u8> {
        let mut tx = lock(&self.tx);
        let out = tx.to_vec();
        tx.clear();
        out
    }

    /// Number of bytes written and not yet taken.
    pub fn outbound_len(&self) -> usize {
        lock(&self.tx).len()
    }

    /// Number of bytes waiting to be read.
    pub fn inbound_len(&self) -> usize {
        lock(&self.rx).len()
    }

    /// Cap every write at `limit` bytes to simulate a congested link.
    pub fn set_write_limit(&mut self, limit: Option<usize>) {
        self.write_limit = limit;
    }

    /// Make every subsequent write fail with a broken-pipe error.
    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }
}

impl Stream for MemoryStream {
    fn available(&mut self) -> Result<usize> {
        Ok(lock(&self.rx).len())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut rx = lock(&self.rx);
        let n = rx.len().min(buf.len());
        buf[..n].copy_from_slice(&rx[..n]);
        rx.advance(n);
        Ok(n)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        if self.fail_writes {
            return Err(std::io::Error::from(std::io::ErrorKind::BrokenPipe).into());
        }
        let n = self.write_limit.map_or(data.len(), |limit| limit.min(data.len()));
        lock(&self.tx).extend_from_slice(&data[..n]);
        Ok(n)
    }
}

impl std::fmt::Debug for MemoryStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStream")
            .field("inbound", &self.inbound_len())
            .field("outbound", &self.outbound_len())
            .field("write_limit", &self.write_limit)
            .field("fail_writes", &self.fail_writes)
            .finish()
    }
}

fn lock(buf: &Mutex<BytesMut>) -> MutexGuard<'_, BytesMut> {
    buf.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;

    #[test]
    fn standalone_stream_separates_directions() {
        let mut stream = MemoryStream::new();
        stream.push_inbound(b"abc");

        assert_eq!(stream.available().unwrap(), 3);
        assert_eq!(stream.write(b"xyz").unwrap(), 3);
        assert_eq!(stream.take_outbound(), b"xyz");
        assert_eq!(stream.available().unwrap(), 3);
    }

    #[test]
    fn read_returns_at_most_available() {
        let mut stream = MemoryStream::new();
        stream.push_inbound(b"hello");

        let mut buf = [0u8; 3];
        assert_eq!(stream.read(&mut buf).unwrap(), 3);
        assert_eq!(&buf, b"hel");

        let mut buf = [0u8; 8];
        assert_eq!(stream.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"lo");

        assert_eq!(stream.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn loopback_reads_back_writes() {
        let mut stream = MemoryStream::loopback();
        stream.write(b"ping").unwrap();

        let mut buf = [0u8; 4];
        assert_eq!(stream.available().unwrap(), 4);
        stream.read(&mut buf).unwrap();
        assert_eq!(&buf, b"ping");
    }

    #[test]
    fn pair_is_cross_linked() {
        let (mut left, mut right) = MemoryStream::pair();
        left.write(b"to-right").unwrap();
        right.write(b"to-left").unwrap();

        let mut buf = [0u8; 16];
        let n = right.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"to-right");
        let n = left.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"to-left");
    }

    #[test]
    fn clones_share_buffers() {
        let handle = MemoryStream::new();
        let mut owned = handle.clone();
        handle.push_inbound(b"x");

        assert_eq!(owned.available().unwrap(), 1);
        owned.write(b"y").unwrap();
        assert_eq!(handle.take_outbound(), b"y");
    }

    #[test]
    fn write_limit_short_writes() {
        let mut stream = MemoryStream::new();
        stream.set_write_limit(Some(2));

        assert_eq!(stream.write(b"abcd").unwrap(), 2);
        assert_eq!(stream.take_outbound(), b"ab");
    }

    #[test]
    fn injected_write_failure() {
        let mut stream = MemoryStream::new();
        stream.set_fail_writes(true);

        let err = stream.write(b"abcd").unwrap_err();
        assert!(matches!(err, TransportError::Io(e) if e.kind() == std::io::ErrorKind::BrokenPipe));
        assert_eq!(stream.outbound_len(), 0);
    }
}
