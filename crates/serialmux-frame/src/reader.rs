use bytes::{Buf, BytesMut};
use serialmux_transport::Stream;
use tracing::{debug, trace};

use crate::codec::{try_decode, Decoded, Frame, FrameConfig, MAX_FRAME_SIZE};
use crate::error::Result;

const INITIAL_BUFFER_CAPACITY: usize = 2 * MAX_FRAME_SIZE;

/// Receive buffer that turns a non-blocking byte stream into validated frames.
///
/// Bytes are only pulled in by [`fill`](FrameReader::fill), which reads exactly
/// what the stream reports as available. [`next_frame`](FrameReader::next_frame)
/// then yields complete frames, discarding one byte at a time when the head of
/// the buffer is corrupt.
#[derive(Debug)]
pub struct FrameReader {
    buf: BytesMut,
    config: FrameConfig,
    discarded: u64,
    stalled_ticks: u32,
}

impl FrameReader {
    /// Create a new frame reader with default configuration.
    pub fn new() -> Self {
        Self::with_config(FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(config: FrameConfig) -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
            discarded: 0,
            stalled_ticks: 0,
        }
    }

    /// Pull every byte the stream currently has into the receive buffer.
    ///
    /// Never waits. Call once per tick; a tick that brings no new bytes while
    /// the buffer head is a partial frame counts toward the stall limit. Frames
    /// left undrained by the caller are complete and never count.
    pub fn fill<S: Stream + ?Sized>(&mut self, stream: &mut S) -> Result<usize> {
        let available = stream.available()?;
        let read = if available == 0 {
            0
        } else {
            let start = self.buf.len();
            self.buf.resize(start + available, 0);
            match stream.read(&mut self.buf[start..]) {
                Ok(n) => {
                    self.buf.truncate(start + n);
                    n
                }
                Err(err) => {
                    self.buf.truncate(start);
                    return Err(err.into());
                }
            }
        };

        if read == 0 && self.head_is_incomplete() {
            self.note_stall();
        } else {
            self.stalled_ticks = 0;
        }

        Ok(read)
    }

    /// Feed bytes directly, bypassing a stream.
    pub fn extend_from_slice(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
        self.stalled_ticks = 0;
    }

    /// Decode the next complete frame from the buffer.
    ///
    /// Returns `None` once the head of the buffer is an incomplete frame.
    pub fn next_frame(&mut self) -> Option<Frame> {
        loop {
            match try_decode(&self.buf, self.config.max_payload_size) {
                Decoded::Incomplete => return None,
                Decoded::Corrupt => {
                    trace!(byte = self.buf[0], "discarding corrupt byte");
                    self.discard_one();
                }
                Decoded::Frame { frame, len } => {
                    self.buf.advance(len);
                    return Some(frame);
                }
            }
        }
    }

    /// Bytes currently buffered and not yet resolved into a frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Total bytes dropped during resynchronization.
    pub fn discarded_bytes(&self) -> u64 {
        self.discarded
    }

    fn head_is_incomplete(&self) -> bool {
        !self.buf.is_empty()
            && matches!(
                try_decode(&self.buf, self.config.max_payload_size),
                Decoded::Incomplete
            )
    }

    fn note_stall(&mut self) {
        if self.config.stall_limit == 0 {
            return;
        }
        self.stalled_ticks += 1;
        if self.stalled_ticks >= self.config.stall_limit {
            debug!(
                buffered = self.buf.len(),
                ticks = self.stalled_ticks,
                "partial frame stalled; dropping head byte"
            );
            self.discard_one();
            self.stalled_ticks = 0;
        }
    }

    fn discard_one(&mut self) {
        if !self.buf.is_empty() {
            self.buf.advance(1);
            self.discarded += 1;
        }
    }
}

impl Default for FrameReader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;
    use serialmux_transport::{MemoryStream, TransportError};

    use super::*;
    use crate::codec::{encode_frame, MAX_PAYLOAD};
    use crate::error::FrameError;

    fn wire(frames: &[(u8, &[u8])]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        for (channel, payload) in frames {
            encode_frame(*channel, payload, MAX_PAYLOAD, &mut buf).unwrap();
        }
        buf.to_vec()
    }

    fn drain(reader: &mut FrameReader) -> Vec<Frame> {
        std::iter::from_fn(|| reader.next_frame()).collect()
    }

    #[test]
    fn read_single_frame() {
        let mut stream = MemoryStream::new();
        stream.push_inbound(&wire(&[(1, b"hello")]));

        let mut reader = FrameReader::new();
        assert_eq!(reader.fill(&mut stream).unwrap(), 8);
        let frame = reader.next_frame().unwrap();

        assert_eq!(frame.channel, 1);
        assert_eq!(frame.payload.as_ref(), b"hello");
        assert!(reader.next_frame().is_none());
        assert_eq!(reader.buffered(), 0);
    }

    #[test]
    fn read_multiple_frames() {
        let mut stream = MemoryStream::new();
        stream.push_inbound(&wire(&[(1, b"one"), (2, b"two"), (3, b"three")]));

        let mut reader = FrameReader::new();
        reader.fill(&mut stream).unwrap();
        let frames = drain(&mut reader);

        assert_eq!(frames.len(), 3);
        assert_eq!((frames[0].channel, frames[0].payload.as_ref()), (1, b"one".as_ref()));
        assert_eq!((frames[1].channel, frames[1].payload.as_ref()), (2, b"two".as_ref()));
        assert_eq!(
            (frames[2].channel, frames[2].payload.as_ref()),
            (3, b"three".as_ref())
        );
    }

    #[test]
    fn partial_frame_across_fills() {
        let bytes = wire(&[(4, b"slow")]);
        let mut stream = MemoryStream::new();
        let mut reader = FrameReader::new();

        stream.push_inbound(&bytes[..3]);
        reader.fill(&mut stream).unwrap();
        assert!(reader.next_frame().is_none());
        assert_eq!(reader.buffered(), 3);

        stream.push_inbound(&bytes[3..]);
        reader.fill(&mut stream).unwrap();
        let frame = reader.next_frame().unwrap();
        assert_eq!(frame.payload.as_ref(), b"slow");
        assert_eq!(reader.discarded_bytes(), 0);
    }

    #[test]
    fn byte_by_byte_delivery() {
        let bytes = wire(&[(6, b"trickle")]);
        let mut stream = MemoryStream::new();
        let mut reader = FrameReader::new();
        let mut frames = Vec::new();

        for byte in &bytes {
            stream.push_inbound(&[*byte]);
            reader.fill(&mut stream).unwrap();
            frames.extend(drain(&mut reader));
        }

        assert_eq!(frames, vec![Frame::new(6, &b"trickle"[..])]);
    }

    #[test]
    fn resync_after_any_leading_garbage_byte() {
        let payload: &'static [u8; 4] = &[0x12, 0x34, 0x56, 0x78];
        let valid = wire(&[(1, payload)]);
        let config = FrameConfig {
            stall_limit: 1,
            ..FrameConfig::default()
        };

        let mut lost = Vec::new();
        for garbage in 0..=u8::MAX {
            let mut reader = FrameReader::with_config(config.clone());
            let mut stream = MemoryStream::new();
            stream.push_inbound(&[garbage]);
            stream.push_inbound(&valid);

            let mut frames = Vec::new();
            for _ in 0..16 {
                reader.fill(&mut stream).unwrap();
                frames.extend(drain(&mut reader));
            }

            if frames.contains(&Frame::new(1, &payload[..])) {
                assert_eq!(frames.len(), 1, "garbage {garbage:#04x}");
                assert_eq!(reader.discarded_bytes(), 1);
            } else {
                lost.push(garbage);
            }
        }

        // 0x0D + 1 + 4 == 0x12: the garbage byte and the real header form a
        // frame with a valid checksum, swallowing the start of the real one.
        assert_eq!(lost, vec![0x0D]);
    }

    #[test]
    fn undrained_frames_do_not_count_as_stalls() {
        let config = FrameConfig {
            stall_limit: 1,
            ..FrameConfig::default()
        };
        let mut reader = FrameReader::with_config(config);
        let mut stream = MemoryStream::new();
        stream.push_inbound(&wire(&[(1, b"first"), (2, b"second")]));
        reader.fill(&mut stream).unwrap();

        for _ in 0..10 {
            reader.fill(&mut stream).unwrap();
        }
        assert_eq!(reader.discarded_bytes(), 0);
        assert_eq!(
            drain(&mut reader),
            vec![Frame::new(1, &b"first"[..]), Frame::new(2, &b"second"[..])]
        );
    }

    #[test]
    fn corrupted_frame_recovers_within_stall_bound() {
        let mut bad = wire(&[(2, b"bad!")]);
        let last = bad.len() - 1;
        bad[last] ^= 0xFF;
        let mut bytes = bad.clone();
        bytes.extend(wire(&[(3, b"good")]));

        let config = FrameConfig {
            stall_limit: 1,
            ..FrameConfig::default()
        };
        let mut reader = FrameReader::with_config(config);
        let mut stream = MemoryStream::new();
        stream.push_inbound(&bytes);

        // Payload bytes of the broken frame read as huge lengths, so recovery
        // needs idle ticks to walk past them.
        let mut frames = Vec::new();
        for _ in 0..16 {
            reader.fill(&mut stream).unwrap();
            frames.extend(drain(&mut reader));
        }

        assert_eq!(frames, vec![Frame::new(3, &b"good"[..])]);
        assert_eq!(reader.discarded_bytes(), bad.len() as u64);
        assert_eq!(reader.buffered(), 0);
    }

    #[test]
    fn stalled_partial_frame_is_abandoned() {
        let config = FrameConfig {
            stall_limit: 3,
            ..FrameConfig::default()
        };
        let mut reader = FrameReader::with_config(config);
        let mut stream = MemoryStream::new();

        // Header claims 200 bytes that never arrive.
        stream.push_inbound(&[0x05, 200, 0x01]);
        reader.fill(&mut stream).unwrap();
        assert!(reader.next_frame().is_none());

        reader.fill(&mut stream).unwrap();
        reader.fill(&mut stream).unwrap();
        assert_eq!(reader.discarded_bytes(), 0);
        reader.fill(&mut stream).unwrap();
        assert_eq!(reader.discarded_bytes(), 1);
        assert_eq!(reader.buffered(), 2);
    }

    #[test]
    fn stall_limit_zero_never_abandons() {
        let config = FrameConfig {
            stall_limit: 0,
            ..FrameConfig::default()
        };
        let mut reader = FrameReader::with_config(config);
        let mut stream = MemoryStream::new();
        stream.push_inbound(&[0x05, 200]);

        for _ in 0..1000 {
            reader.fill(&mut stream).unwrap();
        }
        assert_eq!(reader.discarded_bytes(), 0);
        assert_eq!(reader.buffered(), 2);
    }

    #[test]
    fn fill_without_data_reads_nothing() {
        let mut reader = FrameReader::new();
        let mut stream = MemoryStream::new();
        assert_eq!(reader.fill(&mut stream).unwrap(), 0);
        assert!(reader.next_frame().is_none());
    }

    #[test]
    fn transport_error_propagates() {
        struct Broken;

        impl Stream for Broken {
            fn available(&mut self) -> serialmux_transport::Result<usize> {
                Err(TransportError::Closed)
            }
            fn read(&mut self, _buf: &mut [u8]) -> serialmux_transport::Result<usize> {
                Ok(0)
            }
            fn write(&mut self, data: &[u8]) -> serialmux_transport::Result<usize> {
                Ok(data.len())
            }
        }

        let mut reader = FrameReader::new();
        let err = reader.fill(&mut Broken).unwrap_err();
        assert!(matches!(err, FrameError::Transport(TransportError::Closed)));
    }

    #[test]
    fn oversized_declared_length_resyncs() {
        let config = FrameConfig {
            max_payload_size: 8,
            ..FrameConfig::default()
        };
        let mut reader = FrameReader::with_config(config);
        let mut bytes = vec![0x01, 0x40];
        bytes.extend(wire(&[(1, b"ok")]));
        reader.extend_from_slice(&bytes);

        let frames = drain(&mut reader);
        assert_eq!(frames, vec![Frame::new(1, &b"ok"[..])]);
        assert_eq!(reader.discarded_bytes(), 2);
    }
}
