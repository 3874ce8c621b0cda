use bytes::{BufMut, Bytes, BytesMut};

use crate::channel::ChannelId;
use crate::error::{FrameError, Result};

/// Frame header: channel (1) + length (1) = 2 bytes.
pub const HEADER_SIZE: usize = 2;

/// Trailing checksum size.
pub const CHECKSUM_SIZE: usize = 1;

/// Bytes added around every payload.
pub const FRAME_OVERHEAD: usize = HEADER_SIZE + CHECKSUM_SIZE;

/// Largest payload the one-byte length field can describe.
pub const MAX_PAYLOAD: usize = u8::MAX as usize;

/// Largest frame on the wire.
pub const MAX_FRAME_SIZE: usize = FRAME_OVERHEAD + MAX_PAYLOAD;

/// Default number of idle ticks a partial frame may sit at the buffer head.
pub const DEFAULT_STALL_LIMIT: u32 = 100;

/// A decoded frame with channel routing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The channel this payload belongs to.
    pub channel: ChannelId,
    /// The payload.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(channel: ChannelId, payload: impl Into<Bytes>) -> Self {
        Self {
            channel,
            payload: payload.into(),
        }
    }

    /// The total wire size of this frame (header + payload + checksum).
    pub fn wire_size(&self) -> usize {
        FRAME_OVERHEAD + self.payload.len()
    }
}

/// Outcome of inspecting the head of a receive buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// Fewer bytes than the declared frame length; keep buffering.
    Incomplete,
    /// A valid frame occupying the first `len` bytes of the buffer.
    Frame { frame: Frame, len: usize },
    /// Illegal length or checksum mismatch; drop one leading byte and retry.
    Corrupt,
}

/// Additive checksum: the byte sum modulo 255.
///
/// Computed over channel, length and payload, i.e. every frame byte before the
/// checksum itself.
pub fn checksum(bytes: &[u8]) -> u8 {
    let sum = bytes.iter().fold(0u32, |acc, &b| acc + u32::from(b));
    (sum % 255) as u8
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────┬──────────┬──────────────────┬──────────┐
/// │ Channel  │ Length   │ Payload          │ Checksum │
/// │ (1B)     │ (1B)     │ (Length bytes)   │ (1B)     │
/// └──────────┴──────────┴──────────────────┴──────────┘
/// checksum = (channel + length + Σ payload) mod 255
/// ```
pub fn encode_frame(
    channel: ChannelId,
    payload: &[u8],
    max_payload: usize,
    dst: &mut BytesMut,
) -> Result<()> {
    let max = max_payload.min(MAX_PAYLOAD);
    if payload.is_empty() {
        return Err(FrameError::EmptyPayload);
    }
    if payload.len() > max {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max,
        });
    }

    let start = dst.len();
    dst.reserve(FRAME_OVERHEAD + payload.len());
    dst.put_u8(channel);
    dst.put_u8(payload.len() as u8);
    dst.put_slice(payload);
    let sum = checksum(&dst[start..]);
    dst.put_u8(sum);
    Ok(())
}

/// Inspect the head of `src` without consuming it.
///
/// A declared length of zero or above `max_payload` is `Corrupt` as soon as
/// the header is visible; the checksum is only checked once the whole frame
/// has arrived.
pub fn try_decode(src: &[u8], max_payload: usize) -> Decoded {
    if src.len() < HEADER_SIZE {
        return Decoded::Incomplete;
    }

    let channel = src[0];
    let payload_len = usize::from(src[1]);
    if payload_len == 0 || payload_len > max_payload.min(MAX_PAYLOAD) {
        return Decoded::Corrupt;
    }

    let body = HEADER_SIZE + payload_len;
    let total = body + CHECKSUM_SIZE;
    if src.len() < total {
        return Decoded::Incomplete;
    }

    if checksum(&src[..body]) != src[body] {
        return Decoded::Corrupt;
    }

    Decoded::Frame {
        frame: Frame {
            channel,
            payload: Bytes::copy_from_slice(&src[HEADER_SIZE..body]),
        },
        len: total,
    }
}

/// Configuration for the frame codec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameConfig {
    /// Maximum payload size in bytes accepted on decode and encode. Default: 255.
    pub max_payload_size: usize,
    /// Consecutive ticks without new input after which an incomplete frame at
    /// the buffer head is abandoned one byte at a time. Zero disables the bound.
    pub stall_limit: u32,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: MAX_PAYLOAD,
            stall_limit: DEFAULT_STALL_LIMIT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(channel: ChannelId, payload: &[u8]) -> BytesMut {
        let mut buf = BytesMut::new();
        encode_frame(channel, payload, MAX_PAYLOAD, &mut buf).unwrap();
        buf
    }

    #[test]
    fn test_wire_layout_is_stable() {
        let buf = encoded(1, &[0x12, 0x34, 0x56, 0x78]);
        assert_eq!(buf.as_ref(), &[0x01, 0x04, 0x12, 0x34, 0x56, 0x78, 0x1A]);
    }

    #[test]
    fn test_checksum_wraps_modulo_255() {
        assert_eq!(checksum(&[]), 0);
        assert_eq!(checksum(&[254]), 254);
        assert_eq!(checksum(&[255]), 0);
        assert_eq!(checksum(&[200, 100]), 45);
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let buf = encoded(3, b"hello, serialmux");

        match try_decode(&buf, MAX_PAYLOAD) {
            Decoded::Frame { frame, len } => {
                assert_eq!(frame.channel, 3);
                assert_eq!(frame.payload.as_ref(), b"hello, serialmux");
                assert_eq!(len, buf.len());
                assert_eq!(frame.wire_size(), len);
            }
            other => panic!("expected frame, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_does_not_consume() {
        let buf = encoded(2, b"abc");
        let before = buf.clone();
        let _ = try_decode(&buf, MAX_PAYLOAD);
        assert_eq!(buf, before);
    }

    #[test]
    fn test_decode_incomplete_header() {
        assert_eq!(try_decode(&[], MAX_PAYLOAD), Decoded::Incomplete);
        assert_eq!(try_decode(&[0x01], MAX_PAYLOAD), Decoded::Incomplete);
    }

    #[test]
    fn test_decode_incomplete_payload() {
        let buf = encoded(1, b"hello");
        for cut in HEADER_SIZE..buf.len() {
            assert_eq!(
                try_decode(&buf[..cut], MAX_PAYLOAD),
                Decoded::Incomplete,
                "cut at {cut}"
            );
        }
    }

    #[test]
    fn test_decode_zero_length_is_corrupt() {
        assert_eq!(try_decode(&[0x01, 0x00, 0x01], MAX_PAYLOAD), Decoded::Corrupt);
    }

    #[test]
    fn test_decode_length_above_limit_is_corrupt() {
        let buf = encoded(1, &[0xAA; 32]);
        assert_eq!(try_decode(&buf, 16), Decoded::Corrupt);
    }

    #[test]
    fn test_decode_bad_checksum_is_corrupt() {
        let mut buf = encoded(1, b"data");
        let last = buf.len() - 1;
        buf[last] = buf[last].wrapping_add(1);
        assert_eq!(try_decode(&buf, MAX_PAYLOAD), Decoded::Corrupt);
    }

    #[test]
    fn test_decode_bit_flip_in_payload_is_corrupt() {
        let mut buf = encoded(1, b"data");
        buf[3] ^= 0x04;
        assert_eq!(try_decode(&buf, MAX_PAYLOAD), Decoded::Corrupt);
    }

    #[test]
    fn test_encode_payload_too_large() {
        let mut buf = BytesMut::new();
        let result = encode_frame(1, &[0u8; 9], 8, &mut buf);
        assert!(matches!(
            result,
            Err(FrameError::PayloadTooLarge { size: 9, max: 8 })
        ));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_encode_limit_capped_by_length_field() {
        let mut buf = BytesMut::new();
        let result = encode_frame(1, &[0u8; 256], usize::MAX, &mut buf);
        assert!(matches!(
            result,
            Err(FrameError::PayloadTooLarge { size: 256, max: MAX_PAYLOAD })
        ));
    }

    #[test]
    fn test_encode_empty_payload() {
        let mut buf = BytesMut::new();
        let result = encode_frame(1, b"", MAX_PAYLOAD, &mut buf);
        assert!(matches!(result, Err(FrameError::EmptyPayload)));
    }

    #[test]
    fn test_max_size_frame() {
        let payload = vec![0xFF; MAX_PAYLOAD];
        let buf = encoded(9, &payload);
        assert_eq!(buf.len(), MAX_FRAME_SIZE);
        assert!(matches!(
            try_decode(&buf, MAX_PAYLOAD),
            Decoded::Frame { .. }
        ));
    }

    #[test]
    fn test_multiple_frames_back_to_back() {
        let mut buf = encoded(1, b"first");
        buf.extend_from_slice(&encoded(2, b"second"));

        let Decoded::Frame { frame, len } = try_decode(&buf, MAX_PAYLOAD) else {
            panic!("first frame should decode");
        };
        assert_eq!(frame, Frame::new(1, &b"first"[..]));

        let Decoded::Frame { frame, .. } = try_decode(&buf[len..], MAX_PAYLOAD) else {
            panic!("second frame should decode");
        };
        assert_eq!(frame, Frame::new(2, &b"second"[..]));
    }
}
