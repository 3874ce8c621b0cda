use serialmux_transport::TransportError;

/// Errors that can occur during frame encoding and transmission.
///
/// Corrupt input is not an error: the decoder recovers from it internally.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// Frames must carry at least one payload byte.
    #[error("empty payload")]
    EmptyPayload,

    /// The underlying transport failed.
    #[error("frame transport error: {0}")]
    Transport(#[from] TransportError),
}

pub type Result<T> = std::result::Result<T, FrameError>;
