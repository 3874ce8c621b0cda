/// Errors that can occur in peer operations.
#[derive(Debug, thiserror::Error)]
pub enum MuxError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] serialmux_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] serialmux_frame::FrameError),

    /// The payload exceeds the channel's declared maximum.
    #[error("payload too large for channel '{channel}' ({size} bytes, max {max})")]
    PayloadTooLarge {
        channel: String,
        size: usize,
        max: usize,
    },

    /// No channel with this name or identifier is registered.
    #[error("unknown channel {0}")]
    UnknownChannel(String),

    /// Registering would exceed the configured channel ceiling.
    #[error("channel limit exceeded (max {max})")]
    ChannelLimitExceeded { max: u8 },

    /// A channel with this name already exists.
    #[error("duplicate channel name '{0}'")]
    DuplicateChannelName(String),

    /// Names must be 1..=10 bytes without NUL.
    #[error("invalid channel name '{0}'")]
    InvalidChannelName(String),

    /// Channel payload sizes must fit the frame length field.
    #[error("invalid max payload size {size} for channel '{name}' (allowed 1..={max})")]
    InvalidChannelSize { name: String, size: usize, max: usize },

    /// Configuration rejected at construction.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, MuxError>;
