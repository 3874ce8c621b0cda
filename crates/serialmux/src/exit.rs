use std::fmt;
use std::io;

use serialmux_frame::FrameError;
use serialmux_peer::MuxError;
use serialmux_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

/// Local file errors (payload files and the like).
pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => FAILURE,
        io::ErrorKind::TimedOut => TIMEOUT,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    let code = match &err {
        TransportError::Bind { source, .. }
        | TransportError::Connect { source, .. }
        | TransportError::Accept { source, .. }
        | TransportError::Io(source)
            if source.kind() == io::ErrorKind::TimedOut =>
        {
            TIMEOUT
        }
        _ => TRANSPORT_ERROR,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Transport(err) => transport_error(context, err),
        FrameError::PayloadTooLarge { .. } | FrameError::EmptyPayload => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
    }
}

pub fn mux_error(context: &str, err: MuxError) -> CliError {
    match err {
        MuxError::Transport(err) => transport_error(context, err),
        MuxError::Frame(err) => frame_error(context, err),
        MuxError::PayloadTooLarge { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        MuxError::InvalidChannelName(_)
        | MuxError::InvalidChannelSize { .. }
        | MuxError::DuplicateChannelName(_)
        | MuxError::ChannelLimitExceeded { .. }
        | MuxError::InvalidConfig(_) => CliError::new(USAGE, format!("{context}: {err}")),
        MuxError::UnknownChannel(_) => CliError::new(INTERNAL, format!("{context}: {err}")),
    }
}

/// True if the error means the remote end went away.
pub fn is_disconnect(err: &MuxError) -> bool {
    matches!(
        err,
        MuxError::Transport(TransportError::Closed)
            | MuxError::Frame(FrameError::Transport(TransportError::Closed))
    )
}
