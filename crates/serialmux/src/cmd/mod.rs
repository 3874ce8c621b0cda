use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::{ArgGroup, Args, Subcommand};

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod listen;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Accept one peer and print frames from the channels it offers.
    Listen(ListenArgs),
    /// Connect to a peer and send a single payload.
    Send(SendArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Listen(args) => listen::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// TCP address to bind (e.g. 127.0.0.1:7000).
    pub addr: String,
    /// Remote channels to subscribe to (comma-separated names).
    #[arg(long, short = 'c', value_delimiter = ',', required = true)]
    pub channel: Vec<String>,
    /// Exit after receiving N frames.
    #[arg(long)]
    pub count: Option<usize>,
    /// Polling cadence in milliseconds.
    #[arg(long, default_value_t = 5)]
    pub interval_ms: u64,
    /// Print link statistics on exit.
    #[arg(long)]
    pub stats: bool,
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("payload").required(true).args(["data", "hex", "file"])))]
pub struct SendArgs {
    /// TCP address of the listening peer.
    pub addr: String,
    /// Channel to create and send on.
    #[arg(long, short = 'c')]
    pub channel: String,
    /// Raw string payload.
    #[arg(long)]
    pub data: Option<String>,
    /// Hex-encoded payload.
    #[arg(long)]
    pub hex: Option<String>,
    /// Read payload from file.
    #[arg(long)]
    pub file: Option<PathBuf>,
    /// Maximum payload size declared for the channel.
    #[arg(long, default_value_t = 255)]
    pub max_size: usize,
    /// How long to wait for the peer to connect and subscribe (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
    /// Polling cadence in milliseconds.
    #[arg(long, default_value_t = 5)]
    pub interval_ms: u64,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Wrapping millisecond clock for [`MuxPeer::process`](serialmux_peer::MuxPeer::process).
pub(crate) struct Clock(Instant);

impl Clock {
    pub fn start() -> Self {
        Self(Instant::now())
    }

    pub fn now_ms(&self) -> u32 {
        // Truncation wraps, which the sync machine expects.
        self.0.elapsed().as_millis() as u32
    }
}

pub(crate) fn parse_interval(ms: u64) -> CliResult<Duration> {
    if ms == 0 {
        return Err(CliError::new(USAGE, "--interval-ms must be greater than zero"));
    }
    Ok(Duration::from_millis(ms))
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(match unit {
        "ms" => Duration::from_millis(value),
        _ => Duration::from_secs(value),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn zero_interval_rejected() {
        assert_eq!(parse_interval(0).unwrap_err().code, USAGE);
        assert_eq!(parse_interval(5).unwrap(), Duration::from_millis(5));
    }
}
