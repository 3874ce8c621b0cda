use std::fs;
use std::io;
use std::thread;
use std::time::{Duration, Instant};

use serialmux_frame::FRAME_OVERHEAD;
use serialmux_peer::MuxPeer;
use serialmux_transport::{TcpStream, TransportError};
use tracing::{debug, info};

use crate::cmd::{parse_duration, parse_interval, Clock, SendArgs};
use crate::exit::{
    io_error, mux_error, transport_error, CliError, CliResult, DATA_INVALID, SUCCESS, TIMEOUT,
    TRANSPORT_ERROR,
};
use crate::output::{print_sent, OutputFormat};

const CONNECT_RETRY_DELAY: Duration = Duration::from_millis(50);

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let interval = parse_interval(args.interval_ms)?;
    let payload = resolve_payload(&args)?;
    if payload.is_empty() {
        return Err(CliError::new(DATA_INVALID, "payload must not be empty"));
    }
    if payload.len() > args.max_size {
        return Err(CliError::new(
            DATA_INVALID,
            format!(
                "payload is {} bytes but channel '{}' allows {}",
                payload.len(),
                args.channel,
                args.max_size
            ),
        ));
    }

    let deadline = Instant::now() + timeout;
    let stream = connect_with_retry(&args.addr, deadline)?;
    let mut peer = MuxPeer::new(stream, 1);
    let channel_id = peer
        .create_channel(&args.channel, args.max_size)
        .map_err(|err| mux_error("create channel failed", err))?;

    let clock = Clock::start();
    loop {
        peer.process(clock.now_ms())
            .map_err(|err| mux_error("receive failed", err))?;
        let subscribed = peer
            .is_peer_subscribed(&args.channel)
            .map_err(|err| mux_error("channel lookup failed", err))?;
        if peer.is_synced() && subscribed {
            break;
        }
        if Instant::now() >= deadline {
            return Err(CliError::new(
                TIMEOUT,
                format!(
                    "peer did not subscribe to '{}' within {}",
                    args.channel, args.timeout
                ),
            ));
        }
        thread::sleep(interval);
    }
    debug!(channel = %args.channel, "peer subscribed");

    let written = peer
        .send_data(&args.channel, &payload)
        .map_err(|err| mux_error("send failed", err))?;
    if written < payload.len() + FRAME_OVERHEAD {
        return Err(CliError::new(
            TRANSPORT_ERROR,
            format!("short write: {written} of {} bytes", payload.len() + FRAME_OVERHEAD),
        ));
    }
    info!(channel = %args.channel, bytes = written, "payload sent");

    print_sent(&args.channel, channel_id, payload.len(), written, format);
    Ok(SUCCESS)
}

fn resolve_payload(args: &SendArgs) -> CliResult<Vec<u8>> {
    if let Some(data) = &args.data {
        return Ok(data.as_bytes().to_vec());
    }
    if let Some(encoded) = &args.hex {
        return hex::decode(encoded.trim())
            .map_err(|err| CliError::new(DATA_INVALID, format!("--hex is not valid hex: {err}")));
    }
    if let Some(path) = &args.file {
        return fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err));
    }
    Ok(Vec::new())
}

/// The listener may still be starting up, so refused connections are retried
/// until the deadline.
fn connect_with_retry(addr: &str, deadline: Instant) -> CliResult<TcpStream> {
    loop {
        match TcpStream::connect(addr) {
            Ok(stream) => return Ok(stream),
            Err(TransportError::Connect { ref source, .. })
                if source.kind() == io::ErrorKind::ConnectionRefused
                    && Instant::now() < deadline =>
            {
                thread::sleep(CONNECT_RETRY_DELAY);
            }
            Err(err) => return Err(transport_error("connect failed", err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(data: Option<&str>, hex: Option<&str>) -> SendArgs {
        SendArgs {
            addr: "127.0.0.1:1".to_string(),
            channel: "TEMP".to_string(),
            data: data.map(str::to_string),
            hex: hex.map(str::to_string),
            file: None,
            max_size: 255,
            timeout: "1s".to_string(),
            interval_ms: 5,
        }
    }

    #[test]
    fn payload_from_data() {
        assert_eq!(resolve_payload(&args(Some("hi"), None)).unwrap(), b"hi");
    }

    #[test]
    fn payload_from_hex() {
        assert_eq!(
            resolve_payload(&args(None, Some("01ff"))).unwrap(),
            vec![0x01, 0xff]
        );
        let err = resolve_payload(&args(None, Some("zz"))).unwrap_err();
        assert_eq!(err.code, DATA_INVALID);
    }

    #[test]
    fn refused_connection_fails_after_deadline() {
        let unused = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = unused.local_addr().unwrap().to_string();
        drop(unused);

        let err = connect_with_retry(&addr, Instant::now()).unwrap_err();
        assert_eq!(err.code, TRANSPORT_ERROR);
    }
}
