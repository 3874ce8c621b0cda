use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread;

use serialmux_peer::{MuxConfig, MuxPeer};
use serialmux_transport::{Stream, TcpListener};
use tracing::{info, warn};

use crate::cmd::{parse_interval, Clock, ListenArgs};
use crate::exit::{
    is_disconnect, mux_error, transport_error, CliError, CliResult, INTERNAL, SUCCESS, USAGE,
};
use crate::output::{print_received, print_stats, OutputFormat};

struct Received {
    channel: String,
    payload: Vec<u8>,
}

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let interval = parse_interval(args.interval_ms)?;
    let max_channels = u8::try_from(args.channel.len())
        .map_err(|_| CliError::new(USAGE, "at most 255 channels can be subscribed"))?;

    let listener =
        TcpListener::bind(&args.addr).map_err(|err| transport_error("bind failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let stream = listener
        .accept()
        .map_err(|err| transport_error("accept failed", err))?;
    if let Ok(peer_addr) = stream.peer_addr() {
        info!(%peer_addr, "peer connected");
    }

    let mut peer = MuxPeer::with_config(stream, MuxConfig::with_max_channels(max_channels))
        .map_err(|err| mux_error("invalid configuration", err))?;
    let received = subscribe_all(&mut peer, &args.channel)?;
    peer.on_synced(|| info!("link synchronized"));
    peer.on_desynced(|| warn!("link lost synchronization"));

    let clock = Clock::start();
    let mut printed = 0usize;

    while running.load(Ordering::SeqCst) {
        match peer.process(clock.now_ms()) {
            Ok(_) => {}
            Err(err) if is_disconnect(&err) => {
                info!("peer disconnected");
                break;
            }
            Err(err) => return Err(mux_error("receive failed", err)),
        }

        while let Ok(frame) = received.try_recv() {
            print_received(&frame.channel, &frame.payload, format);
            printed = printed.saturating_add(1);
            if args.count.is_some_and(|count| printed >= count) {
                return finish(&peer, &args, format);
            }
        }

        thread::sleep(interval);
    }

    finish(&peer, &args, format)
}

fn subscribe_all<S: Stream>(
    peer: &mut MuxPeer<S>,
    channels: &[String],
) -> CliResult<Receiver<Received>> {
    let (tx, rx) = mpsc::channel();
    for name in channels {
        let tx = tx.clone();
        let channel = name.clone();
        peer.subscribe_to_remote_channel(name, move |payload: &[u8]| {
            tx.send(Received {
                channel: channel.clone(),
                payload: payload.to_vec(),
            })?;
            Ok(())
        })
        .map_err(|err| mux_error("subscribe failed", err))?;
    }
    Ok(rx)
}

fn finish<S: Stream>(peer: &MuxPeer<S>, args: &ListenArgs, format: OutputFormat) -> CliResult<i32> {
    if args.stats {
        print_stats(peer.stats(), format);
    }
    info!(
        frames = peer.stats().frames_dispatched,
        discarded = peer.stats().bytes_discarded,
        "listen finished"
    );
    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
