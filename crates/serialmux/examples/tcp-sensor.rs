//! A simulated device behind a serial-to-TCP bridge.
//!
//! The "device" thread listens on an ephemeral TCP port and streams readings;
//! the main thread connects as the host and prints them.
//!
//! Run with:
//!   cargo run --example tcp-sensor

use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use serialmux::peer::MuxPeer;
use serialmux::transport::{TcpListener, TcpStream};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

const TICK: Duration = Duration::from_millis(5);

fn millis(start: Instant) -> u32 {
    start.elapsed().as_millis() as u32
}

fn main() -> Result<(), BoxError> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr().to_string();

    let device = thread::spawn(move || -> Result<(), BoxError> {
        let mut peer = MuxPeer::new(listener.accept()?, 1);
        peer.create_channel("HUMID", 4)?;

        let start = Instant::now();
        let mut sent = 0u8;
        while sent < 5 {
            peer.process(millis(start))?;
            if peer.is_peer_subscribed("HUMID")? {
                peer.send_data("HUMID", format!("{}%", 40 + sent).as_bytes())?;
                sent += 1;
            }
            thread::sleep(TICK * 10);
        }
        Ok(())
    });

    let (tx, rx) = mpsc::channel();
    let mut host = MuxPeer::new(TcpStream::connect(&addr)?, 1);
    host.subscribe_to_remote_channel("HUMID", move |payload: &[u8]| {
        tx.send(String::from_utf8_lossy(payload).into_owned())?;
        Ok(())
    })?;

    let start = Instant::now();
    let mut received = 0;
    while received < 5 && start.elapsed() < Duration::from_secs(5) {
        host.process(millis(start))?;
        for reading in rx.try_iter() {
            println!("[host] HUMID {reading}");
            received += 1;
        }
        thread::sleep(TICK);
    }

    device.join().map_err(|_| "device thread panicked")??;
    println!("[host] stats {:?}", host.stats());
    Ok(())
}
