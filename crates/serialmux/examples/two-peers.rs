//! Two peers on an in-memory null-modem link.
//!
//! The sensor publishes TEMP readings, the host publishes LED commands, and
//! each side subscribes to the other's channel by name.
//!
//! Run with:
//!   cargo run --example two-peers

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serialmux::peer::MuxPeer;
use serialmux::transport::MemoryStream;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (sensor_end, host_end) = MemoryStream::pair();
    let mut sensor = MuxPeer::new(sensor_end, 2);
    let mut host = MuxPeer::new(host_end, 2);

    sensor.create_channel("TEMP", 8)?;
    host.create_channel("LED", 1)?;

    let led_on = Arc::new(AtomicBool::new(false));
    let led = Arc::clone(&led_on);
    sensor.subscribe_to_remote_channel("LED", move |payload: &[u8]| {
        led.store(payload.first() == Some(&1), Ordering::SeqCst);
        Ok(())
    })?;
    host.subscribe_to_remote_channel("TEMP", |payload: &[u8]| {
        println!("[host] TEMP {}", String::from_utf8_lossy(payload));
        Ok(())
    })?;

    // 10ms ticks on a simulated clock.
    for tick in 0..100u32 {
        let now = tick * 10;
        sensor.process(now)?;
        host.process(now)?;

        if tick % 20 == 10 && sensor.is_peer_subscribed("TEMP")? {
            let reading = format!("{:.1}", 20.0 + f64::from(tick) / 20.0);
            sensor.send_data("TEMP", reading.as_bytes())?;
        }
        if tick == 50 && host.is_peer_subscribed("LED")? {
            host.send_data("LED", &[1])?;
        }
    }

    println!(
        "[sensor] synced={} led_on={}",
        sensor.is_synced(),
        led_on.load(Ordering::SeqCst)
    );
    println!("[host] stats {:?}", host.stats());
    Ok(())
}
