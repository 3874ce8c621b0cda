use std::time::Duration;

use serialmux_frame::{FRAME_OVERHEAD, MAX_PAYLOAD};
use serialmux_peer::{
    CONTROL_PAYLOAD_LEN, DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_MAX_CHANNELS, DEFAULT_SYNC_TIMEOUT,
    DEFAULT_UNSYNCED_HEARTBEAT_INTERVAL,
};

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("serialmux {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: serialmux");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!(
        "build_target: {}",
        option_env!("SERIALMUX_BUILD_TARGET").unwrap_or("unknown")
    );
    println!(
        "build_profile: {}",
        option_env!("SERIALMUX_BUILD_PROFILE").unwrap_or("unknown")
    );
    println!("features: peer={}, cli=true", cfg!(feature = "peer"));
    println!(
        "wire: overhead={FRAME_OVERHEAD}B max_payload={MAX_PAYLOAD}B control_payload={CONTROL_PAYLOAD_LEN}B"
    );
    println!(
        "defaults: max_channels={DEFAULT_MAX_CHANNELS} heartbeat={} unsynced_heartbeat={} sync_timeout={}",
        millis(DEFAULT_HEARTBEAT_INTERVAL),
        millis(DEFAULT_UNSYNCED_HEARTBEAT_INTERVAL),
        millis(DEFAULT_SYNC_TIMEOUT)
    );

    Ok(SUCCESS)
}

fn millis(duration: Duration) -> String {
    format!("{}ms", duration.as_millis())
}
