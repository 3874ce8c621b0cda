use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use serialmux_frame::ChannelId;
use serialmux_peer::MuxStats;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct ReceivedOutput<'a> {
    channel: &'a str,
    payload_size: usize,
    encoding: &'static str,
    payload: String,
    timestamp: String,
}

#[derive(Serialize)]
struct SentOutput<'a> {
    channel: &'a str,
    channel_id: ChannelId,
    payload_size: usize,
    bytes_written: usize,
}

pub fn print_received(channel: &str, payload: &[u8], format: OutputFormat) {
    let (encoding, preview) = payload_preview(payload);
    match format {
        OutputFormat::Json => {
            let out = ReceivedOutput {
                channel,
                payload_size: payload.len(),
                encoding,
                payload: preview,
                timestamp: now_unix_seconds(),
            };
            print_json(&out);
        }
        OutputFormat::Table => {
            let mut table = new_table(vec!["CHANNEL", "SIZE", "PAYLOAD"]);
            table.add_row(vec![
                channel.to_string(),
                payload.len().to_string(),
                preview,
            ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("channel={channel} size={} {encoding}={preview}", payload.len());
        }
        OutputFormat::Raw => print_raw(payload),
    }
}

pub fn print_sent(channel: &str, channel_id: ChannelId, payload_size: usize, written: usize, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&SentOutput {
            channel,
            channel_id,
            payload_size,
            bytes_written: written,
        }),
        OutputFormat::Table => {
            let mut table = new_table(vec!["CHANNEL", "ID", "PAYLOAD", "WRITTEN"]);
            table.add_row(vec![
                channel.to_string(),
                channel_id.to_string(),
                payload_size.to_string(),
                written.to_string(),
            ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("sent channel={channel} id={channel_id} payload={payload_size} written={written}");
        }
        OutputFormat::Raw => {}
    }
}

pub fn print_stats(stats: &MuxStats, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(stats),
        OutputFormat::Table | OutputFormat::Pretty => {
            let mut table = new_table(vec!["COUNTER", "VALUE"]);
            for (name, value) in [
                ("bytes_read", stats.bytes_read),
                ("bytes_written", stats.bytes_written),
                ("bytes_discarded", stats.bytes_discarded),
                ("frames_received", stats.frames_received),
                ("frames_sent", stats.frames_sent),
                ("frames_dispatched", stats.frames_dispatched),
                ("frames_dropped", stats.frames_dropped),
                ("heartbeats_sent", stats.heartbeats_sent),
                ("subscriber_failures", stats.subscriber_failures),
                ("sync_losses", stats.sync_losses),
            ] {
                table.add_row(vec![name.to_string(), value.to_string()]);
            }
            println!("{table}");
        }
        OutputFormat::Raw => {}
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

/// Printable text as-is, anything else as hex.
fn payload_preview(payload: &[u8]) -> (&'static str, String) {
    match std::str::from_utf8(payload) {
        Ok(text) if !text.chars().any(char::is_control) => ("utf8", text.to_string()),
        _ => ("hex", hex::encode(payload)),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_payload_previewed_as_utf8() {
        assert_eq!(payload_preview(b"21.5C"), ("utf8", "21.5C".to_string()));
    }

    #[test]
    fn binary_payload_previewed_as_hex() {
        assert_eq!(payload_preview(&[0x00, 0xff]), ("hex", "00ff".to_string()));
        assert_eq!(payload_preview(b"a\nb"), ("hex", "610a62".to_string()));
    }
}
