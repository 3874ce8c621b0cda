use clap::ValueEnum;
use tracing_subscriber::EnvFilter;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Filter directives for `--log-level`.
///
/// At trace level the framing layer stays at debug: it logs every frame sent
/// and every byte discarded, which drowns out protocol events on a busy link.
/// `RUST_LOG=serialmux_frame=trace` turns it back on.
fn default_directives(level: LogLevel) -> String {
    match level {
        LogLevel::Trace => "trace,serialmux_frame=debug".to_string(),
        other => other.as_directive().to_string(),
    }
}

/// Install the global subscriber. Logs always go to stderr so stdout stays
/// reserved for received frames. `RUST_LOG`, when set, replaces the level
/// chosen on the command line.
pub fn init_logging(format: LogFormat, level: LogLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_ansi(false)
        .with_target(matches!(level, LogLevel::Debug | LogLevel::Trace));

    // A second init (tests) keeps the first subscriber.
    let _ = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
