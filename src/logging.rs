// Logging setup shared by the CLI and the server

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber: RUST_LOG when set, `default_level` otherwise
///
/// Logs go to stderr so command output on stdout stays clean. Calling this
/// twice is harmless; the second call keeps the first subscriber.
pub fn init(default_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
