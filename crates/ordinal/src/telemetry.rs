//! Logging setup for the `ordinal` binary and embedders that want the same defaults

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is not set
pub fn default_env_filter() -> EnvFilter {
    EnvFilter::new("info,ordinal=debug,ordinal_frontend=debug")
}

/// Install a stderr fmt subscriber.
///
/// stdout stays clean for command output. Fails if a global subscriber is
/// already installed.
pub fn init_tracing() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_env_filter());

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_line_number(true),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))
}
