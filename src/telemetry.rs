//! Tracing setup for the command line

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Output format for log lines
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Install the global subscriber. The level comes from `RUST_LOG` and
/// defaults to INFO. Logs go to stderr so command output on stdout stays
/// machine readable.
pub fn init_tracing(format: LogFormat) {
    let env_filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();

    let registry = tracing_subscriber::registry().with(env_filter);

    match format {
        LogFormat::Text => registry
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
    }
}
