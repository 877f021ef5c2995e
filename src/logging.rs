// Structured logging setup.
// Installs the global tracing subscriber with an env filter and compact or JSON output.

use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::LogFormat;
use crate::error::{FoodDashError, Result};

/// Build the filter from `RUST_LOG` when set, otherwise from `directives`.
pub fn filter(directives: &str) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(directives)
            .map_err(|err| FoodDashError::Config(format!("invalid log filter {directives:?}: {err}"))),
    }
}

/// Install a global tracing subscriber. Fails if one is already installed.
pub fn init(directives: &str, format: LogFormat) -> Result<()> {
    let env_filter = filter(directives)?;

    // Logs go to stderr so command output on stdout stays clean.
    let fmt_layer = match format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|err| FoodDashError::Config(format!("failed to install tracing subscriber: {err}")))
}
