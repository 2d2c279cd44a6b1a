//! Diagnostic logging for the client.
//!
//! Diagnostics go to stderr so they never mix with rendered results on
//! stdout.

use std::io::{self, IsTerminal};

use dtm_config::{Config, LogFormat};
use once_cell::sync::OnceCell;
use tracing::{Subscriber, subscriber::SetGlobalDefaultError};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

static TELEMETRY_GUARD: OnceCell<()> = OnceCell::new();

/// Directive appended to the configured filter by `--verbose`.
const VERBOSE_DIRECTIVE: &str = "dtm_cli=debug";

#[derive(Debug, thiserror::Error)]
pub(crate) enum TelemetryError {
    #[error("invalid log filter: {0}")]
    Filter(String),
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(#[source] SetGlobalDefaultError),
}

/// Installs the global subscriber on first use; later calls are no-ops.
pub(crate) fn initialise(config: &Config, verbose: bool) -> Result<(), TelemetryError> {
    TELEMETRY_GUARD
        .get_or_try_init(|| install_subscriber(config, verbose))
        .map(|_| ())
}

fn filter_directives(config: &Config, verbose: bool) -> String {
    let configured = config.log_filter().trim();
    match (verbose, configured.is_empty()) {
        (false, _) => configured.to_owned(),
        (true, true) => VERBOSE_DIRECTIVE.to_owned(),
        (true, false) => format!("{configured},{VERBOSE_DIRECTIVE}"),
    }
}

fn install_subscriber(config: &Config, verbose: bool) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_new(filter_directives(config, verbose))
        .map_err(|error| TelemetryError::Filter(error.to_string()))?;

    let builder = |filter: EnvFilter| {
        fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .with_level(true)
            .with_writer(io::stderr)
            .with_ansi(io::stderr().is_terminal())
            .without_time()
    };

    let subscriber: Box<dyn Subscriber + Send + Sync> = match config.log_format() {
        LogFormat::Json => Box::new(builder(filter).json().flatten_event(true).finish()),
        LogFormat::Compact => Box::new(builder(filter).compact().finish()),
    };

    tracing::subscriber::set_global_default(subscriber).map_err(TelemetryError::Subscriber)
}
