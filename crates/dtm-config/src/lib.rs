//! Shared configuration for the `dtm` client.
//!
//! Values are layered by `ortho_config`: built-in defaults, then an optional
//! TOML file named by `--config-path`, then `DTM_*` environment variables,
//! then command-line flags.

mod defaults;
mod format;
mod logging;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

pub use defaults::{
    DEFAULT_LOG_FILTER, default_log_filter, default_log_filter_string, default_log_format,
    default_output_format,
};
pub use format::{OutputFormat, OutputFormatParseError};
pub use logging::{LogFormat, LogFormatParseError};

/// Connection and presentation settings for a `dtm` session.
#[derive(Debug, Clone, Deserialize, Serialize, OrthoConfig, PartialEq)]
#[ortho_config(prefix = "DTM")]
pub struct Config {
    /// Base URL of the REST service, for example `http://localhost:8001/`.
    #[serde(default)]
    pub host: Option<String>,
    /// Storage alias selected at start-up.
    #[serde(default)]
    pub alias: Option<String>,
    /// Database selected at start-up.
    #[serde(default)]
    pub db: Option<String>,
    /// Initial output format.
    #[serde(default = "default_output_format")]
    #[ortho_config(default = default_output_format())]
    pub format: OutputFormat,
    /// `tracing` filter directive applied to diagnostics on stderr.
    #[serde(default = "default_log_filter_string")]
    #[ortho_config(default = default_log_filter_string())]
    pub log_filter: String,
    /// Diagnostic output format.
    #[serde(default = "default_log_format")]
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: None,
            alias: None,
            db: None,
            format: default_output_format(),
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
        }
    }
}

/// Errors raised when the configured host cannot be used as a base URL.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    /// The host could not be parsed as an absolute URL.
    #[error("invalid host '{host}': {message}")]
    Invalid {
        /// Host text as configured.
        host: String,
        /// Parser diagnostic.
        message: String,
    },
    /// The URL scheme is not HTTP.
    #[error("unsupported scheme '{scheme}' in host '{host}': expected http or https")]
    UnsupportedScheme {
        /// Host text as configured.
        host: String,
        /// Scheme found in the URL.
        scheme: String,
    },
}

impl Config {
    /// Returns the configured log filter expression.
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Returns the configured diagnostic format.
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Returns the initial output format.
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Parses `host` into a base URL whose path ends with `/`.
    ///
    /// Returns `Ok(None)` when no host is configured.
    pub fn host_url(&self) -> Result<Option<Url>, HostError> {
        self.host.as_deref().map(parse_host).transpose()
    }
}

/// Parses a host string into a base URL that relative paths can be joined to.
///
/// A trailing `/` is appended when missing so `data/` joins beneath the
/// host's own path rather than replacing its last segment.
pub fn parse_host(host: &str) -> Result<Url, HostError> {
    let trimmed = host.trim();
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_owned()
    } else {
        format!("{trimmed}/")
    };
    let url = Url::parse(&with_slash).map_err(|error| HostError::Invalid {
        host: host.to_owned(),
        message: error.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(HostError::UnsupportedScheme {
            host: host.to_owned(),
            scheme: other.to_owned(),
        }),
    }
}
