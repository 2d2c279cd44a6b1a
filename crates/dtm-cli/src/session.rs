//! Per-process connection and presentation state.
//!
//! A [`Session`] is created once from the loaded configuration and then
//! handed by mutable reference to the dispatcher, which is the only code
//! allowed to change it.

use dtm_config::{Config, OutputFormat};
use thiserror::Error;
use url::Url;

use crate::errors::AppError;

/// Errors raised when a command needs a connection setting that is unset.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub(crate) enum SessionError {
    /// No REST service host was configured.
    #[error("no host provided via --host or set in env as DTM_HOST")]
    MissingHost,
    /// No storage alias was configured.
    #[error("no alias provided via --alias or set in env as DTM_ALIAS")]
    MissingAlias,
    /// No database was configured.
    #[error("no db provided via --db or set in env as DTM_DB")]
    MissingDb,
}

/// Result paging applied to queries and datom listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Paging {
    /// Number of leading results to skip.
    pub(crate) offset: Option<u64>,
    /// Maximum number of results to return.
    pub(crate) limit: Option<u64>,
}

/// Mutable connection and formatting state shared by every command.
#[derive(Debug, Clone)]
pub(crate) struct Session {
    host: Option<Url>,
    alias: Option<String>,
    db: Option<String>,
    format: OutputFormat,
    verbose: bool,
    validate: bool,
    header: Option<Vec<String>>,
    paging: Paging,
}

impl Session {
    /// Builds the initial session from configuration.
    pub(crate) fn from_config(config: &Config) -> Result<Self, AppError> {
        let host = config.host_url().map_err(AppError::Host)?;
        Ok(Self {
            host,
            alias: non_empty(config.alias.as_deref()),
            db: non_empty(config.db.as_deref()),
            format: config.format(),
            verbose: false,
            validate: false,
            header: None,
            paging: Paging::default(),
        })
    }

    #[cfg(test)]
    pub(crate) fn for_tests(host: &str, alias: &str, db: &str) -> Self {
        Self {
            host: dtm_config::parse_host(host).ok(),
            alias: non_empty(Some(alias)),
            db: non_empty(Some(db)),
            format: OutputFormat::Table,
            verbose: false,
            validate: false,
            header: None,
            paging: Paging::default(),
        }
    }

    pub(crate) fn host(&self) -> Result<&Url, SessionError> {
        self.host.as_ref().ok_or(SessionError::MissingHost)
    }

    pub(crate) fn alias(&self) -> Result<&str, SessionError> {
        self.alias.as_deref().ok_or(SessionError::MissingAlias)
    }

    pub(crate) fn db(&self) -> Result<&str, SessionError> {
        self.db.as_deref().ok_or(SessionError::MissingDb)
    }

    pub(crate) const fn format(&self) -> OutputFormat {
        self.format
    }

    pub(crate) const fn set_format(&mut self, format: OutputFormat) {
        self.format = format;
    }

    pub(crate) const fn verbose(&self) -> bool {
        self.verbose
    }

    pub(crate) const fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    pub(crate) const fn validate(&self) -> bool {
        self.validate
    }

    pub(crate) const fn set_validate(&mut self, validate: bool) {
        self.validate = validate;
    }

    pub(crate) const fn paging(&self) -> Paging {
        self.paging
    }

    pub(crate) const fn set_paging(&mut self, paging: Paging) {
        self.paging = paging;
    }

    /// Records the column names for the next rendered result.
    pub(crate) fn set_header(&mut self, header: Vec<String>) {
        self.header = Some(header);
    }

    /// Hands the pending header to the renderer, leaving none behind.
    pub(crate) fn take_header(&mut self) -> Option<Vec<String>> {
        self.header.take()
    }

    pub(crate) fn clear_header(&mut self) {
        self.header = None;
    }

    #[cfg(test)]
    pub(crate) fn header(&self) -> Option<&[String]> {
        self.header.as_deref()
    }
}

fn non_empty(text: Option<&str>) -> Option<String> {
    text.map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
}
