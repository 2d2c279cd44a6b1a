//! Error types for the CLI runtime.

use std::io;
use std::sync::Arc;

use dtm_config::HostError;
use thiserror::Error;

use crate::dispatch::DispatchError;
use crate::path::PathError;
use crate::prompt::PromptError;
use crate::telemetry::TelemetryError;
use crate::transport::TransportError;

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("failed to load configuration: {0}")]
    LoadConfiguration(Arc<ortho_config::OrthoError>),
    #[error("{0}")]
    CliUsage(clap::Error),
    #[error(transparent)]
    Host(HostError),
    #[error("invalid {flag} provided: unsigned integer expected, e.g. 5")]
    InvalidPaging { flag: &'static str },
    #[error("failed to initialise logging: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error("failed to create HTTP client: {0}")]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error(transparent)]
    Path(#[from] PathError),
    #[error(transparent)]
    Prompt(#[from] PromptError),
    #[error("failed to write output: {0}")]
    Output(#[source] io::Error),
}
