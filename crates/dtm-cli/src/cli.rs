//! Command-line argument definitions for `dtm`.
//!
//! Connection settings are handled by the configuration loader; clap sees
//! only the flags and positional words that follow them.

use clap::Parser;

/// Command-line client and REPL for a Datomic REST service.
///
/// Without a command an interactive session starts.
#[derive(Parser, Debug)]
#[command(name = "dtm", version, disable_help_subcommand = true)]
pub(crate) struct Cli {
    /// Prints each request URL, response code and raw body to stderr.
    #[arg(long)]
    pub(crate) verbose: bool,
    /// EDN vector of keys and indices selecting part of the result.
    #[arg(long, value_name = "EDN")]
    pub(crate) path: Option<String>,
    /// Number of query or datom results to skip.
    #[arg(long, value_name = "N", allow_hyphen_values = true)]
    pub(crate) offset: Option<String>,
    /// Maximum number of query or datom results.
    #[arg(long, value_name = "N", allow_hyphen_values = true)]
    pub(crate) limit: Option<String>,
    /// The command to run, for example `query` or `namespaces`.
    #[arg(value_name = "COMMAND")]
    pub(crate) command: Option<String>,
    /// The command argument as EDN text.
    #[arg(value_name = "ARG", allow_hyphen_values = true)]
    pub(crate) argument: Option<String>,
}
