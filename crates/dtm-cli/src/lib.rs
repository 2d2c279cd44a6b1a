//! Command-line client and REPL for a Datomic-style REST service.
//!
//! The module owns argument parsing, configuration bootstrapping and the
//! choice between a one-shot command and an interactive session. It is
//! exercised both from the binary entrypoint and from tests where
//! configuration loading and IO streams are substituted.

use std::ffi::OsString;
use std::io::{BufRead, Write};
use std::process::ExitCode;

use clap::Parser;
use clap::error::ErrorKind;
use dtm_config::Config;
use dtm_edn::valid_integer;

mod api;
mod cli;
mod command;
mod config;
mod dispatch;
mod errors;
mod output;
mod path;
mod prompt;
mod query;
mod repl;
mod session;
mod stream;
mod telemetry;
mod transport;

use cli::Cli;
use command::Command;
use config::{ConfigArgumentSplit, split_config_arguments};
pub(crate) use config::{ConfigLoader, OrthoConfigLoader};
use dispatch::{Dispatcher, Outcome};
pub(crate) use errors::AppError;
use prompt::{InputSource, LineEditor, ReaderInput};
use session::{Paging, Session};
use transport::{HttpTransport, Transport};

/// CLI flags recognised by the configuration loader.
///
/// MAINTENANCE: This list must be kept in sync with the fields of
/// `dtm_config::Config`.
const CONFIG_CLI_FLAGS: &[&str] = &[
    "--config-path",
    "--host",
    "--alias",
    "--db",
    "--format",
    "--log-filter",
    "--log-format",
];

/// Bundles the IO streams provided to the CLI runtime.
pub(crate) struct IoStreams<'a, R: BufRead, W: Write, E: Write> {
    pub(crate) stdin: &'a mut R,
    pub(crate) stdout: &'a mut W,
    pub(crate) stderr: &'a mut E,
    stdin_is_terminal: bool,
}

impl<'a, R: BufRead, W: Write, E: Write> IoStreams<'a, R, W, E> {
    pub(crate) const fn new(
        stdin: &'a mut R,
        stdout: &'a mut W,
        stderr: &'a mut E,
        stdin_is_terminal: bool,
    ) -> Self {
        Self {
            stdin,
            stdout,
            stderr,
            stdin_is_terminal,
        }
    }
}

/// Line source for the REPL and interactive prompts.
///
/// A terminal gets line editing and history; piped input is read plainly so
/// scripts can drive the REPL.
fn input_source<R: BufRead>(
    stdin: &mut R,
    stdin_is_terminal: bool,
) -> Result<Box<dyn InputSource + '_>, AppError> {
    if stdin_is_terminal {
        Ok(Box::new(LineEditor::new()?))
    } else {
        Ok(Box::new(ReaderInput::new(stdin)))
    }
}

/// Runs the CLI using the provided arguments and IO handles.
#[must_use]
pub fn run<I, R, W, E>(
    args: I,
    stdin: &mut R,
    stdout: &mut W,
    stderr: &mut E,
    stdin_is_terminal: bool,
) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    R: BufRead,
    W: Write,
    E: Write,
{
    let mut io = IoStreams::new(stdin, stdout, stderr, stdin_is_terminal);
    run_with_loader(args, &mut io, &OrthoConfigLoader)
}

/// Runs the CLI with a custom configuration loader.
pub(crate) fn run_with_loader<I, R, W, E, L>(
    args: I,
    io: &mut IoStreams<'_, R, W, E>,
    loader: &L,
) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    R: BufRead,
    W: Write,
    E: Write,
    L: ConfigLoader,
{
    let args: Vec<OsString> = args.into_iter().collect();
    let split = split_config_arguments(&args);
    let cli_arguments = prepare_cli_arguments(&args, &split);

    let cli = match Cli::try_parse_from(cli_arguments) {
        Ok(cli) => cli,
        Err(error) if matches!(error.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = write!(io.stdout, "{}", error.render());
            return ExitCode::SUCCESS;
        }
        Err(error) => {
            let _ = writeln!(io.stderr, "{}", AppError::CliUsage(error));
            return ExitCode::FAILURE;
        }
    };

    let result = loader
        .load(&split.config_arguments)
        .and_then(|config| execute(cli, &config, io));

    match result {
        Ok(exit_code) => exit_code,
        Err(error) => {
            let _ = writeln!(io.stderr, "{error}");
            ExitCode::FAILURE
        }
    }
}

fn prepare_cli_arguments(args: &[OsString], split: &ConfigArgumentSplit) -> Vec<OsString> {
    let mut cli_arguments: Vec<OsString> = Vec::new();
    if let Some(first) = args.first() {
        cli_arguments.push(first.clone());
    }
    if let Some(rest) = args.get(split.command_start..) {
        cli_arguments.extend(rest.iter().cloned());
    }
    cli_arguments
}

fn execute<R, W, E>(
    cli: Cli,
    config: &Config,
    io: &mut IoStreams<'_, R, W, E>,
) -> Result<ExitCode, AppError>
where
    R: BufRead,
    W: Write,
    E: Write,
{
    telemetry::initialise(config, cli.verbose)?;
    let paging = Paging {
        offset: paging_flag("offset", cli.offset.as_deref())?,
        limit: paging_flag("limit", cli.limit.as_deref())?,
    };
    let mut session = Session::from_config(config)?;
    session.set_paging(paging);
    session.set_verbose(cli.verbose);

    let transport = HttpTransport::new()?;
    let mut dispatcher = Dispatcher::new(&transport, session);
    match cli.command.as_deref() {
        None => {
            tracing::debug!("starting interactive session");
            let mut input = input_source(&mut *io.stdin, io.stdin_is_terminal)?;
            repl::run(&mut dispatcher, input.as_mut(), &mut *io.stdout, &mut *io.stderr)?;
            Ok(ExitCode::SUCCESS)
        }
        Some(name) => one_shot(
            &mut dispatcher,
            name,
            cli.argument.as_deref(),
            cli.path.as_deref(),
            io,
        ),
    }
}

fn one_shot<T, R, W, E>(
    dispatcher: &mut Dispatcher<'_, T>,
    name: &str,
    argument: Option<&str>,
    path_text: Option<&str>,
    io: &mut IoStreams<'_, R, W, E>,
) -> Result<ExitCode, AppError>
where
    T: Transport,
    R: BufRead,
    W: Write,
    E: Write,
{
    let command = match Command::from_cli(name, argument) {
        Ok(command) => command,
        Err(rejection) => {
            repl::write_outcome(dispatcher, Outcome::Value(rejection), &mut *io.stdout)?;
            return Ok(ExitCode::FAILURE);
        }
    };

    let outcome = {
        let editing = io.stdin_is_terminal && command.prompts();
        let mut input = input_source(&mut *io.stdin, editing)?;
        dispatcher.execute(command, input.as_mut(), &mut *io.stdout, &mut *io.stderr)?
    };
    let selected = match (outcome, path_text) {
        (Outcome::Value(value), Some(text)) => {
            let path = path::Path::parse(text)?;
            let found = path::navigate(&value, &path)?.clone();
            dispatcher.session_mut().clear_header();
            Outcome::Value(found)
        }
        (outcome, _) => outcome,
    };
    repl::write_outcome(dispatcher, selected, &mut *io.stdout)?;
    Ok(ExitCode::SUCCESS)
}

/// Parses `--offset` or `--limit` as an unsigned integer.
fn paging_flag(flag: &'static str, text: Option<&str>) -> Result<Option<u64>, AppError> {
    let Some(raw) = text else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    let digits = trimmed.trim_start_matches('+').trim_end_matches('N');
    valid_integer(trimmed, false)
        .then(|| digits.parse::<u64>().ok())
        .flatten()
        .map(Some)
        .ok_or(AppError::InvalidPaging { flag })
}
