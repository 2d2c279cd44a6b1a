//! CLI entrypoint for the `dtm` client.
//!
//! The binary delegates to [`dtm_cli::run`], which loads configuration,
//! parses the command line and either runs one command or starts the REPL.

use std::io::{self, IsTerminal, StderrLock, StdinLock, StdoutLock};
use std::process::ExitCode;

fn main() -> ExitCode {
    let stdin_is_terminal = io::stdin().is_terminal();
    let mut stdin: StdinLock<'_> = io::stdin().lock();
    let mut stdout: StdoutLock<'_> = io::stdout().lock();
    let mut stderr: StderrLock<'_> = io::stderr().lock();
    dtm_cli::run(
        std::env::args_os(),
        &mut stdin,
        &mut stdout,
        &mut stderr,
        stdin_is_terminal,
    )
}
