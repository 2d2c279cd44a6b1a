//! The interactive read-eval-print loop.
//!
//! Each line is read as the body of an EDN list, resolved through the
//! command table and executed. Problems with one line are reported on
//! stderr and the loop carries on; only end of input, `quit`, or a failure
//! to write output ends the session.

use std::io::Write;

use dtm_edn::{Value, parse};

use crate::command::Command;
use crate::dispatch::{Dispatcher, Outcome};
use crate::errors::AppError;
use crate::prompt::{InputSource, PromptError};
use crate::transport::Transport;

const PROMPT: &str = "\ndtm> ";
const CLEAR_SCREEN: &str = "\x1b[2J\x1b[1;1H";

/// Runs the REPL until input ends or the user quits.
pub(crate) fn run<T: Transport>(
    dispatcher: &mut Dispatcher<'_, T>,
    input: &mut dyn InputSource,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> Result<(), AppError> {
    let mut previous: Option<String> = None;
    loop {
        dispatcher.session_mut().clear_header();
        let line = match input.read_line(PROMPT) {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(PromptError::Interrupted) => continue,
            Err(error) => return Err(AppError::Prompt(error)),
        };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if previous.as_deref() != Some(trimmed) {
            input.add_history(trimmed);
            previous = Some(trimmed.to_owned());
        }

        let forms = match parse(&format!("({trimmed})")) {
            Ok(Value::List(forms)) => forms,
            Ok(other) => vec![other],
            Err(error) => {
                report(err, &error)?;
                continue;
            }
        };
        let outcome = match Command::from_form(&forms) {
            Ok(command) => dispatcher.execute(command, input, out, err),
            Err(rejection) => Ok(Outcome::Value(rejection)),
        };
        match outcome {
            Ok(Outcome::Quit) => break,
            Ok(outcome) => write_outcome(dispatcher, outcome, out)?,
            Err(error) => report(err, &error)?,
        }
    }
    Ok(())
}

/// Writes a finished command's result to `out`.
pub(crate) fn write_outcome<T: Transport>(
    dispatcher: &mut Dispatcher<'_, T>,
    outcome: Outcome,
    out: &mut dyn Write,
) -> Result<(), AppError> {
    let text = match outcome {
        Outcome::Value(value) => dispatcher.render(&value)?,
        Outcome::Text(text) => text.to_owned(),
        Outcome::Clear => CLEAR_SCREEN.to_owned(),
        Outcome::Quit | Outcome::Streamed => return Ok(()),
    };
    out.write_all(text.as_bytes())
        .and_then(|()| out.flush())
        .map_err(AppError::Output)
}

fn report(err: &mut dyn Write, error: &dyn std::error::Error) -> Result<(), AppError> {
    tracing::debug!(%error, "command failed");
    writeln!(err, "Error: {error}").map_err(AppError::Output)
}
