//! Typed, interactive input for the creation commands.
//!
//! Each value is collected by a small state machine: show the prompt, read a
//! line, validate it against the declared type, then accept it or report the
//! problem and prompt again. Input comes from an [`InputSource`], which is a
//! line editor on a terminal and a plain reader in scripts and tests.

use std::io::{self, BufRead, Write};

use dtm_edn::{Value, valid_boolean};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use thiserror::Error;

use crate::query::{AttributeDescriptor, just_namespace};

const STRING_TYPE: &str = ":db.type/string";
const BOOLEAN_TYPE: &str = ":db.type/boolean";
const VALUE_TYPES: [&str; 13] = [
    "string", "boolean", "long", "bigint", "float", "double", "bigdec", "ref", "instant", "uuid",
    "uri", "keyword", "bytes",
];
const CARDINALITIES: [&str; 2] = ["one", "many"];

/// Errors that end an interactive prompt.
#[derive(Debug, Error)]
pub(crate) enum PromptError {
    /// Input ended before every value was entered.
    #[error("input closed before all values were entered")]
    Closed,
    /// The user pressed Ctrl-C.
    #[error("input interrupted")]
    Interrupted,
    /// The line editor failed.
    #[error("line editor failed: {0}")]
    Editor(#[from] ReadlineError),
    /// A scripted input source failed.
    #[error("failed to read input: {0}")]
    Read(#[source] io::Error),
    /// A validation message could not be written.
    #[error("failed to write prompt message: {0}")]
    Write(#[source] io::Error),
}

/// Supplies input lines to the REPL and to interactive prompts.
pub(crate) trait InputSource {
    /// Shows `prompt` and reads one line without its terminator.
    ///
    /// Returns `Ok(None)` at end of input.
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>, PromptError>;

    /// Records an accepted REPL line.
    fn add_history(&mut self, _line: &str) {}
}

/// Terminal input with line editing and history.
pub(crate) struct LineEditor {
    editor: DefaultEditor,
}

impl LineEditor {
    pub(crate) fn new() -> Result<Self, PromptError> {
        Ok(Self {
            editor: DefaultEditor::new()?,
        })
    }
}

impl InputSource for LineEditor {
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>, PromptError> {
        match self.editor.readline(prompt) {
            Ok(line) => Ok(Some(line)),
            Err(ReadlineError::Eof) => Ok(None),
            Err(ReadlineError::Interrupted) => Err(PromptError::Interrupted),
            Err(error) => Err(PromptError::Editor(error)),
        }
    }

    fn add_history(&mut self, line: &str) {
        if let Err(error) = self.editor.add_history_entry(line) {
            tracing::debug!(%error, "history entry was not recorded");
        }
    }
}

/// Scripted input read line by line, without echoing prompts.
pub(crate) struct ReaderInput<R> {
    reader: R,
}

impl<R: BufRead> ReaderInput<R> {
    pub(crate) const fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: BufRead> InputSource for ReaderInput<R> {
    fn read_line(&mut self, _prompt: &str) -> Result<Option<String>, PromptError> {
        let mut line = String::new();
        let read = self
            .reader
            .read_line(&mut line)
            .map_err(PromptError::Read)?;
        if read == 0 {
            return Ok(None);
        }
        let trimmed_len = line.trim_end_matches(['\r', '\n']).len();
        line.truncate(trimmed_len);
        Ok(Some(line))
    }
}

enum PromptState<T> {
    Prompt,
    Read(String),
    Validate(String),
    Accept(T),
    Reprompt,
}

/// Asks for one value until `validate` accepts it.
///
/// `expected` names the wanted type in the prompt and in the message shown
/// after a rejected line.
fn ask<T, F>(
    input: &mut dyn InputSource,
    out: &mut dyn Write,
    label: &str,
    expected: &str,
    validate: F,
) -> Result<T, PromptError>
where
    F: Fn(&str) -> Option<T>,
{
    let mut state = PromptState::Prompt;
    loop {
        state = match state {
            PromptState::Prompt => PromptState::Read(format!("{label} ({expected}): ")),
            PromptState::Read(prompt) => match input.read_line(&prompt)? {
                Some(line) => PromptState::Validate(line),
                None => return Err(PromptError::Closed),
            },
            PromptState::Validate(line) => {
                validate(&line).map_or(PromptState::Reprompt, PromptState::Accept)
            }
            PromptState::Reprompt => {
                writeln!(out, "Error validating {expected}").map_err(PromptError::Write)?;
                PromptState::Prompt
            }
            PromptState::Accept(value) => return Ok(value),
        };
    }
}

/// EDN text for `text` entered against an attribute of `value_type`.
///
/// Strings are always accepted and quoted; booleans must be `true` or
/// `false`. Other types are passed through as typed, and a blank line leaves
/// the attribute out (the outer `Some(None)`).
fn typed_value(text: &str, value_type: &str) -> Option<Option<String>> {
    match value_type {
        STRING_TYPE => Some(Some(Value::string(text).to_edn())),
        BOOLEAN_TYPE => valid_boolean(text.trim()).then(|| Some(text.trim().to_owned())),
        _ => {
            let trimmed = text.trim();
            Some((!trimmed.is_empty()).then(|| trimmed.to_owned()))
        }
    }
}

/// Prompts for a value of every attribute, in order.
///
/// Returns `(ident, EDN text)` pairs ready for [`crate::query::entity_tx`].
pub(crate) fn entity_values(
    attributes: &[AttributeDescriptor],
    input: &mut dyn InputSource,
    out: &mut dyn Write,
) -> Result<Vec<(String, String)>, PromptError> {
    let mut values = Vec::with_capacity(attributes.len());
    for attribute in attributes {
        let entered = ask(
            input,
            out,
            &attribute.ident,
            &attribute.value_type,
            |text| typed_value(text, &attribute.value_type),
        )?;
        if let Some(edn) = entered {
            values.push((attribute.ident.clone(), edn));
        }
    }
    Ok(values)
}

/// Prompts for the parts of a new attribute in `namespace`.
pub(crate) fn attribute_definition(
    namespace: &str,
    input: &mut dyn InputSource,
    out: &mut dyn Write,
) -> Result<(AttributeDescriptor, Option<String>), PromptError> {
    let prefix = just_namespace(namespace);
    let ident = ask(input, out, "name", "attribute name", |text| {
        let name = text.trim();
        let valid = !name.is_empty() && !name.contains(|c: char| c.is_whitespace() || c == '/');
        valid.then(|| format!(":{prefix}/{}", name.trim_start_matches(':')))
    })?;
    let value_type = ask(input, out, "value type", "value type", |text| {
        let name = text.trim().trim_start_matches(":db.type/");
        VALUE_TYPES
            .contains(&name)
            .then(|| format!(":db.type/{name}"))
    })?;
    let cardinality = ask(input, out, "cardinality", "cardinality", |text| {
        let name = text.trim().trim_start_matches(":db.cardinality/");
        CARDINALITIES
            .contains(&name)
            .then(|| format!(":db.cardinality/{name}"))
    })?;
    let doc = ask(input, out, "doc", "optional", |text| {
        let trimmed = text.trim();
        Some((!trimmed.is_empty()).then(|| trimmed.to_owned()))
    })?;
    Ok((
        AttributeDescriptor {
            ident,
            value_type,
            cardinality,
        },
        doc,
    ))
}
