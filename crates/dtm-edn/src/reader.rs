//! EDN reader built on `nom`.
//!
//! The grammar is written once and run in one of two modes. [`parse`] uses
//! nom's complete parsers and expects exactly one form. [`parse_prefix`]
//! uses the streaming parsers, so a form that could still grow (an open
//! collection, or a scalar running into the end of the buffer) is reported
//! as incomplete rather than guessed at. The incremental stream decoder
//! builds on that distinction.

use nom::bytes::{complete as bytes, streaming as bytes_streaming};
use nom::character::{complete as character, streaming as character_streaming};
use nom::combinator::{peek, recognize};
use nom::error::{ErrorKind, ParseError};
use nom::sequence::pair;
use nom::IResult;

use crate::error::EdnError;
use crate::value::{Map, Value};

/// Deepest nesting of collections and tagged elements the reader accepts.
pub const MAX_DEPTH: usize = 256;

type Res<'a, O> = IResult<&'a str, O, ReadError<'a>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Complete,
    Streaming,
}

#[derive(Debug)]
enum Cause {
    Syntax,
    Unmatched(char),
    Invalid(EdnError),
}

/// Failure position plus what went wrong there.
#[derive(Debug)]
struct ReadError<'a> {
    input: &'a str,
    cause: Cause,
}

impl<'a> ParseError<&'a str> for ReadError<'a> {
    fn from_error_kind(input: &'a str, _kind: ErrorKind) -> Self {
        Self {
            input,
            cause: Cause::Syntax,
        }
    }

    fn append(_input: &'a str, _kind: ErrorKind, other: Self) -> Self {
        other
    }
}

impl ReadError<'_> {
    fn into_edn_error(self, text: &str) -> EdnError {
        let offset = text.len().saturating_sub(self.input.len());
        match self.cause {
            Cause::Invalid(error) => error,
            Cause::Unmatched(found) => EdnError::UnmatchedDelimiter { found, offset },
            Cause::Syntax => match self.input.chars().next() {
                Some(found) => EdnError::UnexpectedChar { found, offset },
                None => EdnError::UnexpectedEof,
            },
        }
    }
}

fn to_edn_error(text: &str, error: nom::Err<ReadError<'_>>) -> EdnError {
    match error {
        nom::Err::Incomplete(_) => EdnError::UnexpectedEof,
        nom::Err::Error(error) | nom::Err::Failure(error) => error.into_edn_error(text),
    }
}

fn failure(input: &str, cause: Cause) -> nom::Err<ReadError<'_>> {
    nom::Err::Failure(ReadError { input, cause })
}

fn invalid(input: &str, error: EdnError) -> nom::Err<ReadError<'_>> {
    failure(input, Cause::Invalid(error))
}

/// Reads exactly one form from `text`.
///
/// Whitespace, commas, comments and `#_` discards may surround the form.
///
/// # Errors
///
/// Returns an [`EdnError`] when the text is empty, malformed, or holds more
/// than one form.
pub fn parse(text: &str) -> Result<Value, EdnError> {
    let fail = |error| to_edn_error(text, error);
    let (rest, ()) = ignorable(text, Mode::Complete, 0).map_err(fail)?;
    if rest.is_empty() {
        return Err(EdnError::Empty);
    }
    let (rest, value) = form(rest, Mode::Complete, 0).map_err(fail)?;
    let (rest, ()) = ignorable(rest, Mode::Complete, 0).map_err(fail)?;
    if rest.is_empty() {
        Ok(value)
    } else {
        Err(EdnError::TrailingInput {
            offset: text.len() - rest.len(),
        })
    }
}

/// Reads the first form from `text`, returning it with the byte offset just
/// past its final character.
///
/// Anything after the form is left untouched. A scalar that runs into the
/// end of `text` is incomplete, since more bytes could extend it.
///
/// # Errors
///
/// Returns [`EdnError::Empty`] when only ignorable text is present, and any
/// other [`EdnError`] when the first form is malformed or incomplete.
pub fn parse_prefix(text: &str) -> Result<(Value, usize), EdnError> {
    let fail = |error| to_edn_error(text, error);
    let (rest, ()) = ignorable(text, Mode::Complete, 0).map_err(fail)?;
    if rest.is_empty() {
        return Err(EdnError::Empty);
    }
    let (rest, value) = form(rest, Mode::Streaming, 0).map_err(fail)?;
    Ok((value, text.len() - rest.len()))
}

/// Runs the complete or the streaming flavour of a leaf parser.
fn pick<'a, O, C, S>(input: &'a str, mode: Mode, mut complete: C, mut streaming: S) -> Res<'a, O>
where
    C: FnMut(&'a str) -> Res<'a, O>,
    S: FnMut(&'a str) -> Res<'a, O>,
{
    match mode {
        Mode::Complete => complete(input),
        Mode::Streaming => streaming(input),
    }
}

fn skip_char(input: &str) -> Res<'_, char> {
    character::anychar(input)
}

fn next_char(input: &str, mode: Mode) -> Res<'_, char> {
    pick(
        input,
        mode,
        peek(character::anychar),
        peek(character_streaming::anychar),
    )
}

fn constituents(input: &str, mode: Mode) -> Res<'_, &str> {
    pick(
        input,
        mode,
        bytes::take_while1(is_constituent),
        bytes_streaming::take_while1(is_constituent),
    )
}

fn deeper(input: &str, depth: usize) -> Result<usize, nom::Err<ReadError<'_>>> {
    if depth >= MAX_DEPTH {
        Err(invalid(input, EdnError::TooDeep { limit: MAX_DEPTH }))
    } else {
        Ok(depth + 1)
    }
}

/// Skips whitespace, commas, line comments and `#_` discards.
fn ignorable(mut input: &str, mode: Mode, depth: usize) -> Res<'_, ()> {
    let mut discards = 0_usize;
    loop {
        let (rest, _) = pick(
            input,
            mode,
            bytes::take_while(is_separator),
            bytes_streaming::take_while(is_separator),
        )?;
        input = rest;
        if let Some(comment) = input.strip_prefix(';') {
            let (rest, _) = pick(
                comment,
                mode,
                bytes::take_till(is_newline),
                bytes_streaming::take_till(is_newline),
            )?;
            input = rest;
        } else if let Some(marked) = input.strip_prefix("#_") {
            discards += 1;
            input = marked;
        } else if discards > 0 {
            let (rest, _) = form(input, mode, depth)?;
            discards -= 1;
            input = rest;
        } else {
            return Ok((input, ()));
        }
    }
}

fn form(input: &str, mode: Mode, depth: usize) -> Res<'_, Value> {
    let (_, first) = next_char(input, mode)?;
    match first {
        '(' => sequence(input, ')', mode, depth).map(|(rest, items)| (rest, Value::List(items))),
        '[' => {
            sequence(input, ']', mode, depth).map(|(rest, items)| (rest, Value::Vector(items)))
        }
        '{' => {
            let (rest, forms) = sequence(input, '}', mode, depth)?;
            let map = Map::from_flat(forms).map_err(|error| invalid(input, error))?;
            Ok((rest, Value::Map(map)))
        }
        ')' | ']' | '}' => Err(failure(input, Cause::Unmatched(first))),
        '"' => string(input, mode),
        '\\' => character_literal(input, mode),
        '#' => dispatch(input, mode, depth),
        _ => token(input, mode),
    }
}

/// Reads the forms between an opening delimiter and `close`.
fn sequence(input: &str, close: char, mode: Mode, depth: usize) -> Res<'_, Vec<Value>> {
    let depth = deeper(input, depth)?;
    let (mut input, _) = skip_char(input)?;
    let mut items = Vec::new();
    loop {
        let (rest, ()) = ignorable(input, mode, depth)?;
        if let Ok((rest, _)) = character::char::<_, ReadError<'_>>(close)(rest) {
            return Ok((rest, items));
        }
        let (rest, item) = form(rest, mode, depth)?;
        items.push(item);
        input = rest;
    }
}

fn string(input: &str, mode: Mode) -> Res<'_, Value> {
    let (mut input, _) = skip_char(input)?;
    let mut contents = String::new();
    loop {
        let (rest, chunk) = pick(
            input,
            mode,
            bytes::take_till(is_string_special),
            bytes_streaming::take_till(is_string_special),
        )?;
        contents.push_str(chunk);
        let (rest, special) = pick(rest, mode, character::anychar, character_streaming::anychar)?;
        if special == '"' {
            return Ok((rest, Value::String(contents)));
        }
        let (rest, escaped) = escape(rest, mode)?;
        contents.push(escaped);
        input = rest;
    }
}

fn escape(input: &str, mode: Mode) -> Res<'_, char> {
    let (rest, code) = pick(input, mode, character::anychar, character_streaming::anychar)?;
    let resolved = match code {
        'n' => '\n',
        't' => '\t',
        'r' => '\r',
        'b' => '\u{8}',
        'f' => '\u{c}',
        '"' => '"',
        '\\' => '\\',
        'u' => {
            let (rest, digits) = pick(rest, mode, bytes::take(4_usize), bytes_streaming::take(4_usize))?;
            let decoded = u32::from_str_radix(digits, 16)
                .ok()
                .and_then(char::from_u32)
                .ok_or_else(|| invalid(input, EdnError::InvalidEscape { found: 'u' }))?;
            return Ok((rest, decoded));
        }
        other => return Err(invalid(input, EdnError::InvalidEscape { found: other })),
    };
    Ok((rest, resolved))
}

fn character_literal(input: &str, mode: Mode) -> Res<'_, Value> {
    let (after_slash, _) = skip_char(input)?;
    let (rest, name) = pick(
        after_slash,
        mode,
        recognize(pair(character::anychar, bytes::take_while(is_constituent))),
        recognize(pair(
            character_streaming::anychar,
            bytes_streaming::take_while(is_constituent),
        )),
    )?;
    let mut characters = name.chars();
    if let (Some(single), None) = (characters.next(), characters.next()) {
        return Ok((rest, Value::Char(single)));
    }
    let named = match name {
        "newline" => Some('\n'),
        "space" => Some(' '),
        "tab" => Some('\t'),
        "return" => Some('\r'),
        "formfeed" => Some('\u{c}'),
        "backspace" => Some('\u{8}'),
        _ => name
            .strip_prefix('u')
            .filter(|digits| digits.len() == 4)
            .and_then(|digits| u32::from_str_radix(digits, 16).ok())
            .and_then(char::from_u32),
    };
    named.map(|resolved| (rest, Value::Char(resolved))).ok_or_else(|| {
        invalid(
            input,
            EdnError::InvalidChar {
                text: name.to_owned(),
            },
        )
    })
}

/// Forms introduced by `#`: sets, symbolic values and tagged elements.
fn dispatch(input: &str, mode: Mode, depth: usize) -> Res<'_, Value> {
    let (rest, _) = skip_char(input)?;
    let (_, next) = next_char(rest, mode)?;
    match next {
        '{' => sequence(rest, '}', mode, depth).map(|(rest, items)| (rest, Value::Set(items))),
        '#' => {
            let (name_start, _) = skip_char(rest)?;
            let (rest, name) = constituents(name_start, mode)?;
            let value = match name {
                "Inf" => f64::INFINITY,
                "-Inf" => f64::NEG_INFINITY,
                "NaN" => f64::NAN,
                other => {
                    return Err(invalid(
                        input,
                        EdnError::InvalidToken {
                            text: format!("##{other}"),
                        },
                    ));
                }
            };
            Ok((rest, Value::Float(value)))
        }
        alphabetic if alphabetic.is_alphabetic() => {
            let depth = deeper(input, depth)?;
            let (rest, tag) = constituents(rest, mode)?;
            let (rest, ()) = ignorable(rest, mode, depth)?;
            let (rest, value) = form(rest, mode, depth)?;
            Ok((
                rest,
                Value::Tagged {
                    tag: tag.to_owned(),
                    value: Box::new(value),
                },
            ))
        }
        _ => Err(failure(input, Cause::Syntax)),
    }
}

fn token(input: &str, mode: Mode) -> Res<'_, Value> {
    let (rest, name) = constituents(input, mode)?;
    classify_token(name)
        .map(|value| (rest, value))
        .map_err(|error| invalid(input, error))
}

fn is_separator(current: char) -> bool {
    current.is_whitespace() || current == ','
}

fn is_newline(current: char) -> bool {
    current == '\n'
}

fn is_string_special(current: char) -> bool {
    matches!(current, '"' | '\\')
}

fn is_constituent(current: char) -> bool {
    !(current.is_whitespace()
        || matches!(current, ',' | '(' | ')' | '[' | ']' | '{' | '}' | '"' | ';' | '\\'))
}

fn classify_token(token: &str) -> Result<Value, EdnError> {
    match token {
        "nil" => return Ok(Value::Nil),
        "true" => return Ok(Value::Bool(true)),
        "false" => return Ok(Value::Bool(false)),
        _ => {}
    }

    let mut characters = token.chars();
    let first = characters.next().unwrap_or_default();
    let second = characters.next();
    let numeric = first.is_ascii_digit()
        || (matches!(first, '+' | '-') && second.is_some_and(|next| next.is_ascii_digit()));
    if numeric {
        return parse_number(token);
    }

    if let Some(name) = token.strip_prefix(':') {
        if name.is_empty() || name.starts_with(':') {
            return Err(EdnError::InvalidToken {
                text: token.to_owned(),
            });
        }
        return Ok(Value::Keyword(token.to_owned()));
    }

    if first == '#' {
        return Err(EdnError::InvalidToken {
            text: token.to_owned(),
        });
    }
    Ok(Value::Symbol(token.to_owned()))
}

fn parse_number(token: &str) -> Result<Value, EdnError> {
    let invalid = || EdnError::InvalidNumber {
        text: token.to_owned(),
    };
    if let Some(digits) = token.strip_suffix('N') {
        return digits.parse::<i64>().map(Value::Int).map_err(|_| invalid());
    }
    if let Some(digits) = token.strip_suffix('M') {
        return digits.parse::<f64>().map(Value::Float).map_err(|_| invalid());
    }
    if token.contains(['.', 'e', 'E']) {
        return token.parse::<f64>().map(Value::Float).map_err(|_| invalid());
    }
    token.parse::<i64>().map(Value::Int).map_err(|_| invalid())
}
