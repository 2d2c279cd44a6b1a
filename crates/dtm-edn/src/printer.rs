//! EDN printers.
//!
//! [`Value::to_edn`] produces single-line output used inside table cells and
//! wire payloads; [`pprint`] breaks long collections across lines for the
//! REPL's raw output mode.

use crate::value::Value;

/// Line width the pretty printer tries to stay within.
const PRETTY_WIDTH: usize = 80;

/// Renders a value as indented, human-oriented EDN.
///
/// Collections that fit within the line width stay on one line; longer ones
/// place one element (or one key/value pair) per line.
#[must_use]
pub fn pprint(value: &Value) -> String {
    let mut output = String::new();
    write_pretty(&mut output, value, 0);
    output
}

pub(crate) fn write_compact(output: &mut String, value: &Value) {
    match value {
        Value::Nil => output.push_str("nil"),
        Value::Bool(flag) => output.push_str(if *flag { "true" } else { "false" }),
        Value::Int(number) => output.push_str(&number.to_string()),
        Value::Float(number) => output.push_str(&float_edn(*number)),
        Value::String(text) => write_string(output, text),
        Value::Char(character) => write_char(output, *character),
        Value::Keyword(text) | Value::Symbol(text) => output.push_str(text),
        Value::Tagged { tag, value } => {
            output.push('#');
            output.push_str(tag);
            output.push(' ');
            write_compact(output, value);
        }
        Value::List(items) => write_compact_items(output, "(", items, ")"),
        Value::Vector(items) => write_compact_items(output, "[", items, "]"),
        Value::Set(items) => write_compact_items(output, "#{", items, "}"),
        Value::Map(map) => {
            output.push('{');
            for (index, (key, entry)) in map.entries().iter().enumerate() {
                if index > 0 {
                    output.push_str(", ");
                }
                write_compact(output, key);
                output.push(' ');
                write_compact(output, entry);
            }
            output.push('}');
        }
    }
}

fn write_compact_items(output: &mut String, open: &str, items: &[Value], close: &str) {
    output.push_str(open);
    for (index, item) in items.iter().enumerate() {
        if index > 0 {
            output.push(' ');
        }
        write_compact(output, item);
    }
    output.push_str(close);
}

fn write_pretty(output: &mut String, value: &Value, indent: usize) {
    let compact = value.to_edn();
    if !value.is_collection() || indent + compact.chars().count() <= PRETTY_WIDTH {
        output.push_str(&compact);
        return;
    }

    match value {
        Value::List(items) => write_pretty_items(output, "(", items, ")", indent),
        Value::Vector(items) => write_pretty_items(output, "[", items, "]", indent),
        Value::Set(items) => write_pretty_items(output, "#{", items, "}", indent),
        Value::Map(map) => {
            output.push('{');
            let inner = indent + 1;
            for (index, (key, entry)) in map.entries().iter().enumerate() {
                if index > 0 {
                    output.push('\n');
                    push_indent(output, inner);
                }
                let key_text = key.to_edn();
                output.push_str(&key_text);
                output.push(' ');
                write_pretty(output, entry, inner + key_text.chars().count() + 1);
            }
            output.push('}');
        }
        Value::Tagged { tag, value } => {
            output.push('#');
            output.push_str(tag);
            output.push(' ');
            write_pretty(output, value, indent + tag.chars().count() + 2);
        }
        Value::Nil
        | Value::Bool(_)
        | Value::Int(_)
        | Value::Float(_)
        | Value::String(_)
        | Value::Char(_)
        | Value::Keyword(_)
        | Value::Symbol(_) => output.push_str(&compact),
    }
}

fn write_pretty_items(output: &mut String, open: &str, items: &[Value], close: &str, indent: usize) {
    output.push_str(open);
    let inner = indent + open.chars().count();
    for (index, item) in items.iter().enumerate() {
        if index > 0 {
            output.push('\n');
            push_indent(output, inner);
        }
        write_pretty(output, item, inner);
    }
    output.push_str(close);
}

fn push_indent(output: &mut String, width: usize) {
    output.extend(std::iter::repeat_n(' ', width));
}

fn write_string(output: &mut String, text: &str) {
    output.push('"');
    for character in text.chars() {
        match character {
            '"' => output.push_str("\\\""),
            '\\' => output.push_str("\\\\"),
            '\n' => output.push_str("\\n"),
            '\t' => output.push_str("\\t"),
            '\r' => output.push_str("\\r"),
            other => output.push(other),
        }
    }
    output.push('"');
}

fn write_char(output: &mut String, character: char) {
    output.push('\\');
    match character {
        '\n' => output.push_str("newline"),
        ' ' => output.push_str("space"),
        '\t' => output.push_str("tab"),
        '\r' => output.push_str("return"),
        other => output.push(other),
    }
}

/// Plain decimal text for a float, always carrying a fractional part.
fn float_text(number: f64) -> String {
    let text = number.to_string();
    if number.is_finite() && !text.contains(['.', 'e', 'E']) {
        format!("{text}.0")
    } else {
        text
    }
}

pub(crate) fn float_edn(number: f64) -> String {
    if number.is_nan() {
        String::from("##NaN")
    } else if number.is_infinite() {
        String::from(if number.is_sign_positive() { "##Inf" } else { "##-Inf" })
    } else {
        float_text(number)
    }
}
