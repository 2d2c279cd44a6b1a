//! Box-drawn tables for heterogeneous results.

use std::fmt::Write as _;

use dtm_edn::Value;
use unicode_width::UnicodeWidthStr;

/// Rows of cell text with an optional header row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Table {
    header: Option<Vec<String>>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub(crate) fn new(header: Option<Vec<String>>, rows: Vec<Vec<String>>) -> Self {
        Self { header, rows }
    }

    /// Normalises a result into rows.
    ///
    /// Maps become `[key value]` pairs and flat sequences become one-cell
    /// rows, each supplying a default header when none is pending. A
    /// sequence of sequences is used row for row. Scalars and headerless
    /// empty collections have no tabular form and yield `None`.
    pub(crate) fn from_value(value: &Value, pending: Option<Vec<String>>) -> Option<Self> {
        match value {
            Value::Map(map) => {
                let rows = map
                    .entries()
                    .iter()
                    .map(|(key, entry)| vec![cell_text(key), cell_text(entry)])
                    .collect();
                Some(Self::new(
                    Some(pending.unwrap_or_else(|| header_of(&["key", "value"]))),
                    rows,
                ))
            }
            Value::List(items) | Value::Vector(items) | Value::Set(items) => match items.first()
            {
                None => pending.map(|header| Self::new(Some(header), Vec::new())),
                Some(Value::Vector(_)) => Some(Self::new(
                    pending,
                    items.iter().map(row_cells).collect(),
                )),
                Some(_) => Some(Self::new(
                    Some(pending.unwrap_or_else(|| header_of(&["value"]))),
                    items.iter().map(|item| vec![cell_text(item)]).collect(),
                )),
            },
            Value::Nil
            | Value::Bool(_)
            | Value::Int(_)
            | Value::Float(_)
            | Value::String(_)
            | Value::Char(_)
            | Value::Keyword(_)
            | Value::Symbol(_)
            | Value::Tagged { .. } => None,
        }
    }

    pub(crate) fn header(&self) -> Option<&[String]> {
        self.header.as_deref()
    }

    pub(crate) fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Maximum display width per column over the header and every row.
    ///
    /// Ragged rows only contribute to the columns they have.
    pub(crate) fn widths(&self) -> Vec<usize> {
        let mut widths: Vec<usize> = Vec::new();
        for row in self.header.iter().chain(&self.rows) {
            for (index, cell) in row.iter().enumerate() {
                let width = cell.width();
                match widths.get_mut(index) {
                    Some(current) => *current = (*current).max(width),
                    None => widths.push(width),
                }
            }
        }
        widths
    }

    /// Renders the table with box-drawing borders.
    ///
    /// The top rule and header separator only appear with a header; the
    /// bottom rule is always drawn.
    pub(crate) fn render(&self) -> String {
        let widths = self.widths();
        let mut output = String::new();
        if let Some(header) = &self.header {
            push_rule(&mut output, &widths, ['┌', '┬', '┐']);
            push_row(&mut output, header, &widths);
            push_rule(&mut output, &widths, ['├', '┼', '┤']);
        }
        for row in &self.rows {
            push_row(&mut output, row, &widths);
        }
        push_rule(&mut output, &widths, ['└', '┴', '┘']);
        output
    }
}

/// Display text of one cell: the literal of a scalar, otherwise printed EDN,
/// with embedded newlines removed.
pub(crate) fn cell_text(value: &Value) -> String {
    value
        .literal()
        .unwrap_or_else(|| value.to_edn())
        .replace('\n', "")
}

fn row_cells(row: &Value) -> Vec<String> {
    match row.elements() {
        Some(cells) => cells.iter().map(cell_text).collect(),
        None => vec![cell_text(row)],
    }
}

fn header_of(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| (*name).to_owned()).collect()
}

fn push_rule(output: &mut String, widths: &[usize], [left, middle, right]: [char; 3]) {
    output.push(' ');
    for (index, width) in widths.iter().enumerate() {
        output.push(if index == 0 { left } else { middle });
        output.extend(std::iter::repeat_n('─', width + 2));
    }
    if widths.is_empty() {
        output.push(left);
    }
    output.push(right);
    output.push('\n');
}

fn push_row(output: &mut String, cells: &[String], widths: &[usize]) {
    for (cell, width) in cells.iter().zip(widths) {
        let padding = width.saturating_sub(cell.width());
        let _ = write!(output, " │ {cell}{}", " ".repeat(padding));
    }
    output.push_str(" │ \n");
}
