//! Result rendering for every output format.
//!
//! Table output adapts to the shape of the result: maps, flat sequences and
//! row sequences each normalise to rows, and transaction results are split
//! into their datoms and a summary. The other formats serialise the value
//! as it is.

mod encode;
mod table;

use dtm_config::OutputFormat;
use dtm_edn::{Value, pprint};

use crate::path::{Path, navigate, path_exists};

use table::Table;

const TRANSACTION_KEYS: [&str; 4] = [":tx-data", ":db-before", ":db-after", ":tempids"];
const DATOM_FIELDS: [&str; 5] = ["e", "a", "v", "tx", "added"];

/// Renders `value` in `format`, terminated by a newline.
///
/// `header` names the columns of tabular output; it is ignored by formats
/// that have no header row.
pub(crate) fn render(
    value: &Value,
    format: OutputFormat,
    header: Option<Vec<String>>,
) -> Result<String, serde_json::Error> {
    let rendered = match format {
        OutputFormat::Edn => format!("{}\n", pprint(value)),
        OutputFormat::Table => render_table(value, header),
        OutputFormat::Json => format!("{}\n", encode::to_json(value)?),
        OutputFormat::Csv => encode::to_delimited(value, header, ','),
        OutputFormat::Tsv => encode::to_delimited(value, header, '\t'),
    };
    Ok(rendered)
}

fn render_table(value: &Value, header: Option<Vec<String>>) -> String {
    if is_transaction_result(value) {
        return render_transaction(value);
    }
    match Table::from_value(value, header) {
        Some(table) => table.render(),
        None => format!("{}\n", pprint(value)),
    }
}

/// Whether `value` carries every key of a transaction result.
pub(crate) fn is_transaction_result(value: &Value) -> bool {
    TRANSACTION_KEYS
        .iter()
        .all(|key| path_exists(value, &Path::keys([*key])))
}

fn render_transaction(value: &Value) -> String {
    let datoms = navigate(value, &Path::keys([":tx-data"]))
        .ok()
        .and_then(Value::elements)
        .unwrap_or_default();
    let rows = datoms.iter().map(datom_row).collect();
    let header = DATOM_FIELDS.iter().map(|field| (*field).to_owned()).collect();
    let mut output = Table::new(Some(header), rows).render();

    let summary = TRANSACTION_KEYS
        .iter()
        .skip(1)
        .filter_map(|key| {
            let entry = navigate(value, &Path::keys([*key])).ok()?;
            Some(vec![(*key).to_owned(), table::cell_text(entry)])
        })
        .collect();
    let summary_header = vec![String::from("key"), String::from("value")];
    output.push_str(&Table::new(Some(summary_header), summary).render());
    output
}

/// Cells of one datom, whether it arrives as a map or as a tuple.
fn datom_row(datom: &Value) -> Vec<String> {
    match datom {
        Value::Map(map) => DATOM_FIELDS
            .iter()
            .map(|field| {
                map.get(&format!(":{field}"))
                    .map(table::cell_text)
                    .unwrap_or_default()
            })
            .collect(),
        other => match other.elements() {
            Some(cells) => cells.iter().map(table::cell_text).collect(),
            None => vec![table::cell_text(other)],
        },
    }
}
