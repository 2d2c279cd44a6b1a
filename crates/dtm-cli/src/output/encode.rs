//! JSON and delimited-text encodings of results.

use dtm_edn::Value;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use super::table::{Table, cell_text};

/// Serialises a [`Value`] as JSON.
///
/// Keywords and symbols become strings with their EDN spelling, tagged
/// elements serialise their payload and map keys are stringified.
struct JsonView<'a>(&'a Value);

impl Serialize for JsonView<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self.0 {
            Value::Nil => serializer.serialize_unit(),
            Value::Bool(flag) => serializer.serialize_bool(*flag),
            Value::Int(number) => serializer.serialize_i64(*number),
            Value::Float(number) if number.is_finite() => serializer.serialize_f64(*number),
            Value::Float(_) => serializer.serialize_str(&self.0.to_edn()),
            Value::Char(_) | Value::Keyword(_) | Value::Symbol(_) => {
                serializer.serialize_str(&cell_text(self.0))
            }
            Value::String(text) => serializer.serialize_str(text),
            Value::Tagged { value, .. } => JsonView(value).serialize(serializer),
            Value::List(items) | Value::Vector(items) | Value::Set(items) => {
                let mut sequence = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    sequence.serialize_element(&JsonView(item))?;
                }
                sequence.end()
            }
            Value::Map(map) => {
                let mut entries = serializer.serialize_map(Some(map.len()))?;
                for (key, value) in map.entries() {
                    entries.serialize_entry(&cell_text(key), &JsonView(value))?;
                }
                entries.end()
            }
        }
    }
}

/// Pretty-printed JSON for `value`.
pub(crate) fn to_json(value: &Value) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&JsonView(value))
}

/// Delimiter-separated rows for `value`, header first when present.
///
/// Values without a tabular shape become a single field.
pub(crate) fn to_delimited(value: &Value, header: Option<Vec<String>>, delimiter: char) -> String {
    let table = Table::from_value(value, header)
        .unwrap_or_else(|| Table::new(None, vec![vec![cell_text(value)]]));
    let mut output = String::new();
    for row in table.header().into_iter().chain(table.rows().iter().map(Vec::as_slice)) {
        let fields: Vec<String> = row
            .iter()
            .map(|field| escape_field(field, delimiter))
            .collect();
        output.push_str(&fields.join(&delimiter.to_string()));
        output.push('\n');
    }
    output
}

fn escape_field(field: &str, delimiter: char) -> String {
    if delimiter == '\t' {
        return field.replace(['\t', '\n', '\r'], " ");
    }
    if field.contains([delimiter, '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_owned()
    }
}
