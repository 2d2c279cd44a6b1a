use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// How command results are written to stdout.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(ascii_case_insensitive)]
pub enum OutputFormat {
    /// Indented EDN as returned by the service.
    #[serde(rename = "edn")]
    #[strum(to_string = "edn")]
    Edn,
    /// Box-drawn table with inferred or query-derived headers.
    #[default]
    #[serde(rename = "tbl", alias = "table")]
    #[strum(to_string = "tbl", serialize = "table")]
    Table,
    /// Pretty-printed JSON.
    #[serde(rename = "json")]
    #[strum(to_string = "json")]
    Json,
    /// Comma-separated rows.
    #[serde(rename = "csv")]
    #[strum(to_string = "csv")]
    Csv,
    /// Tab-separated rows.
    #[serde(rename = "tsv")]
    #[strum(to_string = "tsv")]
    Tsv,
}

impl OutputFormat {
    /// Parses a user-supplied format name, falling back to EDN for unknown
    /// names.
    #[must_use]
    pub fn from_name_or_edn(name: &str) -> Self {
        name.trim().parse().unwrap_or(Self::Edn)
    }
}

/// Errors encountered while parsing an [`OutputFormat`] from text.
pub type OutputFormatParseError = strum::ParseError;
