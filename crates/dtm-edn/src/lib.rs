//! EDN data model, reader and printer for the `dtm` client.
//!
//! The REST service speaks EDN in both directions. This crate supplies the
//! tagged [`Value`] tree those payloads are read into, a `nom` reader that can
//! also work incrementally over a growing buffer ([`parse_prefix`]), printers for
//! single-line and indented output, and the literal predicates used when
//! validating typed input.

mod error;
mod literal;
mod printer;
mod reader;
mod value;

pub use error::EdnError;
pub use literal::{valid_boolean, valid_integer};
pub use printer::pprint;
pub use reader::{MAX_DEPTH, parse, parse_prefix};
pub use value::{Map, Value};
