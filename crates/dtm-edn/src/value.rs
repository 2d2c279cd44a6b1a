//! Tagged tree representation of EDN data.
//!
//! Every response from the REST service and every form typed at the REPL is
//! read into a [`Value`]. Consumers match exhaustively over the variants, so a
//! new shape surfaces as a compile error at every renderer and navigator
//! rather than as a silent fall-through.

use std::fmt;

use crate::error::EdnError;
use crate::printer;

/// A single EDN datum.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// `nil`.
    Nil,
    /// `true` or `false`.
    Bool(bool),
    /// Integer literal, including `N`-suffixed integers that fit in 64 bits.
    Int(i64),
    /// Floating point literal, including `M`-suffixed decimals.
    Float(f64),
    /// String contents with escapes already resolved.
    String(String),
    /// Character literal such as `\a` or `\newline`.
    Char(char),
    /// Keyword text including the leading `:`, for example `:db/ident`.
    Keyword(String),
    /// Symbol text, for example `?e` or `find`.
    Symbol(String),
    /// Tagged element such as `#db/id [:db.part/user -1]`.
    Tagged {
        /// Tag without the leading `#`.
        tag: String,
        /// The tagged element.
        value: Box<Value>,
    },
    /// `( ... )`.
    List(Vec<Value>),
    /// `[ ... ]`.
    Vector(Vec<Value>),
    /// `{ ... }`.
    Map(Map),
    /// `#{ ... }`, kept in source order.
    Set(Vec<Value>),
}

impl Value {
    /// Builds a keyword, adding the leading `:` when it is missing.
    #[must_use]
    pub fn keyword(name: &str) -> Self {
        if name.starts_with(':') {
            Self::Keyword(name.to_owned())
        } else {
            Self::Keyword(format!(":{name}"))
        }
    }

    /// Builds a symbol from its text.
    #[must_use]
    pub fn symbol(name: impl Into<String>) -> Self {
        Self::Symbol(name.into())
    }

    /// Builds a string value.
    #[must_use]
    pub fn string(text: impl Into<String>) -> Self {
        Self::String(text.into())
    }

    /// Returns the literal text of a scalar or atom.
    ///
    /// Strings yield their contents without quotes, keywords keep their
    /// leading colon and characters yield the character itself. Collections
    /// and tagged elements have no literal text and return `None`.
    #[must_use]
    pub fn literal(&self) -> Option<String> {
        match self {
            Self::Nil => Some(String::from("nil")),
            Self::Bool(flag) => Some(flag.to_string()),
            Self::Int(number) => Some(number.to_string()),
            Self::Float(number) => Some(printer::float_edn(*number)),
            Self::String(text) | Self::Keyword(text) | Self::Symbol(text) => Some(text.clone()),
            Self::Char(character) => Some(character.to_string()),
            Self::Tagged { .. }
            | Self::List(_)
            | Self::Vector(_)
            | Self::Map(_)
            | Self::Set(_) => None,
        }
    }

    /// Returns the ordered children of a list, vector or set.
    #[must_use]
    pub fn elements(&self) -> Option<&[Self]> {
        match self {
            Self::List(items) | Self::Vector(items) | Self::Set(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the map payload when the value is a map.
    #[must_use]
    pub const fn as_map(&self) -> Option<&Map> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Whether the value holds child values.
    #[must_use]
    pub const fn is_collection(&self) -> bool {
        matches!(
            self,
            Self::List(_) | Self::Vector(_) | Self::Map(_) | Self::Set(_) | Self::Tagged { .. }
        )
    }

    /// Short lowercase name of the variant, used in diagnostics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Nil => "nil",
            Self::Bool(_) => "boolean",
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Char(_) => "character",
            Self::Keyword(_) => "keyword",
            Self::Symbol(_) => "symbol",
            Self::Tagged { .. } => "tagged element",
            Self::List(_) => "list",
            Self::Vector(_) => "vector",
            Self::Map(_) => "map",
            Self::Set(_) => "set",
        }
    }

    /// Serialises the value as single-line EDN.
    #[must_use]
    pub fn to_edn(&self) -> String {
        let mut output = String::new();
        printer::write_compact(&mut output, self);
        output
    }
}

impl fmt::Display for Value {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.to_edn())
    }
}

impl From<Map> for Value {
    fn from(map: Map) -> Self {
        Self::Map(map)
    }
}

/// Ordered key/value pairs of an EDN map.
///
/// Pairs are stored as tuples, so an odd number of forms can never be
/// represented: [`Map::from_flat`] rejects such input up front.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Map {
    entries: Vec<(Value, Value)>,
}

impl Map {
    /// Creates an empty map.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Builds a map from already-paired entries.
    #[must_use]
    pub const fn from_entries(entries: Vec<(Value, Value)>) -> Self {
        Self { entries }
    }

    /// Builds a map from an alternating key/value sequence.
    ///
    /// # Errors
    ///
    /// Returns [`EdnError::OddMapEntries`] when the sequence length is odd.
    pub fn from_flat(forms: Vec<Value>) -> Result<Self, EdnError> {
        let count = forms.len();
        if !count.is_multiple_of(2) {
            return Err(EdnError::OddMapEntries { count });
        }
        let mut entries = Vec::new();
        let mut forms = forms.into_iter();
        while let (Some(key), Some(value)) = (forms.next(), forms.next()) {
            entries.push((key, value));
        }
        Ok(Self { entries })
    }

    /// Appends a pair, keeping insertion order.
    pub fn insert(&mut self, key: Value, value: Value) {
        self.entries.push((key, value));
    }

    /// Looks up the first value whose key has the given literal text.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(candidate, _)| candidate.literal().as_deref() == Some(key))
            .map(|(_, value)| value)
    }

    /// Returns the ordered pairs.
    #[must_use]
    pub const fn entries(&self) -> &[(Value, Value)] {
        self.entries.as_slice()
    }

    /// Number of pairs.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map holds no pairs.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
